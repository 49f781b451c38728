use std::{env, str::FromStr};

use thiserror::Error;

/// Token bucket settings for one route group: refill period in seconds and burst size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitParseError {
    #[error("empty value")]
    Empty,
    #[error("invalid rule '{0}', expected per:burst")]
    Shape(String),
    #[error("invalid number '{0}'")]
    Number(String),
    #[error("rule values must be > 0")]
    Zero,
    #[error("unknown group '{0}', expected read/write")]
    UnknownGroup(String),
}

impl FromStr for RateLimitRule {
    type Err = RateLimitParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (per, burst) = raw
            .split_once(':')
            .ok_or_else(|| RateLimitParseError::Shape(raw.to_string()))?;
        let per_second: u64 = per
            .trim()
            .parse()
            .map_err(|_| RateLimitParseError::Number(per.trim().to_string()))?;
        let burst_size: u32 = burst
            .trim()
            .parse()
            .map_err(|_| RateLimitParseError::Number(burst.trim().to_string()))?;
        if per_second == 0 || burst_size == 0 {
            return Err(RateLimitParseError::Zero);
        }
        Ok(Self::new(per_second, burst_size))
    }
}

/// Route groups that get their own limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    /// Feed and comment reads
    Read,
    /// Votes, RSVPs and comment writes
    Write,
}

impl FromStr for RouteGroup {
    type Err = RateLimitParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "read" | "public" | "public_read" | "public-read" => Ok(Self::Read),
            "write" | "protected" => Ok(Self::Write),
            other => Err(RateLimitParseError::UnknownGroup(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub read: RateLimitRule,
    pub write: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read: RateLimitRule::new(30, 60),
            write: RateLimitRule::new(5, 15),
        }
    }
}

impl RateLimitConfig {
    /// `RATE_LIMIT_ENABLED` toggles limiting. `RATE_LIMIT_CONFIG` is either one
    /// `per:burst` rule for every group or `read=per:burst,write=per:burst`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match cfg.with_overrides(&raw) {
                Ok(updated) => cfg = updated,
                Err(err) => tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err),
            }
        }

        cfg
    }

    pub fn rule(&self, group: RouteGroup) -> RateLimitRule {
        match group {
            RouteGroup::Read => self.read,
            RouteGroup::Write => self.write,
        }
    }

    /// Apply a `RATE_LIMIT_CONFIG` value. Nothing changes unless the whole value parses.
    fn with_overrides(mut self, raw: &str) -> Result<Self, RateLimitParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RateLimitParseError::Empty);
        }

        if !trimmed.contains('=') {
            let rule: RateLimitRule = trimmed.parse()?;
            self.read = rule;
            self.write = rule;
            return Ok(self);
        }

        for item in trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, rule) = item
                .split_once('=')
                .ok_or_else(|| RateLimitParseError::Shape(item.to_string()))?;
            let rule: RateLimitRule = rule.trim().parse()?;
            match name.parse::<RouteGroup>()? {
                RouteGroup::Read => self.read = rule,
                RouteGroup::Write => self.write = rule,
            }
        }
        Ok(self)
    }
}

pub(crate) fn parse_bool_env(var_name: &str, default: bool) -> bool {
    env::var(var_name)
        .ok()
        .and_then(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "no" | "n" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rule_covers_both_groups() {
        let cfg = RateLimitConfig::default().with_overrides("2:4").unwrap();
        assert_eq!(cfg.read, RateLimitRule::new(2, 4));
        assert_eq!(cfg.write, RateLimitRule::new(2, 4));
    }

    #[test]
    fn grouped_rules() {
        let cfg = RateLimitConfig::default()
            .with_overrides("read=3:4, write=5:6")
            .unwrap();
        assert_eq!(cfg.rule(RouteGroup::Read), RateLimitRule::new(3, 4));
        assert_eq!(cfg.rule(RouteGroup::Write), RateLimitRule::new(5, 6));
    }

    #[test]
    fn older_group_names_still_parse() {
        let cfg = RateLimitConfig::default()
            .with_overrides("public-read=8:16,protected=1:2")
            .unwrap();
        assert_eq!(cfg.read, RateLimitRule::new(8, 16));
        assert_eq!(cfg.write, RateLimitRule::new(1, 2));
    }

    #[test]
    fn partial_override_keeps_other_group() {
        let cfg = RateLimitConfig::default().with_overrides("write=1:1").unwrap();
        assert_eq!(cfg.read, RateLimitConfig::default().read);
        assert_eq!(cfg.write, RateLimitRule::new(1, 1));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = RateLimitConfig::default();
        assert_eq!(base.with_overrides("  ").unwrap_err(), RateLimitParseError::Empty);
        assert!(matches!(
            base.with_overrides("write=abc"),
            Err(RateLimitParseError::Shape(_))
        ));
        assert!(matches!(
            base.with_overrides("read=x:1"),
            Err(RateLimitParseError::Number(_))
        ));
        assert_eq!(base.with_overrides("0:5").unwrap_err(), RateLimitParseError::Zero);
        assert!(matches!(
            base.with_overrides("auth=5:10"),
            Err(RateLimitParseError::UnknownGroup(_))
        ));
    }
}
