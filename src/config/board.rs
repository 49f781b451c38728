use std::env;
use std::time::Duration;

use super::rate_limit::parse_bool_env;
use crate::services::{comment::DEFAULT_MAX_REPLY_DEPTH, counter::CounterMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Offline mode: in-process store seeded with demo events.
    Memory,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "memory" | "offline" | "demo" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub backend: StoreBackend,
    pub counter_mode: CounterMode,
    /// `None` disables the background counter reconciliation.
    pub reconcile_interval: Option<Duration>,
    /// Nesting cap for comment trees and indentation cap for flat rows.
    pub max_render_depth: usize,
    /// Replies deeper than this are rejected.
    pub max_reply_depth: usize,
    pub seed_demo_events: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            counter_mode: CounterMode::Atomic,
            reconcile_interval: None,
            max_render_depth: DEFAULT_MAX_REPLY_DEPTH,
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            seed_demo_events: true,
        }
    }
}

impl BoardConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("STORE_BACKEND") {
            match StoreBackend::parse(&raw) {
                Some(backend) => cfg.backend = backend,
                None => tracing::warn!("Invalid STORE_BACKEND '{}', using postgres", raw),
            }
        }

        if let Ok(raw) = env::var("COUNTER_MODE") {
            match CounterMode::parse(&raw) {
                Some(mode) => cfg.counter_mode = mode,
                None => tracing::warn!("Invalid COUNTER_MODE '{}', using atomic", raw),
            }
        }

        cfg.reconcile_interval = env::var("RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        cfg.max_render_depth = env::var("COMMENT_MAX_RENDER_DEPTH")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(cfg.max_render_depth);

        cfg.max_reply_depth = env::var("COMMENT_MAX_REPLY_DEPTH")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(cfg.max_reply_depth);

        cfg.seed_demo_events = parse_bool_env("SEED_DEMO_EVENTS", cfg.seed_demo_events);

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_names() {
        assert_eq!(StoreBackend::parse("Postgres"), Some(StoreBackend::Postgres));
        assert_eq!(StoreBackend::parse(" memory "), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("offline"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("sqlite"), None);
    }

    #[test]
    fn defaults() {
        let cfg = BoardConfig::default();
        assert_eq!(cfg.backend, StoreBackend::Postgres);
        assert_eq!(cfg.counter_mode, CounterMode::Atomic);
        assert_eq!(cfg.reconcile_interval, None);
        assert_eq!(cfg.max_render_depth, 8);
        assert_eq!(cfg.max_reply_depth, 8);
    }
}
