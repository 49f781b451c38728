use anyhow::Result;
use std::env;

/// Verification settings for access tokens issued by the identity provider.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: String,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;

        if secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters"
            ));
        }

        let audience = env::var("JWT_AUDIENCE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "authenticated".to_string());

        Ok(Self { secret, audience })
    }
}
