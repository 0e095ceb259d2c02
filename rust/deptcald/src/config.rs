use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    Mock,
    Empty,
}

impl SeedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SeedMode::Mock => "mock",
            SeedMode::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub admin_user: String,
    /// Lowercase hex SHA-256 of the admin password.
    pub admin_password_sha256: String,
    pub seed: SeedMode,
    pub log_level: Level,
}

pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_user: "admin".to_string(),
            admin_password_sha256: sha256_hex("admin"),
            seed: SeedMode::Mock,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let admin_user = std::env::var("DEPTCALD_ADMIN_USER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.admin_user);
        let admin_password_sha256 = std::env::var("DEPTCALD_ADMIN_PASSWORD_SHA256")
            .ok()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()))
            .unwrap_or(defaults.admin_password_sha256);
        let seed = match std::env::var("DEPTCALD_SEED").ok().as_deref().map(str::trim) {
            Some("empty") => SeedMode::Empty,
            _ => SeedMode::Mock,
        };
        let log_level = std::env::var("DEPTCALD_LOG")
            .ok()
            .and_then(|s| Level::from_str(s.trim()).ok())
            .unwrap_or(defaults.log_level);
        Self {
            admin_user,
            admin_password_sha256,
            seed,
            log_level,
        }
    }

    /// Mock credential check against the configured digest.
    pub fn check_admin(&self, username: &str, password: &str) -> bool {
        username == self.admin_user && sha256_hex(password) == self.admin_password_sha256
    }
}
