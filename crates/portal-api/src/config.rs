//! Startup configuration, read once from the environment.

/// Runtime configuration passed into startup. No global state: the values
/// are resolved here and handed to the pieces that need them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. "0.0.0.0:5001".
    pub listen: String,
    /// SQLite database path.
    pub db_path: String,
    /// When set, /api/admin/vacuum requires `Authorization: Bearer <token>`.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen: std::env::var("PORTAL_LISTEN").unwrap_or_else(|_| "0.0.0.0:5001".to_string()),
            db_path: std::env::var("PORTAL_DB").unwrap_or_else(|_| "portal.db".to_string()),
            admin_token: std::env::var("PORTAL_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }
}
