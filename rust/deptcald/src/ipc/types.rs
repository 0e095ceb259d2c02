use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub token: String,
    pub username: String,
    pub started_at: String,
}

pub struct AppState {
    pub db: Connection,
    pub config: Config,
    pub admin: Option<AdminSession>,
}

impl AppState {
    pub fn new(db: Connection, config: Config) -> Self {
        Self {
            db,
            config,
            admin: None,
        }
    }
}
