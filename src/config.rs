// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    /// Base URL of the external calendar API. Overridable so staging and
    /// tests can point at a stand-in service.
    pub calendar_api_base: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let redis_url = env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let calendar_api_base = env::var("CALENDAR_API_BASE")
            .unwrap_or_else(|_| "https://www.googleapis.com".to_string());

        Self {
            database_url,
            redis_url,
            jwt_secret,
            rust_log,
            calendar_api_base,
        }
    }
}
