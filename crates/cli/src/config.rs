//! Process configuration read from the environment (§6.3).

use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_DATABASE_NAME: &str = "exosphere-state-manager";
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3001",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

pub struct Settings {
    pub mongo_uri: String,
    pub mongo_database_name: String,
    pub api_key: String,
    pub secrets_key: [u8; 32],
    pub cors_origins: Vec<String>,
    pub mode: Mode,
}

impl Settings {
    /// Reads every variable `serve` needs to boot. Fails fast: a missing
    /// `STATE_MANAGER_SECRET` or malformed `SECRETS_ENCRYPTION_KEY` is a
    /// startup error, not a lazily-discovered one.
    pub fn from_env() -> Result<Self, String> {
        let mongo_uri = std::env::var("MONGO_URI")
            .map_err(|_| "MONGO_URI must be set".to_string())?;

        let mongo_database_name =
            std::env::var("MONGO_DATABASE_NAME").unwrap_or_else(|_| DEFAULT_DATABASE_NAME.to_string());

        let api_key = std::env::var("STATE_MANAGER_SECRET")
            .map_err(|_| "STATE_MANAGER_SECRET must be set".to_string())?;

        let secrets_key_raw = std::env::var("SECRETS_ENCRYPTION_KEY")
            .map_err(|_| "SECRETS_ENCRYPTION_KEY must be set".to_string())?;
        let secrets_key = engine::secrets::parse_key(&secrets_key_raw)
            .map_err(|e| format!("SECRETS_ENCRYPTION_KEY is invalid: {e}"))?;

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(raw) => raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        let mode = match std::env::var("MODE").as_deref() {
            Ok("production") => Mode::Production,
            _ => Mode::Development,
        };

        Ok(Self { mongo_uri, mongo_database_name, api_key, secrets_key, cors_origins, mode })
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<_> = self
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}
