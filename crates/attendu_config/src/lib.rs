// --- File: crates/attendu_config/src/lib.rs ---
use config::{Config, ConfigError, Environment, File};

pub mod models;
pub use models::{
    AppConfig, AttendanceConfig, CheckinConfig, ClassifierConfig, FirestoreConfig, ServerConfig,
};

/// Loads the application configuration.
///
/// Sources, later ones override earlier ones:
/// 1. `config/default.toml` (optional)
/// 2. `config/{RUN_ENV}.toml` (optional, e.g. `RUN_ENV=production`)
/// 3. Environment variables with the `APP_` prefix and `__` as the section
///    separator, e.g. `APP_SERVER__PORT=9000`,
///    `APP_FIRESTORE__PROJECT_ID=attendu-prod`.
///
/// A `.env` file is loaded first so local development can keep overrides
/// out of the shell profile.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let _ = dotenv::dotenv();

    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()
}
