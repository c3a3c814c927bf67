// --- File: crates/attendu_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

// --- Firestore Config ---
// Holds non-secret Firestore config. Service-account credentials are read
// from the key file at key_path.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FirestoreConfig {
    pub project_id: Option<String>,
    pub key_path: Option<String>,
    /// Base URL override for the Firestore REST API. Set this when talking
    /// to an emulator; authentication is skipped in that case.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Database id, almost always the default database.
    #[serde(default = "default_database_id")]
    pub database_id: String,
}

fn default_database_id() -> String {
    "(default)".to_string()
}

// --- Classifier Config ---
// Endpoints of the face-recognition backend the check-in client talks to.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    pub recognition_url: String,
    pub finalize_url: String,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

// --- Check-In Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CheckinConfig {
    /// How long a scan stays "pending" before the client finalizes it on
    /// its own, in minutes.
    #[serde(default = "default_pending_verification_minutes")]
    pub pending_verification_minutes: u64,
    /// Delay before redirecting away from a terminal check-in state.
    #[serde(default = "default_redirect_delay_secs")]
    pub redirect_delay_secs: u64,
}

fn default_pending_verification_minutes() -> u64 {
    1
}

fn default_redirect_delay_secs() -> u64 {
    2
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            pending_verification_minutes: default_pending_verification_minutes(),
            redirect_delay_secs: default_redirect_delay_secs(),
        }
    }
}

// --- Attendance Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AttendanceConfig {
    /// Reference timezone for calendar-day bucketing.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Absence count at which the teacher alert fires (exact equality).
    #[serde(default = "default_absence_alert_threshold")]
    pub absence_alert_threshold: u32,
    /// Age in minutes after which a still-pending scan is swept.
    #[serde(default = "default_pending_recheck_minutes")]
    pub pending_recheck_minutes: i64,
    /// Interval between sweep runs, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub enable_sweep: bool,
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

fn default_absence_alert_threshold() -> u32 {
    5
}

fn default_pending_recheck_minutes() -> i64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            absence_alert_threshold: default_absence_alert_threshold(),
            pending_recheck_minutes: default_pending_recheck_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            enable_sweep: false,
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory but defaults to localhost:8080
    #[serde(default)]
    pub server: ServerConfig,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub firestore: Option<FirestoreConfig>,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,

    // --- Tunables with defaults ---
    #[serde(default)]
    pub checkin: CheckinConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            firestore: None,
            classifier: None,
            checkin: CheckinConfig::default(),
            attendance: AttendanceConfig::default(),
        }
    }
}
