#[derive(Clone)]
pub struct Config {
    pub db_base: String,
    pub db_api_key: Option<String>,
    pub email_base: String,
    pub email_api_key: Option<String>,
    pub sqlite_path: String,
    pub cycle_secs: u64,
    pub db_timeout_secs: u64,
    /// Minimum gap between two follow-up emails to the same study.
    pub email_min_hours: f64,
    pub deposit_overdue_days: u32,
    pub ghost_days: u32,
    pub install_stall_days: u32,
    pub fatigue_threshold: f64,
    pub ux_min_score: u32,
    pub email_failure_threshold: u32,
    pub agent_source: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_base: std::env::var("DB_BASE").unwrap_or_else(|_| "http://localhost:54321".to_string()),
            db_api_key: std::env::var("DB_API_KEY").ok(),
            email_base: std::env::var("EMAIL_BASE").unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_api_key: std::env::var("EMAIL_API_KEY").ok(),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./ops.sqlite".to_string()),
            cycle_secs: std::env::var("CYCLE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(900),
            db_timeout_secs: std::env::var("DB_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
            email_min_hours: std::env::var("EMAIL_MIN_HOURS").ok().and_then(|v| v.parse().ok()).unwrap_or(24.0),
            deposit_overdue_days: std::env::var("DEPOSIT_OVERDUE_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            ghost_days: std::env::var("GHOST_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(14),
            install_stall_days: std::env::var("INSTALL_STALL_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            fatigue_threshold: std::env::var("FATIGUE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(70.0),
            ux_min_score: std::env::var("UX_MIN_SCORE").ok().and_then(|v| v.parse().ok()).unwrap_or(60),
            email_failure_threshold: std::env::var("EMAIL_FAILURE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            agent_source: std::env::var("AGENT_SOURCE").unwrap_or_else(|_| "ops-agent".to_string()),
        }
    }
}

pub fn now_ts() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

pub const SECS_PER_HOUR: f64 = 3600.0;
pub const SECS_PER_DAY: u64 = 86_400;
