// =============================================================================
// config.rs — THE GRAND CONFIGURATION CATHEDRAL
// =============================================================================
//
// Every system needs configuration, but not every system needs THIS MUCH
// configuration. We have knobs for knobs. Windows for windows. Statutory
// deadlines that control other statutory deadlines.
//
// All values can be overridden via environment variables, because hardcoding
// configuration is how you end up on the front page of Hacker News for the
// wrong reasons. The urgency tier boundaries are NOT in here — those come
// from the statute-shaped logic in the deadline calculator and are not a
// matter of operator preference.
//
// Default values have been carefully chosen through a rigorous process of
// "that's what the FCRA says" and "that seems about right."
// =============================================================================

use std::env;
use std::time::Duration;

use crate::models::{ConsumerInfo, DisputeType};

/// The Grand Configuration Struct. Every tunable parameter in the entire
/// engine lives here. If you need to change something, this is where you
/// come. Think of it as the cockpit of a fighter jet, except instead of
/// controlling weapons systems, you're controlling how aggressively we
/// hold credit bureaus to their statutory response windows.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // REDIS CONFIGURATION
    // =========================================================================

    /// Redis connection URL. This is where we scream escalation events into
    /// the void. The UI app listens on the other end.
    /// Default: redis://127.0.0.1:6379
    pub redis_url: String,

    /// The Redis channel we publish follow-up documents and escalation
    /// events to. The document formatter subscribes and renders.
    pub redis_channel: String,

    /// The Redis sorted set where we persist events with timestamps.
    /// Because pub/sub is fire-and-forget, and we don't want to forget.
    pub redis_sorted_set: String,

    // =========================================================================
    // STATUTORY RESPONSE WINDOWS
    // The heart of the operation. Days, per dispute type. These defaults
    // are what the law actually says; override them only if you are a
    // lawyer, a time traveler, or both.
    // =========================================================================

    /// FCRA §611: a bureau has 30 days to investigate a direct dispute.
    pub bureau_window_days: i64,

    /// FCRA §623: furnisher disputes also run on a 30-day clock.
    pub furnisher_window_days: i64,

    /// FDCPA §809: debt validation. 30 days to validate before the
    /// collector may lawfully continue collection.
    pub validation_window_days: i64,

    /// CFPB complaints: companies are given 60 days for a final response.
    pub cfpb_window_days: i64,

    /// Litigation deadlines vary wildly by court; 30 days is the
    /// answer-or-default window that actually matters to a consumer.
    pub legal_window_days: i64,

    /// Extra days added to every window for jurisdictions (or postures)
    /// that extend the clock — e.g. the 45-day window when a dispute
    /// follows a free annual report. Default 0.
    pub jurisdiction_extension_days: i64,

    // =========================================================================
    // ESCALATION SCHEDULER
    // =========================================================================

    /// How often the daemon ticks the escalation scheduler.
    /// Default: 300 seconds. Deadlines lapse at midnight; checking every
    /// five minutes is already more vigilance than any bureau deserves.
    pub tick_interval: Duration,

    // =========================================================================
    // ESCALATION GUARD PARAMETERS
    // The in-process bloom + LRU fast path in front of the persisted
    // tag check. For when "probably already escalated" saves a scan.
    // =========================================================================

    /// Expected number of guard keys before bloom rotation.
    pub guard_expected_items: u64,

    /// Target false positive rate for the guard's bloom filter.
    /// A false positive here costs one redundant tag check, not a missed
    /// escalation, so 1% is plenty.
    pub guard_false_positive_rate: f64,

    /// How often to rotate the guard's bloom filter (in seconds).
    pub guard_rotation_interval: Duration,

    /// Maximum number of keys in the guard's LRU backup.
    pub guard_lru_size: usize,

    // =========================================================================
    // ANALYTICS SERVER
    // =========================================================================

    /// Port for the analytics HTTP endpoint.
    /// Default: 9090, because Prometheus conventions are conventions.
    pub analytics_port: u16,

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Path of the repository snapshot file. The entire dispute corpus,
    /// serialized as JSON. Loaded at startup, saved after mutating ticks.
    pub snapshot_path: String,

    // =========================================================================
    // DOCUMENT CONTEXT
    // =========================================================================

    /// Consumer identity for follow-up document context. Optional; the
    /// follow-up builder degrades gracefully without it.
    pub consumer: Option<ConsumerInfo>,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    /// "Sensible" here meaning "will work out of the box without any env vars
    /// but will also respect your wishes if you set them."
    ///
    /// Every parameter can be overridden via environment variables prefixed
    /// with DISPUTE_DOOM_. Because namespacing your env vars is what separates
    /// the professionals from the amateurs.
    pub fn from_env() -> Self {
        // Try to load .env file if it exists. Fail silently if it doesn't,
        // because not everyone has their life together enough to create
        // a .env file.
        let _ = dotenvy::dotenv();

        let consumer_name = env::var("DISPUTE_DOOM_CONSUMER_NAME").ok();
        let consumer = consumer_name.map(|name| ConsumerInfo {
            name,
            address: env::var("DISPUTE_DOOM_CONSUMER_ADDRESS").ok(),
            state: env::var("DISPUTE_DOOM_CONSUMER_STATE").ok(),
        });

        Config {
            // Redis
            redis_url: env_or_default("DISPUTE_DOOM_REDIS_URL", "redis://127.0.0.1:6379"),
            redis_channel: env_or_default("DISPUTE_DOOM_REDIS_CHANNEL", "dispute:events"),
            redis_sorted_set: env_or_default(
                "DISPUTE_DOOM_REDIS_SORTED_SET",
                "dispute:events:history",
            ),

            // Statutory windows (days)
            bureau_window_days: env_or_default("DISPUTE_DOOM_BUREAU_WINDOW_DAYS", "30")
                .parse()
                .unwrap_or(30),
            furnisher_window_days: env_or_default("DISPUTE_DOOM_FURNISHER_WINDOW_DAYS", "30")
                .parse()
                .unwrap_or(30),
            validation_window_days: env_or_default("DISPUTE_DOOM_VALIDATION_WINDOW_DAYS", "30")
                .parse()
                .unwrap_or(30),
            cfpb_window_days: env_or_default("DISPUTE_DOOM_CFPB_WINDOW_DAYS", "60")
                .parse()
                .unwrap_or(60),
            legal_window_days: env_or_default("DISPUTE_DOOM_LEGAL_WINDOW_DAYS", "30")
                .parse()
                .unwrap_or(30),
            jurisdiction_extension_days: env_or_default("DISPUTE_DOOM_EXTENSION_DAYS", "0")
                .parse()
                .unwrap_or(0),

            // Scheduler tick
            tick_interval: Duration::from_secs(
                env_or_default("DISPUTE_DOOM_TICK_SECS", "300")
                    .parse()
                    .unwrap_or(300),
            ),

            // Escalation guard
            guard_expected_items: env_or_default("DISPUTE_DOOM_GUARD_ITEMS", "10000")
                .parse()
                .unwrap_or(10_000),
            guard_false_positive_rate: env_or_default("DISPUTE_DOOM_GUARD_FP_RATE", "0.01")
                .parse()
                .unwrap_or(0.01),
            guard_rotation_interval: Duration::from_secs(
                env_or_default("DISPUTE_DOOM_GUARD_ROTATION_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            guard_lru_size: env_or_default("DISPUTE_DOOM_GUARD_LRU_SIZE", "10000")
                .parse()
                .unwrap_or(10_000),

            // Analytics
            analytics_port: env_or_default("DISPUTE_DOOM_ANALYTICS_PORT", "9090")
                .parse()
                .unwrap_or(9090),

            // Persistence
            snapshot_path: env_or_default("DISPUTE_DOOM_SNAPSHOT_PATH", "disputes.json"),

            consumer,
        }
    }

    /// The statutory response window for a dispute type, in days, with the
    /// jurisdiction extension applied. The deadline a dispute is born with
    /// comes from here — and is then frozen onto the record forever.
    pub fn response_window_days(&self, dispute_type: DisputeType) -> i64 {
        let base = match dispute_type {
            DisputeType::Bureau => self.bureau_window_days,
            DisputeType::Furnisher => self.furnisher_window_days,
            DisputeType::Validation => self.validation_window_days,
            DisputeType::Cfpb => self.cfpb_window_days,
            DisputeType::Legal => self.legal_window_days,
        };
        base + self.jurisdiction_extension_days
    }
}

impl Default for Config {
    /// A config with all defaults and no environment involvement.
    /// Tests use this so they don't inherit whatever env vars the
    /// developer's shell is marinating in.
    fn default() -> Self {
        Config {
            redis_url: "redis://127.0.0.1:6379".into(),
            redis_channel: "dispute:events".into(),
            redis_sorted_set: "dispute:events:history".into(),
            bureau_window_days: 30,
            furnisher_window_days: 30,
            validation_window_days: 30,
            cfpb_window_days: 60,
            legal_window_days: 30,
            jurisdiction_extension_days: 0,
            tick_interval: Duration::from_secs(300),
            guard_expected_items: 10_000,
            guard_false_positive_rate: 0.01,
            guard_rotation_interval: Duration::from_secs(3600),
            guard_lru_size: 10_000,
            analytics_port: 9090,
            snapshot_path: "disputes.json".into(),
            consumer: None,
        }
    }
}

/// Helper function to read an environment variable with a default fallback.
/// Because unwrap_or on env::var is ugly and we have standards.
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows_match_statute() {
        let config = Config::default();
        assert_eq!(config.response_window_days(DisputeType::Bureau), 30);
        assert_eq!(config.response_window_days(DisputeType::Furnisher), 30);
        assert_eq!(config.response_window_days(DisputeType::Validation), 30);
        assert_eq!(config.response_window_days(DisputeType::Cfpb), 60);
        assert_eq!(config.response_window_days(DisputeType::Legal), 30);
    }

    #[test]
    fn test_jurisdiction_extension_applies_to_every_window() {
        let config = Config {
            jurisdiction_extension_days: 15,
            ..Config::default()
        };
        assert_eq!(config.response_window_days(DisputeType::Bureau), 45);
        assert_eq!(config.response_window_days(DisputeType::Cfpb), 75);
    }
}
