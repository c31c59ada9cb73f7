//! Engine configuration loaded via OrthoConfig.
//!
//! Every field can be supplied as an `ENGINE_*` environment variable, a CLI
//! flag or a configuration file key. Unset fields fall back to the defaults
//! exposed by the accessors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_ACTIVE_USER_DAYS, DEFAULT_GRANT_MAX_ATTEMPTS, RetryPolicy};
use crate::outbound::queue::DEFAULT_EFFECT_QUEUE_CAPACITY;
use crate::outbound::realtime::DEFAULT_REALTIME_CAPACITY;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RESET_AT: NaiveTime = NaiveTime::MIN;
const DEFAULT_EFFECT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_EFFECT_INITIAL_BACKOFF_MS: u64 = 200;
const DEFAULT_EFFECT_MAX_BACKOFF_MS: u64 = 5_000;
const DEFAULT_AUDIT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_AUDIT_INITIAL_BACKOFF_MS: u64 = 50;
const DEFAULT_AUDIT_MAX_BACKOFF_MS: u64 = 1_000;

/// A configuration value that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {value:?} for {field}: {reason}")]
pub struct SettingsError {
    field: &'static str,
    value: String,
    reason: &'static str,
}

impl SettingsError {
    fn new(field: &'static str, value: &str, reason: &'static str) -> Self {
        Self {
            field,
            value: value.to_owned(),
            reason,
        }
    }
}

/// Configuration for the engine binary and the reset job runner.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ENGINE")]
pub struct EngineSettings {
    /// Leave resets to an external `reset-tasks` run instead of the
    /// in-process scheduler.
    #[ortho_config(default = false)]
    pub disable_scheduler: bool,
    /// PostgreSQL connection string; the in-memory store is used without it.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub database_max_connections: Option<u32>,
    /// Socket address the HTTP server listens on.
    pub bind_addr: Option<String>,
    /// JSON catalogue of levels, badges and tasks upserted at startup.
    pub catalogue_path: Option<PathBuf>,
    /// UTC time of the daily reset, `HH:MM`.
    pub daily_reset_at: Option<String>,
    /// Weekday of the weekly reset, e.g. `mon`.
    pub weekly_reset_day: Option<String>,
    /// UTC time of the weekly reset, `HH:MM`.
    pub weekly_reset_at: Option<String>,
    /// Look-back window in days for users the reset jobs pre-assign.
    pub active_user_days: Option<u32>,
    /// Pending effects the queue holds before producers wait.
    pub effect_queue_capacity: Option<usize>,
    /// Attempts per queued effect before it is dead-lettered.
    pub effect_max_attempts: Option<u32>,
    /// First retry delay for queued effects, in milliseconds.
    pub effect_initial_backoff_ms: Option<u64>,
    /// Upper bound on the retry delay for queued effects, in milliseconds.
    pub effect_max_backoff_ms: Option<u64>,
    /// Attempts per audit write.
    pub audit_max_attempts: Option<u32>,
    /// First retry delay for audit writes, in milliseconds.
    pub audit_initial_backoff_ms: Option<u64>,
    /// Messages buffered per realtime subscriber.
    pub realtime_channel_capacity: Option<usize>,
    /// Optimistic-revision attempts per XP grant.
    pub grant_max_attempts: Option<u32>,
    /// XP granted for a verified answer; zero disables the chained grant.
    pub answer_verified_xp: Option<i64>,
}

fn parse_time(field: &'static str, raw: Option<&str>) -> Result<NaiveTime, SettingsError> {
    raw.map_or(Ok(DEFAULT_RESET_AT), |value| {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| SettingsError::new(field, value, "expected HH:MM"))
    })
}

impl EngineSettings {
    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse()
            .map_err(|_| SettingsError::new("bind_addr", raw, "expected host:port"))
    }

    /// Daily reset time of day (UTC).
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] for anything other than `HH:MM`.
    pub fn daily_reset_at(&self) -> Result<NaiveTime, SettingsError> {
        parse_time("daily_reset_at", self.daily_reset_at.as_deref())
    }

    /// Weekly reset time of day (UTC).
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] for anything other than `HH:MM`.
    pub fn weekly_reset_at(&self) -> Result<NaiveTime, SettingsError> {
        parse_time("weekly_reset_at", self.weekly_reset_at.as_deref())
    }

    /// Weekly reset day, Monday unless configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the value names no weekday.
    pub fn weekly_reset_day(&self) -> Result<Weekday, SettingsError> {
        self.weekly_reset_day
            .as_deref()
            .map_or(Ok(Weekday::Mon), |value| {
                value
                    .trim()
                    .parse::<Weekday>()
                    .map_err(|_| SettingsError::new("weekly_reset_day", value, "expected a weekday"))
            })
    }

    /// Look-back window for active users.
    #[must_use]
    pub fn active_user_days(&self) -> u32 {
        self.active_user_days.unwrap_or(DEFAULT_ACTIVE_USER_DAYS)
    }

    /// Effect queue capacity.
    #[must_use]
    pub fn effect_queue_capacity(&self) -> usize {
        self.effect_queue_capacity
            .unwrap_or(DEFAULT_EFFECT_QUEUE_CAPACITY)
    }

    /// Retry policy for queued effects.
    #[must_use]
    pub fn effect_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.effect_max_attempts
                .unwrap_or(DEFAULT_EFFECT_MAX_ATTEMPTS),
            Duration::from_millis(
                self.effect_initial_backoff_ms
                    .unwrap_or(DEFAULT_EFFECT_INITIAL_BACKOFF_MS),
            ),
            Duration::from_millis(
                self.effect_max_backoff_ms
                    .unwrap_or(DEFAULT_EFFECT_MAX_BACKOFF_MS),
            ),
        )
    }

    /// Retry policy for audit writes.
    #[must_use]
    pub fn audit_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.audit_max_attempts.unwrap_or(DEFAULT_AUDIT_MAX_ATTEMPTS),
            Duration::from_millis(
                self.audit_initial_backoff_ms
                    .unwrap_or(DEFAULT_AUDIT_INITIAL_BACKOFF_MS),
            ),
            Duration::from_millis(DEFAULT_AUDIT_MAX_BACKOFF_MS),
        )
    }

    /// Realtime broadcast buffer per subscriber.
    #[must_use]
    pub fn realtime_channel_capacity(&self) -> usize {
        self.realtime_channel_capacity
            .unwrap_or(DEFAULT_REALTIME_CAPACITY)
    }

    /// Optimistic attempts per grant.
    #[must_use]
    pub fn grant_max_attempts(&self) -> u32 {
        self.grant_max_attempts
            .unwrap_or(DEFAULT_GRANT_MAX_ATTEMPTS)
    }

    /// XP for a verified answer; negative values are treated as zero.
    #[must_use]
    pub fn answer_verified_xp(&self) -> i64 {
        self.answer_verified_xp.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for engine configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 7] = [
        "ENGINE_DISABLE_SCHEDULER",
        "ENGINE_DATABASE_URL",
        "ENGINE_BIND_ADDR",
        "ENGINE_DAILY_RESET_AT",
        "ENGINE_WEEKLY_RESET_DAY",
        "ENGINE_ACTIVE_USER_DAYS",
        "ENGINE_ANSWER_VERIFIED_XP",
    ];

    fn load_from_empty_args() -> EngineSettings {
        EngineSettings::load_from_iter([OsString::from("engine")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert!(!settings.disable_scheduler);
        assert!(settings.database_url.is_none());
        assert_eq!(
            settings.bind_addr().expect("default address"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("socket address")
        );
        assert_eq!(settings.daily_reset_at(), Ok(NaiveTime::MIN));
        assert_eq!(settings.weekly_reset_day(), Ok(Weekday::Mon));
        assert_eq!(settings.active_user_days(), DEFAULT_ACTIVE_USER_DAYS);
        assert_eq!(settings.answer_verified_xp(), 0);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("ENGINE_DISABLE_SCHEDULER", Some("true".to_owned())),
            ("ENGINE_DATABASE_URL", Some("postgres://db/engine".to_owned())),
            ("ENGINE_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            ("ENGINE_DAILY_RESET_AT", Some("03:30".to_owned())),
            ("ENGINE_WEEKLY_RESET_DAY", Some("sun".to_owned())),
            ("ENGINE_ACTIVE_USER_DAYS", Some("7".to_owned())),
            ("ENGINE_ANSWER_VERIFIED_XP", Some("10".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.disable_scheduler);
        assert_eq!(settings.database_url.as_deref(), Some("postgres://db/engine"));
        assert_eq!(
            settings.daily_reset_at(),
            Ok(NaiveTime::from_hms_opt(3, 30, 0).expect("valid time"))
        );
        assert_eq!(settings.weekly_reset_day(), Ok(Weekday::Sun));
        assert_eq!(settings.active_user_days(), 7);
        assert_eq!(settings.answer_verified_xp(), 10);
    }

    #[rstest]
    #[case("25:00")]
    #[case("noon")]
    fn malformed_reset_times_are_rejected(#[case] raw: &str) {
        let settings = EngineSettings {
            daily_reset_at: Some(raw.to_owned()),
            ..EngineSettings::default()
        };
        let error = settings.daily_reset_at().expect_err("rejected");
        assert!(error.to_string().contains("daily_reset_at"));
    }

    #[rstest]
    fn retry_policies_use_configured_budgets() {
        let settings = EngineSettings {
            effect_max_attempts: Some(2),
            audit_max_attempts: Some(4),
            ..EngineSettings::default()
        };
        assert_eq!(settings.effect_retry_policy().max_attempts(), 2);
        assert_eq!(settings.audit_retry_policy().max_attempts(), 4);
    }
}
