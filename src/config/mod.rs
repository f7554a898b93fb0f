//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.
//!
//! Feature flags are captured here into an immutable [`FeatureFlags`]
//! snapshot so a scheduler pass sees one consistent flag state throughout,
//! rather than reading a mutable global ad hoc.

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Boolean gates read once at startup.
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags {
    /// Master gate for all escalation transitions.
    pub escalation: bool,
    /// Gate for the recurring auto-escalation scheduler and the
    /// on-demand evaluator. When false, both are no-ops.
    pub auto_escalation_engine: bool,
    /// Whether exclusion windows (holiday/weekend/emergency) add slack
    /// to resolved SLA allowances.
    pub sla_exclusions: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            escalation: true,
            auto_escalation_engine: true,
            sla_exclusions: true,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Cadence of the auto-escalation scheduler, in seconds.
    pub scheduler_interval_seconds: u64,
    pub flags: FeatureFlags,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            scheduler_interval_seconds: parse_var("CASEFLOW_SCHEDULER_INTERVAL", 3600)?,
            flags: FeatureFlags {
                escalation: bool_var("CASEFLOW_ESCALATION", true)?,
                auto_escalation_engine: bool_var("CASEFLOW_AUTO_ESCALATION", true)?,
                sla_exclusions: bool_var("CASEFLOW_SLA_EXCLUSIONS", true)?,
            },
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be an integer, got '{v}'"))),
        Err(_) => Ok(default),
    }
}

fn bool_var(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::Config(format!(
                "{name} must be a boolean, got '{other}'"
            ))),
        },
        Err(_) => Ok(default),
    }
}
