//! # Process-wide configuration.
//!
//! [`Config`] is read once at startup and never mutated afterwards: the
//! connection target, per-feature toggles, feature parameters, webhook
//! endpoints, and the restart time zone.
//!
//! Loading layers (in priority order):
//! 1. **Compiled defaults** — [`Config::default()`]
//! 2. **Environment variables** — `BOTVISOR_*` overrides
//!
//! Unparseable override values are ignored with a warning so a typo in the
//! environment degrades to a default instead of refusing to start.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Immutable process-wide settings.
///
/// Feature toggles gate whole behaviors; the matching parameter fields are
/// only consulted when the toggle is on. An empty webhook URL disables that
/// channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote server host.
    pub host: String,
    /// Remote server port.
    pub port: u16,
    /// Identity the session joins under.
    pub username: String,

    /// Webhook URL for the main notification channel (empty = disabled).
    pub notify_url: String,
    /// Webhook URL for the periodic roster report (empty = disabled).
    pub roster_url: String,
    /// Administrator identity for the remote admin interface
    /// (empty = every caller is admitted).
    pub admin_id: String,

    /// Serve the live web control surface while a session is active.
    pub enable_control: bool,
    /// Listening port for the control surface.
    pub control_port: u16,
    /// Serve the static asset/viewer page while a session is active.
    pub enable_assets: bool,
    /// Listening port for the asset server.
    pub asset_port: u16,

    /// Poll for the daily scheduled restart.
    pub enable_restart: bool,
    /// IANA time zone the restart wall-clock check runs in.
    pub restart_timezone: String,

    /// Echo matched chat-reaction phrases (probabilistically).
    pub enable_reactions: bool,
    /// Keep a movement goal on the follow target.
    pub enable_follow: bool,
    /// Player name to follow.
    pub follow_target: String,
    /// Periodically interact with the nearest marker.
    pub enable_clicker: bool,
    /// Periodically report the known-player roster.
    pub enable_roster: bool,
    /// Run the hourly balance-query-then-pay transaction.
    pub enable_autopay: bool,
    /// Recipient of the automated payment.
    pub autopay_recipient: String,

    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            username: "botvisor".to_string(),
            notify_url: String::new(),
            roster_url: String::new(),
            admin_id: String::new(),
            enable_control: false,
            control_port: 3000,
            enable_assets: false,
            asset_port: 3001,
            enable_restart: false,
            restart_timezone: "America/New_York".to_string(),
            enable_reactions: false,
            enable_follow: false,
            follow_target: String::new(),
            enable_clicker: false,
            enable_roster: false,
            enable_autopay: false,
            autopay_recipient: String::new(),
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Loads settings: compiled defaults with `BOTVISOR_*` env overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        apply_env_overrides(&mut cfg);
        debug!(host = %cfg.host, port = cfg.port, username = %cfg.username, "config loaded");
        cfg
    }

    /// Parsed restart time zone, falling back to the default on a bad name.
    pub fn timezone(&self) -> Tz {
        self.restart_timezone.parse().unwrap_or_else(|_| {
            warn!(zone = %self.restart_timezone, "unknown time zone, using America/New_York");
            Tz::America__New_York
        })
    }
}

fn apply_env_overrides(cfg: &mut Config) {
    read_string("BOTVISOR_HOST", &mut cfg.host);
    read_u16("BOTVISOR_PORT", &mut cfg.port);
    read_string("BOTVISOR_USERNAME", &mut cfg.username);

    read_string("BOTVISOR_NOTIFY_URL", &mut cfg.notify_url);
    read_string("BOTVISOR_ROSTER_URL", &mut cfg.roster_url);
    read_string("BOTVISOR_ADMIN_ID", &mut cfg.admin_id);

    read_bool("BOTVISOR_ENABLE_CONTROL", &mut cfg.enable_control);
    read_u16("BOTVISOR_CONTROL_PORT", &mut cfg.control_port);
    read_bool("BOTVISOR_ENABLE_ASSETS", &mut cfg.enable_assets);
    read_u16("BOTVISOR_ASSET_PORT", &mut cfg.asset_port);

    read_bool("BOTVISOR_ENABLE_RESTART", &mut cfg.enable_restart);
    read_string("BOTVISOR_RESTART_TIMEZONE", &mut cfg.restart_timezone);

    read_bool("BOTVISOR_ENABLE_REACTIONS", &mut cfg.enable_reactions);
    read_bool("BOTVISOR_ENABLE_FOLLOW", &mut cfg.enable_follow);
    read_string("BOTVISOR_FOLLOW_TARGET", &mut cfg.follow_target);
    read_bool("BOTVISOR_ENABLE_CLICKER", &mut cfg.enable_clicker);
    read_bool("BOTVISOR_ENABLE_ROSTER", &mut cfg.enable_roster);
    read_bool("BOTVISOR_ENABLE_AUTOPAY", &mut cfg.enable_autopay);
    read_string("BOTVISOR_AUTOPAY_RECIPIENT", &mut cfg.autopay_recipient);
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_string(key: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(key) {
        *slot = v;
    }
}

fn read_bool(key: &str, slot: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        match parse_bool(&v) {
            Some(b) => *slot = b,
            None => warn!(key, value = %v, "ignoring unparseable boolean override"),
        }
    }
}

fn read_u16(key: &str, slot: &mut u16) {
    if let Ok(v) = std::env::var(key) {
        match v.trim().parse() {
            Ok(n) => *slot = n,
            Err(_) => warn!(key, value = %v, "ignoring unparseable port override"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_every_feature() {
        let cfg = Config::default();
        assert!(!cfg.enable_control);
        assert!(!cfg.enable_assets);
        assert!(!cfg.enable_restart);
        assert!(!cfg.enable_reactions);
        assert!(!cfg.enable_follow);
        assert!(!cfg.enable_clicker);
        assert!(!cfg.enable_roster);
        assert!(!cfg.enable_autopay);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn bad_timezone_falls_back() {
        let cfg = Config {
            restart_timezone: "Not/AZone".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.timezone(), Tz::America__New_York);
    }

    #[test]
    fn good_timezone_parses() {
        let cfg = Config {
            restart_timezone: "Europe/Berlin".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.timezone(), Tz::Europe__Berlin);
    }
}
