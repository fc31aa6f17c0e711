use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::types::{ChannelId, GroupId, RoleId, UserId};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub branding: String,
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub notify_role_id: RoleId,
    pub poll_interval_secs: u64,
    pub settle_delay_ms: u64,
    pub db_path: String,
    pub theme: String,
    pub debug: bool,
    pub alert_channel_id: Option<ChannelId>,
    pub alert_user_id: Option<UserId>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            branding: env::var("TRACKER_BRANDING")
                .unwrap_or_else(|_| "Order Tracker".to_string()),
            group_id: GroupId::new(
                env::var("TRACKER_GROUP_ID").context("TRACKER_GROUP_ID must be set")?,
            ),
            channel_id: ChannelId::new(
                env::var("TRACKER_CHANNEL_ID").context("TRACKER_CHANNEL_ID must be set")?,
            ),
            notify_role_id: RoleId::new(
                env::var("TRACKER_NOTIFY_ROLE_ID")
                    .context("TRACKER_NOTIFY_ROLE_ID must be set")?,
            ),
            poll_interval_secs: env::var("TRACKER_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("TRACKER_POLL_INTERVAL_SECS must be a valid number")?,
            settle_delay_ms: env::var("TRACKER_SETTLE_DELAY_MS")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .context("TRACKER_SETTLE_DELAY_MS must be a valid number")?,
            db_path: env::var("TRACKER_DB_PATH")
                .unwrap_or_else(|_| "sqlite:tracker.db".to_string()),
            theme: env::var("TRACKER_THEME").unwrap_or_else(|_| "default".to_string()),
            debug: env::var("TRACKER_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            alert_channel_id: env::var("TRACKER_ALERT_CHANNEL_ID").ok().map(ChannelId::new),
            alert_user_id: env::var("TRACKER_ALERT_USER_ID").ok().map(UserId::new),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
