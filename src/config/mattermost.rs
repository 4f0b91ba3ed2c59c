use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::BackoffPolicy;
use crate::Result;

/// Mattermost chat sink.
///
/// When `url` is empty the binary falls back to a log-only notifier.
#[derive(Serialize, Deserialize, Clone)]
pub struct MattermostConfig {
    /// Server base URL, e.g. `http://localhost:8065`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub team_name: String,

    #[serde(default)]
    pub channel_name: String,

    /// Session establishment retry policy. Its worst case must fit inside
    /// `controller.notify_timeout_ms`.
    #[serde(default = "default_login_policy")]
    pub login: BackoffPolicy,
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            team_name: String::new(),
            channel_name: String::new(),
            login: default_login_policy(),
        }
    }
}

impl std::fmt::Debug for MattermostConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MattermostConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("team_name", &self.team_name)
            .field("channel_name", &self.channel_name)
            .field("login", &self.login)
            .finish()
    }
}

impl MattermostConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(invalid(format!("mattermost.url {} must be http(s)", self.url)));
        }
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("team_name", &self.team_name),
            ("channel_name", &self.channel_name),
        ] {
            if value.is_empty() {
                return Err(invalid(format!("mattermost.{field} is required when url is set")));
            }
        }
        self.login.validate("mattermost.login")
    }
}

/// 3 attempts of 2s each with 200ms..1s pauses, about 6.7s in the worst case.
fn default_login_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        timeout_ms: 2000,
        base_delay_ms: 200,
        max_delay_ms: 1000,
    }
}
