use async_trait::async_trait;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Notifier;
use crate::constants::MATTERMOST_LOGIN_PATH;
use crate::constants::MATTERMOST_POSTS_PATH;
use crate::constants::MATTERMOST_TOKEN_HEADER;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::MattermostConfig;
use crate::NotifyError;

/// Authenticated state reused across posts.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    channel_id: String,
}

#[derive(Deserialize)]
struct Channel {
    id: String,
}

/// Posts notifications to a Mattermost channel over API v4.
///
/// The session is established lazily on first use and kept until the server
/// answers `401`, at which point it is re-established once for that post.
pub struct MattermostNotifier {
    config: MattermostConfig,
    http: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl MattermostNotifier {
    pub fn new(config: MattermostConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session: Mutex::new(None),
        }
    }

    fn url(
        &self,
        path: &str,
    ) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Returns the cached session, establishing one if needed.
    async fn session(&self) -> Result<Session, NotifyError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let session = task_with_timeout_and_exponential_backoff(
            || self.establish(),
            self.config.login,
            NotifyError::Timeout,
        )
        .await?;
        info!(
            team = %self.config.team_name,
            channel = %self.config.channel_name,
            "mattermost session established"
        );
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn invalidate(&self) {
        self.session.lock().await.take();
    }

    async fn establish(&self) -> Result<Session, NotifyError> {
        let token = self.login().await?;
        let channel_id = self.channel_id(&token).await?;
        Ok(Session { token, channel_id })
    }

    async fn login(&self) -> Result<String, NotifyError> {
        let resp = self
            .http
            .post(self.url(MATTERMOST_LOGIN_PATH))
            .json(&json!({
                "login_id": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        resp.headers()
            .get(MATTERMOST_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| NotifyError::Login(format!("response carried no {MATTERMOST_TOKEN_HEADER} header")))
    }

    async fn channel_id(
        &self,
        token: &str,
    ) -> Result<String, NotifyError> {
        let path = format!(
            "/api/v4/teams/name/{}/channels/name/{}",
            self.config.team_name, self.config.channel_name
        );
        let resp = self.http.get(self.url(&path)).bearer_auth(token).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(NotifyError::ChannelNotFound {
                team: self.config.team_name.clone(),
                channel: self.config.channel_name.clone(),
            });
        }
        let channel: Channel = check_status(resp).await?.json().await?;
        Ok(channel.id)
    }

    async fn post(
        &self,
        session: &Session,
        message: &str,
    ) -> Result<(), NotifyError> {
        let resp = self
            .http
            .post(self.url(MATTERMOST_POSTS_PATH))
            .bearer_auth(&session.token)
            .json(&json!({
                "channel_id": session.channel_id,
                "message": message,
            }))
            .send()
            .await?;
        check_status(resp).await?;
        debug!(channel_id = %session.channel_id, "posted");
        Ok(())
    }
}

#[async_trait]
impl Notifier for MattermostNotifier {
    async fn notify(
        &self,
        message: &str,
    ) -> Result<(), NotifyError> {
        let session = self.session().await?;
        match self.post(&session, message).await {
            Err(NotifyError::Status { status: 401, .. }) => {
                warn!("mattermost session expired, logging in again");
                self.invalidate().await;
                let session = self.session().await?;
                self.post(&session, message).await
            }
            other => other,
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, NotifyError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(NotifyError::Status {
        status: status.as_u16(),
        body,
    })
}
