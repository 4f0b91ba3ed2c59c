use std::marker::PhantomData;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ResourceEventHandler;
use super::WatchEvent;
use super::WatchSource;
use crate::Resource;
use crate::Result;
use crate::WatchConfig;
use crate::WatchError;

/// List-then-watch over the Kubernetes API, using `kubectl get --raw` as the
/// transport so cluster credentials come from the usual kubeconfig.
pub struct KubectlWatchSource<R> {
    kubectl: String,
    namespace: Option<String>,
    relist_backoff: Duration,
    _kind: PhantomData<fn() -> R>,
}

/// How a watch stream ended
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WatchEnd {
    Shutdown,
    /// Stream closed normally; resume from the last seen version
    Closed,
    /// Version too old or server error; a relist is required
    Expired,
}

#[derive(Deserialize)]
struct ObjectList<R> {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default = "Vec::new")]
    items: Vec<R>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    #[serde(default)]
    resource_version: String,
}

#[derive(Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    object: serde_json::Value,
}

impl<R: Resource + DeserializeOwned> KubectlWatchSource<R> {
    pub fn new(
        config: &WatchConfig,
        namespace: Option<String>,
    ) -> Self {
        Self {
            kubectl: config.kubectl_path.clone(),
            namespace,
            relist_backoff: config.relist_backoff(),
            _kind: PhantomData,
        }
    }

    pub(crate) fn list_path(&self) -> String {
        R::api_path(self.namespace.as_deref())
    }

    pub(crate) fn watch_path(
        &self,
        resource_version: &str,
    ) -> String {
        format!(
            "{}?watch=1&resourceVersion={}",
            self.list_path(),
            resource_version
        )
    }

    /// Fetches the full collection. `Ok(None)` means shutdown interrupted it.
    pub(crate) async fn list(
        &self,
        shutdown: &CancellationToken,
    ) -> std::result::Result<Option<(Vec<R>, String)>, WatchError> {
        let child = Command::new(&self.kubectl)
            .args(["get", "--raw", &self.list_path()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(WatchError::Spawn)?;

        // Dropping the pending output future kills the child.
        let output = tokio::select! {
            _ = shutdown.cancelled() => return Ok(None),
            output = child.wait_with_output() => output?,
        };

        if !output.status.success() {
            return Err(WatchError::Status(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_list(&output.stdout).map(Some)
    }

    /// Streams events after `resource_version` until the stream ends.
    async fn watch_from(
        &self,
        resource_version: &mut String,
        handler: &dyn ResourceEventHandler<R>,
        shutdown: &CancellationToken,
    ) -> std::result::Result<WatchEnd, WatchError> {
        let mut child = Command::new(&self.kubectl)
            .args(["get", "--raw", &self.watch_path(resource_version)])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(WatchError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WatchError::Status("watch process has no stdout".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        // Drained concurrently so a chatty stderr cannot stall the child.
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return Ok(WatchEnd::Shutdown),
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                let status = tokio::select! {
                    _ = shutdown.cancelled() => return Ok(WatchEnd::Shutdown),
                    status = child.wait() => status?,
                };
                if status.success() {
                    return Ok(WatchEnd::Closed);
                }
                let stderr = match stderr {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                warn!(kind = R::KIND, %status, stderr = %stderr.trim(), "watch process failed, relisting");
                return Ok(WatchEnd::Expired);
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_watch_line::<R>(&line) {
                Ok(Some(event)) => {
                    if let Some(rv) = event_resource_version(&event) {
                        *resource_version = rv;
                    }
                    event.dispatch(handler);
                }
                Ok(None) => {}
                Err(WatchError::Status(msg)) => {
                    warn!(kind = R::KIND, %msg, "watch stream reported an error, relisting");
                    return Ok(WatchEnd::Expired);
                }
                Err(e) => {
                    warn!(kind = R::KIND, error = %e, "skipping undecodable watch event");
                }
            }
        }
    }
}

#[async_trait]
impl<R: Resource + DeserializeOwned> WatchSource<R> for KubectlWatchSource<R> {
    async fn run(
        &self,
        handler: Arc<dyn ResourceEventHandler<R>>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut listed_once = false;
        loop {
            let (items, mut resource_version) = match self.list(&shutdown).await {
                Ok(Some(listing)) => listing,
                Ok(None) => return Ok(()),
                Err(e) if !listed_once => return Err(e.into()),
                Err(e) => {
                    warn!(kind = R::KIND, error = %e, "relist failed");
                    if sleep_or_cancel(self.relist_backoff, &shutdown).await {
                        return Ok(());
                    }
                    continue;
                }
            };
            info!(kind = R::KIND, items = items.len(), %resource_version, "listed");
            handler.on_replace(items);
            listed_once = true;

            loop {
                match self
                    .watch_from(&mut resource_version, handler.as_ref(), &shutdown)
                    .await
                {
                    Ok(WatchEnd::Shutdown) => return Ok(()),
                    Ok(WatchEnd::Closed) => {
                        debug!(kind = R::KIND, %resource_version, "watch closed, resuming");
                    }
                    Ok(WatchEnd::Expired) => break,
                    Err(e) => {
                        warn!(kind = R::KIND, error = %e, "watch failed, relisting");
                        break;
                    }
                }
                if sleep_or_cancel(self.relist_backoff, &shutdown).await {
                    return Ok(());
                }
            }
            if sleep_or_cancel(self.relist_backoff, &shutdown).await {
                return Ok(());
            }
        }
    }
}

/// Returns true when cancelled before `delay` elapsed.
async fn sleep_or_cancel(
    delay: Duration,
    shutdown: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

pub(crate) fn event_resource_version<R: Resource>(event: &WatchEvent<R>) -> Option<String> {
    match event {
        WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
            obj.metadata().resource_version.clone()
        }
        WatchEvent::Listed(_) => None,
    }
}

/// Decodes a list response into its items and collection version.
pub(crate) fn parse_list<R: DeserializeOwned>(
    body: &[u8]
) -> std::result::Result<(Vec<R>, String), WatchError> {
    let list: ObjectList<R> = serde_json::from_slice(body)?;
    Ok((list.items, list.metadata.resource_version))
}

/// Decodes one line of a watch stream.
///
/// Bookmarks and unknown event types decode to `None`; `ERROR` events become [`WatchError::Status`].
pub(crate) fn parse_watch_line<R: DeserializeOwned>(
    line: &str
) -> std::result::Result<Option<WatchEvent<R>>, WatchError> {
    let raw: RawWatchEvent = serde_json::from_str(line)?;
    let event = match raw.event_type.as_str() {
        "ADDED" => WatchEvent::Added(serde_json::from_value(raw.object)?),
        "MODIFIED" => WatchEvent::Modified(serde_json::from_value(raw.object)?),
        "DELETED" => WatchEvent::Deleted(serde_json::from_value(raw.object)?),
        "BOOKMARK" => return Ok(None),
        "ERROR" => {
            let message = raw
                .object
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown watch error")
                .to_string();
            return Err(WatchError::Status(message));
        }
        other => {
            debug!(event_type = other, "ignoring unknown watch event type");
            return Ok(None);
        }
    };
    Ok(Some(event))
}
