//! JSON-RPC client for the Mopidy HTTP frontend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

const RPC_PATH: &str = "/mopidy/rpc";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Request ids are unique for the whole process.
static COMMAND_ID: AtomicU64 = AtomicU64::new(0);

pub fn next_command_id() -> u64 {
    COMMAND_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Why a command produced no result.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server replied with error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("reply carries no result")]
    MissingResult,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct MopidyClient {
    http: Client,
    base_url: Url,
    rpc_url: Url,
}

impl MopidyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Mopidy URL: {}", base_url))?;
        let rpc_url = base_url
            .join(RPC_PATH)
            .context("Failed to build Mopidy RPC URL")?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            rpc_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Send a command and return its result.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CommandError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: next_command_id(),
            method,
            params,
        };
        debug!(url = %self.rpc_url, id = request.id, method, "Sending command");

        let reply: Value = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = reply.get("error") {
            return Err(CommandError::Rpc {
                code: err["code"].as_i64().unwrap_or_default(),
                message: err["message"].as_str().unwrap_or_default().to_string(),
            });
        }
        reply.get("result").cloned().ok_or(CommandError::MissingResult)
    }

    /// Send a command; failures are logged and yield `None`.
    pub async fn send_command(&self, method: &str, params: Option<Value>) -> Option<Value> {
        match self.call(method, params).await {
            Ok(result) => Some(result),
            Err(CommandError::Http(e)) => {
                error!(method, error = %e, "Failed to send command");
                None
            }
            Err(e) => {
                warn!(method, error = %e, "Command failed");
                None
            }
        }
    }

    /// List the refs of a location. The root location is browsed with a
    /// `null` URI.
    pub async fn browse(&self, uri: &str) -> Option<Value> {
        self.send_command("core.library.browse", Some(browse_params(uri)))
            .await
    }

    pub async fn lookup(&self, uris: &[String]) -> Option<Value> {
        self.send_command("core.library.lookup", Some(json!({ "uris": uris })))
            .await
    }

    pub async fn get_images(&self, uris: &[String]) -> Option<Value> {
        self.send_command("core.library.get_images", Some(json!({ "uris": uris })))
            .await
    }

    /// Replace the tracklist with `uris` and start playing.
    pub async fn play_tracks(&self, uris: &[String]) -> bool {
        if uris.is_empty() {
            return false;
        }

        self.send_command("core.tracklist.clear", None).await.is_some()
            && self
                .send_command("core.tracklist.add", Some(json!({ "uris": uris })))
                .await
                .is_some()
            && self.send_command("core.playback.play", None).await.is_some()
    }
}

pub(crate) fn browse_params(uri: &str) -> Value {
    if uri.is_empty() {
        json!({ "uri": null })
    } else {
        json!({ "uri": uri })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::stub::MopidyStub;

    #[test]
    fn test_command_ids_increase() {
        let first = next_command_id();
        let second = next_command_id();
        assert!(second > first);
    }

    #[test]
    fn test_rpc_url() {
        let client = MopidyClient::new("http://mopidy.local:6680/some/page").unwrap();
        assert_eq!(client.rpc_url.as_str(), "http://mopidy.local:6680/mopidy/rpc");
        assert!(MopidyClient::new("not a url").is_err());
    }

    #[test]
    fn test_root_browses_with_null_uri() {
        assert_eq!(browse_params(""), json!({ "uri": null }));
        assert_eq!(browse_params("local:directory"), json!({ "uri": "local:directory" }));
    }

    #[tokio::test]
    async fn test_transport_failure_yields_nothing() {
        let client = MopidyClient::new("http://127.0.0.1:1/").unwrap();
        assert!(client.send_command("core.playback.get_state", None).await.is_none());
        assert!(!client.play_tracks(&["local:track:a".to_string()]).await);
    }

    #[tokio::test]
    async fn test_result_is_returned() {
        let stub = MopidyStub::start(|method, _| match method {
            "core.playback.get_state" => Some(json!("playing")),
            _ => None,
        });
        let client = MopidyClient::new(stub.base_url()).unwrap();

        assert_eq!(
            client.send_command("core.playback.get_state", None).await,
            Some(json!("playing"))
        );

        let requests = stub.requests();
        assert_eq!(requests[0]["jsonrpc"], "2.0");
        assert!(requests[0]["id"].as_u64().unwrap() > 0);
        assert!(requests[0].get("params").is_none());
    }

    #[tokio::test]
    async fn test_rpc_error_is_absent_result() {
        let stub = MopidyStub::start(|_, _| None);
        let client = MopidyClient::new(stub.base_url()).unwrap();

        assert!(client.send_command("core.nope", None).await.is_none());
        assert!(matches!(
            client.call("core.nope", None).await,
            Err(CommandError::Rpc { code: -32601, .. })
        ));
    }

    #[tokio::test]
    async fn test_null_result_counts_as_success() {
        let stub = MopidyStub::start(|method, _| match method {
            "core.tracklist.clear" | "core.playback.play" => Some(Value::Null),
            "core.tracklist.add" => Some(json!([{ "tlid": 1 }])),
            _ => None,
        });
        let client = MopidyClient::new(stub.base_url()).unwrap();

        assert!(client.play_tracks(&["local:track:a".to_string()]).await);
        assert_eq!(
            stub.methods(),
            vec!["core.tracklist.clear", "core.tracklist.add", "core.playback.play"]
        );
        assert_eq!(stub.requests()[1]["params"]["uris"], json!(["local:track:a"]));
    }
}
