//! In-process Mopidy stand-in for transport tests.
//!
//! Runs its own runtime on a background thread so it works from plain and
//! async tests alike.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

type Handler = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

#[derive(Clone)]
struct StubState {
    handler: Handler,
    images: Arc<HashMap<String, Vec<u8>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

pub(crate) struct MopidyStub {
    base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MopidyStub {
    /// Serve JSON-RPC with `handler`. Returning `None` yields a JSON-RPC
    /// error reply.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::with_images(handler, HashMap::new())
    }

    /// Also serve `images` under `/images/<name>`.
    pub fn with_images<F>(handler: F, images: HashMap<String, Vec<u8>>) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            handler: Arc::new(handler),
            images: Arc::new(images),
            requests: Arc::clone(&requests),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new()
                    .route("/mopidy/rpc", post(rpc))
                    .route("/images/:name", get(image))
                    .with_state(state);
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });

        Self {
            base_url: format!("http://{}/", addr),
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every JSON-RPC request received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| request["method"].as_str().map(str::to_string))
            .collect()
    }
}

impl Drop for MopidyStub {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

async fn rpc(State(state): State<StubState>, Json(request): Json<Value>) -> Json<Value> {
    state.requests.lock().push(request.clone());

    let method = request["method"].as_str().unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let reply = match (state.handler)(method, &params) {
        Some(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
        None => json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": -32601, "message": "Method not found" }
        }),
    };
    Json(reply)
}

async fn image(
    State(state): State<StubState>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    state.images.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)
}
