//! Scripted in-process backend used by the unit tests.

use async_trait::async_trait;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use problum_types::{ApiResponse, ClientError, OutboundRequest, Transport, traits::Result};
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

pub(crate) const BASE: &str = "http://backend.test/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
}

/// Accepts bearer tokens from `valid`; `/auth/refresh` pops the next scripted
/// token (`None` rejects) and, when gated, waits for [`FakeBackend::open`].
/// [`FakeBackend::fail_refresh_transport`] turns refresh into a transport error.
pub(crate) struct FakeBackend {
    valid: Mutex<HashSet<String>>,
    refresh_tokens: Mutex<VecDeque<Option<String>>>,
    gated: bool,
    gate: Notify,
    refresh_unreachable: AtomicBool,
    refresh_calls: AtomicUsize,
    log: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new(refresh_tokens: &[Option<&str>], gated: bool) -> Arc<Self> {
        Arc::new(Self {
            valid: Mutex::new(HashSet::new()),
            refresh_tokens: Mutex::new(
                refresh_tokens
                    .iter()
                    .map(|t| t.map(str::to_string))
                    .collect(),
            ),
            gated,
            gate: Notify::new(),
            refresh_unreachable: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn accept(&self, token: &str) {
        self.valid.lock().insert(token.to_string());
    }

    /// Make `/auth/refresh` fail as if the connection dropped.
    pub fn fail_refresh_transport(&self) {
        self.refresh_unreachable.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Non-refresh calls in arrival order.
    pub fn calls(&self) -> Vec<Call> {
        self.log
            .lock()
            .iter()
            .filter(|c| c.path != "/auth/refresh")
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    fn json(status: StatusCode, body: &serde_json::Value) -> ApiResponse {
        ApiResponse::new(status, body.to_string())
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse> {
        let full = request.url.strip_prefix(BASE).unwrap_or(&request.url);
        let path = full.split('?').next().unwrap_or(full).to_string();
        let bearer = request.bearer_token().map(str::to_string);
        self.log.lock().push(Call {
            method: request.method.clone(),
            path: path.clone(),
            bearer: bearer.clone(),
        });

        match path.as_str() {
            "/auth/refresh" => {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                if self.gated {
                    self.gate.notified().await;
                }
                if self.refresh_unreachable.load(Ordering::SeqCst) {
                    return Err(ClientError::Transport("connection reset".into()));
                }
                let next = self.refresh_tokens.lock().pop_front().flatten();
                Ok(match next {
                    Some(token) => {
                        self.accept(&token);
                        Self::json(StatusCode::OK, &serde_json::json!({ "access_token": token }))
                    }
                    None => ApiResponse::new(StatusCode::UNAUTHORIZED, ""),
                })
            }
            "/auth/login" | "/auth/register" => {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body.as_deref().unwrap_or_default())?;
                if body["password"] == "secret" {
                    self.accept("tok1");
                    Ok(Self::json(
                        StatusCode::OK,
                        &serde_json::json!({ "access_token": "tok1", "expires_at": 900 }),
                    ))
                } else {
                    Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, ""))
                }
            }
            "/auth/logout" => Ok(ApiResponse::new(StatusCode::NO_CONTENT, "")),
            "/unreachable" => Err(ClientError::Transport("connection refused".into())),
            "/missing" => Ok(ApiResponse::new(StatusCode::NOT_FOUND, "not found")),
            "/always-401" => Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "")),
            _ => {
                let authorized = bearer
                    .as_deref()
                    .is_some_and(|b| self.valid.lock().contains(b));
                if authorized {
                    Ok(Self::json(
                        StatusCode::OK,
                        &serde_json::json!({ "path": path, "token": bearer }),
                    ))
                } else {
                    Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, ""))
                }
            }
        }
    }
}

/// Let spawned tasks run until they park.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
