//! Request/response channel between the in-page engine and the service that
//! owns the prompt library and the optimize collaborator.
//!
//! # Protocol
//!
//! Requests travel inside an [`Envelope`] carrying a fresh request id; every
//! [`Reply`] echoes it. Requests are JSON objects tagged by `type`:
//!
//! ```json
//! {"requestId": "0b9c...", "request": {"type": "ping"}}
//! {"requestId": "4f1a...", "request": {"type": "search", "filter": {"term": "wor", "limit": 10}}}
//! {"requestId": "77d2...", "request": {"type": "increment-use", "id": "p1"}}
//! {"requestId": "a3e0...", "request": {"type": "optimize", "text": "draft", "mode": "concise"}}
//! ```
//!
//! The [`Bridge`] is the client side. It drops replies whose id is not the
//! one it is waiting for, which is how late answers to abandoned requests are
//! discarded. [`RemoteStore`] and [`RemoteOptimizer`] expose a shared bridge
//! as the two collaborator traits.

use std::sync::Arc;
use std::thread::JoinHandle;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{BridgeError, OptimizeError, StoreError};
use crate::optimize::{OptimizeMode, Optimizer};
use crate::prompt::{PromptFilter, PromptPatch, PromptRecord};
use crate::store::PromptStore;

/// Queue depth for each direction of the bridge
pub const BRIDGE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    Ping,
    GetAll,
    GetById {
        id: String,
    },
    Save {
        record: PromptRecord,
    },
    Update {
        id: String,
        patch: PromptPatch,
    },
    SoftDelete {
        id: String,
    },
    IncrementUse {
        id: String,
    },
    Search {
        #[serde(default)]
        filter: PromptFilter,
    },
    Optimize {
        text: String,
        #[serde(default)]
        mode: OptimizeMode,
    },
    TitleFor {
        text: String,
    },
}

impl Request {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::GetAll => "get-all",
            Request::GetById { .. } => "get-by-id",
            Request::Save { .. } => "save",
            Request::Update { .. } => "update",
            Request::SoftDelete { .. } => "soft-delete",
            Request::IncrementUse { .. } => "increment-use",
            Request::Search { .. } => "search",
            Request::Optimize { .. } => "optimize",
            Request::TitleFor { .. } => "title-for",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request_id: String,
    pub request: Request,
}

impl Envelope {
    pub fn new(request: Request) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            request,
        }
    }
}

/// Failure class carried by an unsuccessful reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyErrorKind {
    NotFound,
    Validation,
    Storage,
    Optimize,
    /// The service has no collaborator for this request
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ReplyErrorKind>,
    /// Classified optimize failure, so the caller can show the same message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimize_error: Option<OptimizeError>,
}

impl Reply {
    pub fn ok(request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            optimize_error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, kind: ReplyErrorKind, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            optimize_error: None,
        }
    }

    fn optimize_failed(request_id: impl Into<String>, error: OptimizeError) -> Self {
        let mut reply = Self::failed(request_id, ReplyErrorKind::Optimize, error.user_message());
        reply.optimize_error = Some(error);
        reply
    }
}

enum Failure {
    Request(ReplyErrorKind, String),
    Optimize(OptimizeError),
}

impl From<StoreError> for Failure {
    /// Not-found and validation failures carry their bare detail so the
    /// client can rebuild the same `StoreError`
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Failure::Request(ReplyErrorKind::NotFound, id),
            StoreError::Validation(msg) => Failure::Request(ReplyErrorKind::Validation, msg),
            other => Failure::Request(ReplyErrorKind::Storage, other.to_string()),
        }
    }
}

/// Answers requests against a store and an optional optimizer
#[derive(Clone)]
pub struct BackgroundService {
    store: Arc<dyn PromptStore>,
    optimizer: Option<Arc<dyn Optimizer>>,
}

impl BackgroundService {
    pub fn new(store: Arc<dyn PromptStore>, optimizer: Option<Arc<dyn Optimizer>>) -> Self {
        Self { store, optimizer }
    }

    #[instrument(skip_all, fields(request_id = %envelope.request_id, kind = envelope.request.kind()))]
    pub fn handle(&self, envelope: Envelope) -> Reply {
        let id = envelope.request_id;
        match self.dispatch(envelope.request) {
            Ok(data) => Reply::ok(id, data),
            Err(Failure::Request(kind, message)) => {
                warn!(?kind, error = %message, "Request failed");
                Reply::failed(id, kind, message)
            }
            Err(Failure::Optimize(error)) => {
                warn!(error = %error, "Optimize request failed");
                Reply::optimize_failed(id, error)
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Value, Failure> {
        let store_err = Failure::from;
        let optimize_err = Failure::Optimize;
        let encode = |v: Result<Value, serde_json::Error>| {
            v.map_err(|e| Failure::Request(ReplyErrorKind::Storage, e.to_string()))
        };

        match request {
            Request::Ping => Ok(Value::String("pong".into())),
            Request::GetAll => encode(serde_json::to_value(
                self.store.get_all().map_err(store_err)?,
            )),
            Request::GetById { id } => encode(serde_json::to_value(
                self.store.get_by_id(&id).map_err(store_err)?,
            )),
            Request::Save { record } => {
                self.store.save(record).map_err(store_err)?;
                Ok(Value::Null)
            }
            Request::Update { id, patch } => {
                self.store.update(&id, patch).map_err(store_err)?;
                Ok(Value::Null)
            }
            Request::SoftDelete { id } => {
                self.store.soft_delete(&id).map_err(store_err)?;
                Ok(Value::Null)
            }
            Request::IncrementUse { id } => {
                self.store.increment_use(&id).map_err(store_err)?;
                Ok(Value::Null)
            }
            Request::Search { filter } => encode(serde_json::to_value(
                self.store.search(&filter).map_err(store_err)?,
            )),
            Request::Optimize { text, mode } => {
                let optimizer = self.optimizer()?;
                let optimized = optimizer.optimize(&text, mode).map_err(optimize_err)?;
                Ok(Value::String(optimized))
            }
            Request::TitleFor { text } => {
                let optimizer = self.optimizer()?;
                let title = optimizer.title_for(&text).map_err(optimize_err)?;
                Ok(Value::String(title))
            }
        }
    }

    fn optimizer(&self) -> Result<&Arc<dyn Optimizer>, Failure> {
        self.optimizer.as_ref().ok_or_else(|| {
            Failure::Request(
                ReplyErrorKind::Unsupported,
                "No optimizer is configured".to_string(),
            )
        })
    }

    /// Serve requests on a background thread until the bridge is dropped
    pub fn spawn(self) -> (Bridge, JoinHandle<()>) {
        let (request_tx, request_rx) = async_channel::bounded::<Envelope>(BRIDGE_CAPACITY);
        let (reply_tx, reply_rx) = async_channel::bounded::<Reply>(BRIDGE_CAPACITY);

        let handle = std::thread::spawn(move || {
            info!("Background service started");
            while let Ok(envelope) = request_rx.recv_blocking() {
                let reply = self.handle(envelope);
                if reply_tx.send_blocking(reply).is_err() {
                    debug!("Reply channel closed");
                    break;
                }
            }
            info!("Background service exiting");
        });

        (Bridge::new(request_tx, reply_rx), handle)
    }
}

/// Client end of the channel
#[derive(Debug)]
pub struct Bridge {
    requests: Sender<Envelope>,
    replies: Receiver<Reply>,
    /// One request in flight at a time, so replies pair with their sender
    in_flight: Mutex<()>,
}

impl Bridge {
    pub fn new(requests: Sender<Envelope>, replies: Receiver<Reply>) -> Self {
        Self {
            requests,
            replies,
            in_flight: Mutex::new(()),
        }
    }

    /// Send a request and wait for the reply with its id
    pub fn send(&self, request: Request) -> Result<Reply, BridgeError> {
        let _guard = self.in_flight.lock();
        let envelope = Envelope::new(request);
        let request_id = envelope.request_id.clone();
        debug!(%request_id, kind = envelope.request.kind(), "Bridge request");

        self.requests
            .send_blocking(envelope)
            .map_err(|_| BridgeError::Disconnected)?;

        loop {
            let reply = self
                .replies
                .recv_blocking()
                .map_err(|_| BridgeError::Disconnected)?;
            if reply.request_id == request_id {
                return Ok(reply);
            }
            debug!(
                expected = %request_id,
                received = %reply.request_id,
                "Discarding reply for another request"
            );
        }
    }

    /// Send and decode the reply data
    pub fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T, BridgeError> {
        let reply = self.send(request)?;
        decode(reply).map_err(|(_, message)| BridgeError::Remote(message))?
    }
}

/// Reply data as `T`, or the failure it reports
fn decode<T: DeserializeOwned>(
    reply: Reply,
) -> Result<Result<T, BridgeError>, (Option<ReplyErrorKind>, String)> {
    if !reply.success {
        return Err((
            reply.error_kind,
            reply.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    let data = reply.data.unwrap_or(Value::Null);
    Ok(serde_json::from_value(data).map_err(|e| BridgeError::Malformed(e.to_string())))
}

/// [`PromptStore`] served over a [`Bridge`]
#[derive(Debug, Clone)]
pub struct RemoteStore {
    bridge: Arc<Bridge>,
}

impl RemoteStore {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn request<T: DeserializeOwned>(&self, request: Request) -> Result<T, StoreError> {
        let reply = self
            .bridge
            .send(request)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        match decode(reply) {
            Ok(decoded) => decoded.map_err(|e| StoreError::Unavailable(e.to_string())),
            Err((Some(ReplyErrorKind::NotFound), message)) => Err(StoreError::NotFound(message)),
            Err((Some(ReplyErrorKind::Validation), message)) => {
                Err(StoreError::Validation(message))
            }
            Err((_, message)) => Err(StoreError::Unavailable(message)),
        }
    }

    fn command(&self, request: Request) -> Result<(), StoreError> {
        self.request::<Value>(request).map(|_| ())
    }
}

impl PromptStore for RemoteStore {
    fn get_all(&self) -> Result<Vec<PromptRecord>, StoreError> {
        self.request(Request::GetAll)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<PromptRecord>, StoreError> {
        self.request(Request::GetById { id: id.to_string() })
    }

    fn save(&self, record: PromptRecord) -> Result<(), StoreError> {
        self.command(Request::Save { record })
    }

    fn update(&self, id: &str, patch: PromptPatch) -> Result<(), StoreError> {
        self.command(Request::Update {
            id: id.to_string(),
            patch,
        })
    }

    fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.command(Request::SoftDelete { id: id.to_string() })
    }

    fn increment_use(&self, id: &str) -> Result<(), StoreError> {
        self.command(Request::IncrementUse { id: id.to_string() })
    }

    fn search(&self, filter: &PromptFilter) -> Result<Vec<PromptRecord>, StoreError> {
        self.request(Request::Search {
            filter: filter.clone(),
        })
    }
}

/// [`Optimizer`] served over a [`Bridge`]
#[derive(Debug, Clone)]
pub struct RemoteOptimizer {
    bridge: Arc<Bridge>,
}

impl RemoteOptimizer {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    fn request(&self, request: Request) -> Result<String, OptimizeError> {
        let reply = self
            .bridge
            .send(request)
            .map_err(|e| OptimizeError::Network(e.to_string()))?;
        if let Some(error) = reply.optimize_error.clone() {
            return Err(error);
        }
        match decode::<String>(reply) {
            Ok(decoded) => decoded.map_err(|e| OptimizeError::Validation(e.to_string())),
            Err((_, message)) => Err(OptimizeError::Validation(message)),
        }
    }
}

impl Optimizer for RemoteOptimizer {
    fn optimize(&self, text: &str, mode: OptimizeMode) -> Result<String, OptimizeError> {
        self.request(Request::Optimize {
            text: text.to_string(),
            mode,
        })
    }

    fn title_for(&self, text: &str) -> Result<String, OptimizeError> {
        self.request(Request::TitleFor {
            text: text.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
