//! The worker loop and its handle.
//!
//! One tokio task owns the [`Runtime`]; requests arrive over an mpsc
//! channel and execute strictly in submission order, each under the
//! operation deadline. Background timers (durability auto-sync, provider
//! cleanup) run as separate tasks and stop on shutdown.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::errors::RetrieveError;

use crate::rpc::{parse_request, Request, ResponseEnvelope};
use crate::runtime::Runtime;
use crate::validate;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Opening,
    Ready,
    Busy,
    Closing,
    Closed,
}

struct Job {
    request: Request,
    request_id: String,
    reply: Option<oneshot::Sender<ResponseEnvelope>>,
}

/// Host-side handle. Cloneable; all clones feed the same FIFO queue.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Submit a typed request and await its envelope.
    pub async fn request(&self, request: Request) -> ResponseEnvelope {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            request,
            request_id: request_id.clone(),
            reply: Some(reply_tx),
        };
        if self.tx.send(job).await.is_err() {
            return ResponseEnvelope::err(request_id, &worker_closed());
        }
        match reply_rx.await {
            Ok(envelope) => envelope,
            Err(_) => ResponseEnvelope::err(request_id, &worker_closed()),
        }
    }

    /// Submit a JSON-encoded request (the host-boundary form). Unknown
    /// `op` tags come back as `MethodNotFound` envelopes.
    pub async fn request_json(&self, payload: &str) -> ResponseEnvelope {
        match parse_request(payload) {
            Ok(request) => self.request(request).await,
            Err(e) => ResponseEnvelope::err(uuid::Uuid::new_v4().to_string(), &e),
        }
    }

    /// Fire-and-forget submission, used by timers.
    fn send_background(&self, request: Request) {
        let job = Job {
            request,
            request_id: uuid::Uuid::new_v4().to_string(),
            reply: None,
        };
        let _ = self.tx.try_send(job);
    }
}

fn worker_closed() -> RetrieveError {
    localretrieve_core::errors::ValidationError::InvalidArgument {
        reason: "worker is closed".to_string(),
    }
    .into()
}

/// Spawn the worker task and return its handle.
pub fn spawn_worker(config: RetrieveConfig) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(64);
    let handle = WorkerHandle { tx };
    tokio::spawn(worker_loop(config, rx, handle.clone()));
    handle
}

async fn worker_loop(config: RetrieveConfig, mut rx: mpsc::Receiver<Job>, handle: WorkerHandle) {
    let mut runtime = Runtime::new(config.clone());
    let mut state = WorkerState::Uninitialized;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut timers_started = false;
    let op_timeout = Duration::from_millis(config.rpc.operation_timeout_ms);

    while let Some(job) = rx.recv().await {
        let op_name = job.request.op_name();

        // Ops other than open/ping/getVersion need an open database.
        if !runtime.is_open() && !job.request.allowed_before_open() {
            let error = localretrieve_core::errors::ValidationError::InvalidArgument {
                reason: format!("'{op_name}' requires an open database"),
            }
            .into();
            reply(job.reply, ResponseEnvelope::err(job.request_id, &error));
            continue;
        }

        if let Err(e) = validate::validate(&job.request) {
            reply(job.reply, ResponseEnvelope::err(job.request_id, &e));
            continue;
        }

        let is_open_op = matches!(job.request, Request::Open { .. });
        let is_close_op = matches!(job.request, Request::Close);
        state = if is_open_op {
            WorkerState::Opening
        } else if is_close_op {
            WorkerState::Closing
        } else {
            WorkerState::Busy
        };
        debug!(op = op_name, state = ?state, "dispatching");

        // The deadline cancels awaited HTTP work; synchronous SQL finishes
        // its current statement before the worker observes expiry.
        let envelope = match tokio::time::timeout(op_timeout, runtime.dispatch(job.request)).await
        {
            Ok(Ok(value)) => ResponseEnvelope::ok(job.request_id, value),
            Ok(Err(e)) => ResponseEnvelope::err(job.request_id, &e),
            Err(_) => ResponseEnvelope::err(
                job.request_id,
                &RetrieveError::Timeout {
                    operation: op_name.to_string(),
                    ms: config.rpc.operation_timeout_ms,
                },
            ),
        };
        let succeeded = envelope.success;
        reply(job.reply, envelope);

        if is_open_op && succeeded && !timers_started {
            start_timers(&config, &runtime, handle.clone(), shutdown_rx.clone());
            timers_started = true;
        }

        if is_close_op && succeeded {
            state = WorkerState::Closed;
            break;
        }
        state = if runtime.is_open() {
            WorkerState::Ready
        } else {
            WorkerState::Uninitialized
        };
    }

    let _ = shutdown_tx.send(true);
    runtime.shutdown();
    debug!(state = ?state, "worker loop stopped");
}

fn reply(channel: Option<oneshot::Sender<ResponseEnvelope>>, envelope: ResponseEnvelope) {
    if let Some(tx) = channel {
        if tx.send(envelope).is_err() {
            warn!("reply receiver dropped before delivery");
        }
    }
}

/// Durability auto-sync enqueues snapshots through the normal FIFO so the
/// single-writer discipline holds; provider cleanup only touches the
/// thread-safe registry and runs in place.
fn start_timers(
    config: &RetrieveConfig,
    runtime: &Runtime,
    handle: WorkerHandle,
    shutdown: watch::Receiver<bool>,
) {
    let sync_interval = Duration::from_millis(config.durability.sync_interval_ms.max(100));
    let mut sync_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sync_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // the immediate first tick
        loop {
            tokio::select! {
                _ = ticker.tick() => handle.send_background(Request::ForceSync),
                _ = sync_shutdown.changed() => break,
            }
        }
    });

    if let Some(registry) = runtime.provider_registry() {
        let cleanup_interval =
            Duration::from_millis(config.embedding.provider_cleanup_interval_ms.max(100));
        let mut cleanup_shutdown = shutdown;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => { registry.cleanup_idle(); }
                    _ = cleanup_shutdown.changed() => break,
                }
            }
        });
    }
}
