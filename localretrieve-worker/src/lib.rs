//! # localretrieve-worker
//!
//! The RPC boundary: a single worker task owns every engine and serves
//! typed requests in submission order. Hosts hold a [`WorkerHandle`] and
//! never touch the engines directly, which is what makes the
//! single-writer discipline structural rather than conventional.

pub mod logging;
pub mod rpc;
pub mod runtime;
pub mod validate;
pub mod worker;

pub use rpc::{ErrorEnvelope, ParamValue, Request, ResponseEnvelope, SearchWithLlmRequest};
pub use worker::{spawn_worker, WorkerHandle};
