//! Trait definitions for the inference module.

use async_trait::async_trait;
use std::time::Duration;

use super::error::InferenceError;
use super::types::{RemoteCall, RemoteOutput, Session};

/// A client for a hosted model exposing named remote procedures.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Opens a remote session. Later calls made with it share server state.
    async fn start_session(&self) -> Result<Session, InferenceError>;

    /// Submits `call` and waits at most `timeout` for its result.
    ///
    /// File outputs are saved locally before returning; the caller owns
    /// (and must delete) every path in the returned output.
    /// A timeout only stops the wait, the remote job keeps running.
    async fn predict(
        &self,
        session: &Session,
        call: RemoteCall,
        timeout: Duration,
    ) -> Result<RemoteOutput, InferenceError>;
}
