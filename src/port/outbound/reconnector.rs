//! Reconnect callback port, implemented by streaming adapters.

use async_trait::async_trait;

use crate::domain::Subscriptions;
use crate::error::Result;

/// Everything a stream adapter needs to rebuild one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectRequest {
    pub connection_id: String,
    pub category: String,
    pub subscription_key: String,
    pub subscriptions: Subscriptions,
    /// 1-based attempt number within the current recovery.
    pub attempt: u32,
}

/// Performs a fresh handshake and resubscribes to every stream in the request.
///
/// Return `Ok(true)` only if the handshake and every resubscription
/// succeeded. `Ok(false)` and `Err(_)` both count as a failed attempt; the
/// error text is recorded as the connection's `last_error`.
#[async_trait]
pub trait Reconnector: Send + Sync {
    async fn reconnect(&self, request: &ReconnectRequest) -> Result<bool>;
}
