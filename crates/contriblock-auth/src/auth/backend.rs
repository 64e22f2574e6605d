/*
[INPUT]:  Wallet addresses, signed SIWE messages, bearer tokens
[OUTPUT]: Nonces, issued sessions, and the current user profile
[POS]:    Auth layer - seam between the controller and the server
[UPDATE]: When the controller needs another server capability
*/

use async_trait::async_trait;

use crate::http::Result;
use crate::types::{User, VerifyRequest, VerifyResponse};

/// Server side of the sign-in handshake
///
/// Implemented by [`crate::http::ApiClient`] for the REST API and by
/// [`crate::auth::InMemoryAuthBackend`] for tests and offline use.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Issue a fresh single-use nonce for `wallet`
    async fn request_nonce(&self, wallet: &str) -> Result<String>;

    /// Check the signed message and exchange it for a session token
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse>;

    /// Resolve `token` to the user it was issued for
    async fn current_user(&self, token: &str) -> Result<User>;
}
