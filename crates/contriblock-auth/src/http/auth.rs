/*
[INPUT]:  Wallet address, signed SIWE message
[OUTPUT]: Nonce and issued access token with the user record
[POS]:    HTTP layer - authentication endpoints (no JWT required)
[UPDATE]: When auth endpoints or their payloads change
*/

// ### Auth Endpoints

use async_trait::async_trait;
use reqwest::Method;

use crate::auth::AuthBackend;
use crate::http::{ApiClient, AuthError, Result};
use crate::types::{NonceRequest, NonceResponse, User, VerifyRequest, VerifyResponse};

impl ApiClient {
    /// Request a sign-in nonce for a wallet
    ///
    /// POST /api/v1/auth/nonce
    pub async fn request_nonce(&self, wallet: &str) -> Result<String> {
        let wallet = wallet.trim();
        if wallet.is_empty() || !wallet.starts_with("0x") {
            return Err(AuthError::InvalidInput("Invalid wallet address".to_string()));
        }

        let body = NonceRequest {
            wallet: wallet.to_string(),
        };
        let builder = self.request(Method::POST, "api/v1/auth/nonce")?.json(&body);
        let response: NonceResponse = self.send_json(builder).await?;
        Ok(response.nonce)
    }

    /// Exchange a signed SIWE message for an access token
    ///
    /// POST /api/v1/auth/verify
    pub async fn verify_signature(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        let builder = self
            .request(Method::POST, "api/v1/auth/verify")?
            .json(request);
        self.send_json(builder).await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn request_nonce(&self, wallet: &str) -> Result<String> {
        ApiClient::request_nonce(self, wallet).await
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        self.verify_signature(request).await
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        self.get_user_with_token(token).await
    }
}
