/*
[INPUT]:  Nonce requests, signed SIWE messages, bearer tokens
[OUTPUT]: Single-use nonces, verified sessions, user records
[POS]:    Auth layer - in-process reference implementation of the server handshake
[UPDATE]: When nonce or verification rules on the server change
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use siwe::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::backend::AuthBackend;
use crate::auth::wallet::{addresses_match, normalize_address};
use crate::http::{AuthError, Result};
use crate::types::{KycStatus, User, UserRole, VerifyRequest, VerifyResponse};

const DEFAULT_NONCE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct PendingNonce {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BackendState {
    nonces: HashMap<String, PendingNonce>,
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    next_user_id: i64,
}

/// Nonce issuer and SIWE verifier that keeps everything in memory
///
/// Follows the server's rules: nonces are keyed by the lowercased wallet,
/// a new request replaces the old nonce, and a nonce is consumed by the
/// first verification that passes both the signature and nonce checks.
#[derive(Debug)]
pub struct InMemoryAuthBackend {
    state: Mutex<BackendState>,
    nonce_ttl: Duration,
    calls: AtomicUsize,
}

impl Default for InMemoryAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                next_user_id: 1,
                ..BackendState::default()
            }),
            nonce_ttl: Duration::seconds(DEFAULT_NONCE_TTL_SECS),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    /// Number of backend operations served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Forget an issued token; later lookups are rejected
    pub fn revoke(&self, token: &str) -> bool {
        self.lock().tokens.remove(token).is_some()
    }

    /// Nonce currently outstanding for `wallet`
    pub fn pending_nonce(&self, wallet: &str) -> Option<String> {
        self.lock()
            .nonces
            .get(&normalize_address(wallet))
            .map(|pending| pending.value.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn invalid_signature() -> AuthError {
    AuthError::AuthRejected("Invalid signature".to_string())
}

/// Parse an EIP-4361 message and check its EIP-191 signature
///
/// Returns the message once the signature is known to come from the
/// address it names.
fn verify_siwe(text: &str, signature: &str) -> Result<Message> {
    let message = Message::from_str(text).map_err(|err| {
        debug!(error = %err, "unparsable sign-in message");
        invalid_signature()
    })?;

    let raw = hex::decode(signature.trim().trim_start_matches("0x"))
        .map_err(|_| invalid_signature())?;
    let signature: [u8; 65] = raw.try_into().map_err(|_| invalid_signature())?;
    message.verify_eip191(&signature).map_err(|err| {
        debug!(error = %err, "signature verification failed");
        invalid_signature()
    })?;

    if !message.valid_now() {
        return Err(AuthError::AuthRejected("Sign-in message expired".to_string()));
    }
    Ok(message)
}

#[async_trait]
impl AuthBackend for InMemoryAuthBackend {
    async fn request_nonce(&self, wallet: &str) -> Result<String> {
        self.record_call();
        let wallet = wallet.trim();
        if wallet.is_empty() || !wallet.starts_with("0x") {
            return Err(AuthError::InvalidInput("Invalid wallet address".to_string()));
        }

        let now = Utc::now();
        let nonce = siwe::generate_nonce();
        let pending = PendingNonce {
            value: nonce.clone(),
            expires_at: now + self.nonce_ttl,
        };

        let mut state = self.lock();
        state.nonces.retain(|_, entry| now < entry.expires_at);
        state.nonces.insert(normalize_address(wallet), pending);

        Ok(nonce)
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        self.record_call();
        let wallet = normalize_address(&request.wallet);

        let message = verify_siwe(&request.message, &request.signature)?;
        let signer = format!("0x{}", hex::encode(message.address));
        if !addresses_match(&signer, &wallet) {
            warn!(%wallet, %signer, "signature does not match the claimed wallet");
            return Err(invalid_signature());
        }

        let mut state = self.lock();
        let now = Utc::now();
        let nonce_ok = state
            .nonces
            .get(&wallet)
            .is_some_and(|pending| pending.value == message.nonce && now < pending.expires_at);
        if !nonce_ok {
            warn!(%wallet, "nonce missing, expired or mismatched");
            return Err(AuthError::AuthRejected("Invalid nonce".to_string()));
        }
        state.nonces.remove(&wallet);

        let user = match state.users.get(&wallet) {
            Some(user) => user.clone(),
            None => {
                let user = User {
                    id: state.next_user_id,
                    wallet: wallet.clone(),
                    role: UserRole::User,
                    kyc_status: KycStatus::None,
                    reputation: 0,
                    created_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    name: None,
                    email: None,
                };
                state.next_user_id += 1;
                state.users.insert(wallet.clone(), user.clone());
                user
            }
        };

        let access_token = Uuid::new_v4().to_string();
        state.tokens.insert(access_token.clone(), wallet);

        Ok(VerifyResponse {
            access_token,
            token_type: "bearer".to_string(),
            user,
        })
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        self.record_call();
        let state = self.lock();
        state
            .tokens
            .get(token)
            .and_then(|wallet| state.users.get(wallet))
            .cloned()
            .ok_or_else(|| {
                AuthError::AuthRejected("Could not validate credentials".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalWalletProvider;
    use crate::auth::siwe::{DEFAULT_STATEMENT, SiweMessage, SiweParams};
    use crate::auth::wallet::WalletProvider;

    const TEST_PK: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn message_for(address: &str, nonce: &str) -> String {
        SiweMessage::build(&SiweParams {
            domain: "localhost:3000".to_string(),
            origin: "http://localhost:3000".to_string(),
            address: address.to_string(),
            nonce: nonce.to_string(),
            chain_id: 1337,
            statement: Some(DEFAULT_STATEMENT.to_string()),
            issued_at: Utc::now(),
        })
        .unwrap()
        .to_string()
    }

    async fn signed_request(wallet: &LocalWalletProvider, nonce: &str) -> VerifyRequest {
        let message = message_for(wallet.address(), nonce);
        let signature = wallet.sign_message(wallet.address(), &message).await.unwrap();
        VerifyRequest {
            wallet: wallet.address().to_string(),
            message,
            signature,
        }
    }

    #[tokio::test]
    async fn test_nonce_requires_hex_wallet() {
        let backend = InMemoryAuthBackend::new();
        assert!(matches!(
            backend.request_nonce("abc").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            backend.request_nonce("").await,
            Err(AuthError::InvalidInput(_))
        ));

        let nonce = backend.request_nonce("0xABC").await.unwrap();
        assert!(nonce.len() >= 8);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(backend.pending_nonce("0xabc"), Some(nonce));
    }

    #[tokio::test]
    async fn test_expired_nonces_are_pruned() {
        let backend = InMemoryAuthBackend::new().with_nonce_ttl(Duration::zero());
        backend.request_nonce("0x01").await.unwrap();
        backend.request_nonce("0x02").await.unwrap();

        // Each request drops the expired entries of other wallets
        assert!(backend.pending_nonce("0x01").is_none());
        assert!(backend.pending_nonce("0x02").is_some());
        assert_eq!(backend.lock().nonces.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_rejects_unparsable_message() {
        let backend = InMemoryAuthBackend::new();
        let wallet = LocalWalletProvider::new(TEST_PK).unwrap();
        let nonce = backend.request_nonce(wallet.address()).await.unwrap();

        let message = format!("Sign in with Ethereum to ContriBlock\nNonce: {nonce}");
        let signature = wallet.sign_message(wallet.address(), &message).await.unwrap();
        let err = backend
            .verify(&VerifyRequest {
                wallet: wallet.address().to_string(),
                message,
                signature,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthRejected(msg) if msg == "Invalid signature"));
        assert!(backend.pending_nonce(wallet.address()).is_some());
    }

    #[tokio::test]
    async fn test_verify_issues_token_and_consumes_nonce() {
        let backend = InMemoryAuthBackend::new();
        let wallet = LocalWalletProvider::new(TEST_PK).unwrap();

        let nonce = backend.request_nonce(wallet.address()).await.unwrap();
        let request = signed_request(&wallet, &nonce).await;

        let response = backend.verify(&request).await.unwrap();
        assert_eq!(response.user.wallet, normalize_address(wallet.address()));
        assert_eq!(response.user.role, UserRole::User);
        assert!(backend.pending_nonce(wallet.address()).is_none());

        let user = backend.current_user(&response.access_token).await.unwrap();
        assert_eq!(user.id, response.user.id);

        let replay = backend.verify(&request).await.unwrap_err();
        assert!(matches!(replay, AuthError::AuthRejected(msg) if msg == "Invalid nonce"));
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_signer() {
        let backend = InMemoryAuthBackend::new();
        let wallet = LocalWalletProvider::new(TEST_PK).unwrap();
        let nonce = backend.request_nonce(wallet.address()).await.unwrap();

        let mut request = signed_request(&wallet, &nonce).await;
        request.wallet = "0x0000000000000000000000000000000000000001".to_string();

        let err = backend.verify(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthRejected(msg) if msg == "Invalid signature"));
        // Nonce survives a failed signature check
        assert!(backend.pending_nonce(wallet.address()).is_some());
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_nonce() {
        let backend = InMemoryAuthBackend::new().with_nonce_ttl(Duration::zero());
        let wallet = LocalWalletProvider::new(TEST_PK).unwrap();
        let nonce = backend.request_nonce(wallet.address()).await.unwrap();

        let request = signed_request(&wallet, &nonce).await;
        let err = backend.verify(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthRejected(msg) if msg == "Invalid nonce"));
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let backend = InMemoryAuthBackend::new();
        let wallet = LocalWalletProvider::new(TEST_PK).unwrap();
        let nonce = backend.request_nonce(wallet.address()).await.unwrap();
        let response = backend
            .verify(&signed_request(&wallet, &nonce).await)
            .await
            .unwrap();

        assert!(backend.revoke(&response.access_token));
        assert!(
            backend
                .current_user(&response.access_token)
                .await
                .unwrap_err()
                .is_auth_rejection()
        );
        assert_eq!(backend.calls(), 4);
    }
}
