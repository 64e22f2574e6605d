/*
[INPUT]:  Wallet provider, auth backend, session store, controller config
[OUTPUT]: Observable auth state (session, user, error slot) and the login/logout flow
[POS]:    Auth layer - orchestrates the complete sign-in flow
[UPDATE]: When auth states, flow steps, or session rules change
*/

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::backend::AuthBackend;
use crate::auth::session::{Session, SessionStore};
use crate::auth::siwe::{DEFAULT_STATEMENT, SiweMessage, SiweParams};
use crate::auth::wallet::{WalletEvent, WalletProvider, addresses_match, normalize_address};
use crate::http::{AuthError, AuthErrorInfo, Result, UnauthorizedHook};
use crate::types::{AuthMode, KycStatus, User, UserRole, VerifyRequest};

pub const DEMO_WALLET_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const DEMO_TOKEN_PREFIX: &str = "demo_token_";
const DEMO_USER_ID: i64 = 999;

/// Source of `issued_at` timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Host the sign-in request originates from (`domain` in the SIWE message)
    pub domain: String,
    /// Full origin URL (`URI` in the SIWE message)
    pub origin: String,
    /// Used when the wallet does not report a chain
    pub chain_id: u64,
    pub statement: Option<String>,
    pub mode: AuthMode,
    /// Fail with `WrongProvider` when the wallet is not MetaMask
    pub require_metamask: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: "localhost:3000".to_string(),
            origin: "http://localhost:3000".to_string(),
            chain_id: 1337,
            statement: Some(DEFAULT_STATEMENT.to_string()),
            mode: AuthMode::Siwe,
            require_metamask: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Checking a stored session against the backend
    Restoring,
    Authenticating,
    Authenticated,
    /// Transient; immediately followed by `Unauthenticated`
    Failed,
}

/// What observers of the controller see
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub session: Option<Session>,
    pub user: Option<User>,
    /// The single user-facing error slot
    pub error: Option<AuthErrorInfo>,
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, AuthState::Authenticating | AuthState::Restoring)
    }
}

/// Holds the in-flight slot for one login or restore attempt.
///
/// Dropping it (completion or cancellation) frees the slot and resets a
/// still-loading state, unless a logout already took over.
struct FlightGuard<'a> {
    controller: &'a AuthController,
    generation: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.controller.in_flight();
        if *in_flight == Some(self.generation) {
            *in_flight = None;
        }
        drop(in_flight);

        if self.controller.is_current(self.generation) {
            self.controller.snapshot.send_if_modified(|snapshot| {
                if snapshot.is_loading() {
                    debug!("attempt dropped before completion");
                    snapshot.state = AuthState::Unauthenticated;
                    snapshot.session = None;
                    snapshot.user = None;
                    true
                } else {
                    false
                }
            });
        }
    }
}

/// Owns the authentication state machine
///
/// Shared via `Arc`; every method takes `&self`. At most one login or
/// restore runs at a time and results of attempts overtaken by `logout()`
/// are discarded.
pub struct AuthController {
    wallet: Arc<dyn WalletProvider>,
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    config: AuthConfig,
    clock: Clock,
    snapshot: watch::Sender<AuthSnapshot>,
    in_flight: Mutex<Option<u64>>,
    generation: AtomicU64,
}

impl fmt::Debug for AuthController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthController")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AuthController {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn SessionStore>,
        config: AuthConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(AuthSnapshot::default());
        Self {
            wallet,
            backend,
            store,
            config,
            clock: Arc::new(Utc::now),
            snapshot,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the clock used for `issued_at`
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> AuthState {
        self.snapshot.borrow().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.snapshot.borrow().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot.borrow().session.clone()
    }

    pub fn last_error(&self) -> Option<AuthErrorInfo> {
        self.snapshot.borrow().error.clone()
    }

    /// Observe every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn clear_error(&self) {
        self.snapshot.send_if_modified(|snapshot| snapshot.error.take().is_some());
    }

    /// Run the sign-in flow and establish a session
    ///
    /// Fails with `LoginInProgress` (state untouched) when another attempt is
    /// running, and with `Superseded` when `logout()` or `abandon_login()`
    /// overtook this attempt.
    pub async fn login(&self) -> Result<Session> {
        let guard = self.begin()?;
        info!(mode = ?self.config.mode, "login started");

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear previous session");
        }
        self.snapshot.send_modify(|snapshot| {
            *snapshot = AuthSnapshot {
                state: AuthState::Authenticating,
                ..AuthSnapshot::default()
            };
        });

        let outcome = match self.config.mode {
            AuthMode::Siwe => self.siwe_login(guard.generation).await,
            AuthMode::Demo => Ok(self.demo_login().await),
        };
        self.finish_login(&guard, outcome)
    }

    /// Clear session and state unconditionally, from any state
    pub fn logout(&self) {
        self.end_session(None);
        info!("logged out");
    }

    /// Give up on the in-flight attempt; its eventual result is discarded
    pub fn abandon_login(&self) {
        let mut in_flight = self.in_flight();
        if in_flight.take().is_none() {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        drop(in_flight);

        self.snapshot.send_if_modified(|snapshot| {
            if !snapshot.is_loading() {
                return false;
            }
            snapshot.state = AuthState::Unauthenticated;
            snapshot.session = None;
            snapshot.user = None;
            true
        });
        info!("login attempt abandoned");
    }

    /// Validate the stored session on start-up
    ///
    /// Returns `Ok(None)` without a network call when nothing is stored, and
    /// `Ok(None)` with the store cleared when the backend rejects the token.
    /// Any other failure leaves the token in place and is returned.
    pub async fn restore_session(&self) -> Result<Option<User>> {
        let Some(stored) = self.store.load() else {
            debug!("no stored session to restore");
            return Ok(None);
        };

        let guard = self.begin()?;
        self.snapshot.send_modify(|snapshot| {
            *snapshot = AuthSnapshot {
                state: AuthState::Restoring,
                session: Some(stored.clone()),
                ..AuthSnapshot::default()
            };
        });

        let outcome = self.fetch_user(&stored).await;
        if !self.is_current(guard.generation) {
            debug!("discarding stale restore result");
            return Err(AuthError::Superseded);
        }

        match outcome {
            Ok(user) => {
                info!(wallet = %stored.wallet_address, "session restored");
                self.snapshot.send_modify(|snapshot| {
                    snapshot.state = AuthState::Authenticated;
                    snapshot.user = Some(user.clone());
                });
                Ok(Some(user))
            }
            Err(err) if err.is_auth_rejection() => {
                warn!(wallet = %stored.wallet_address, error = %err, "stored session rejected");
                if let Err(err) = self.store.clear() {
                    warn!(error = %err, "failed to clear rejected session");
                }
                self.snapshot.send_replace(AuthSnapshot::default());
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "could not restore session");
                self.snapshot.send_replace(AuthSnapshot {
                    error: Some(AuthErrorInfo::from(&err)),
                    ..AuthSnapshot::default()
                });
                Err(err)
            }
        }
    }

    /// Re-fetch the current user for the active session
    pub async fn refresh_user(&self) -> Result<User> {
        let session = self
            .session()
            .ok_or_else(|| AuthError::AuthRejected("No active session".to_string()))?;
        let generation = self.generation.load(Ordering::SeqCst);

        let outcome = self.fetch_user(&session).await;
        if !self.is_current(generation) {
            debug!("discarding stale refresh result");
            return outcome;
        }

        match outcome {
            Ok(user) => {
                self.update_session(&session, |snapshot| snapshot.user = Some(user.clone()));
                Ok(user)
            }
            Err(err) if err.is_auth_rejection() => {
                self.handle_api_error(&err);
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "could not refresh user");
                let info = AuthErrorInfo::from(&err);
                self.update_session(&session, |snapshot| snapshot.error = Some(info.clone()));
                Err(err)
            }
        }
    }

    /// End the active session when an API call reports the token was refused
    ///
    /// The rejection is left in the error slot. Ignored while a login or
    /// restore is in flight, since those handle their own failures.
    pub fn handle_api_error(&self, err: &AuthError) {
        if !err.is_auth_rejection() {
            return;
        }
        let active = {
            let snapshot = self.snapshot.borrow();
            snapshot.session.is_some() && !snapshot.is_loading()
        };
        if !active {
            return;
        }

        warn!(error = %err, "session rejected by the API");
        self.end_session(Some(AuthErrorInfo::from(err)));
    }

    /// Callback for `ApiClient::set_unauthorized_hook`
    ///
    /// Holds the controller weakly, so a 401 from any endpoint signs it out
    /// without keeping it alive.
    pub fn unauthorized_hook(self: &Arc<Self>) -> UnauthorizedHook {
        let controller = Arc::downgrade(self);
        Arc::new(move |err: &AuthError| {
            if let Some(controller) = controller.upgrade() {
                controller.handle_api_error(err);
            }
        })
    }

    pub fn handle_wallet_event(&self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let Some(session) = self.session() else {
                    return;
                };
                let still_connected = accounts
                    .iter()
                    .any(|account| addresses_match(account, &session.wallet_address));
                if !still_connected {
                    info!(wallet = %session.wallet_address, "wallet switched accounts");
                    self.logout();
                }
            }
            WalletEvent::Disconnected => {
                info!("wallet disconnected");
                self.logout();
            }
            WalletEvent::ChainChanged(chain_id) => {
                debug!(chain_id, "wallet changed chain");
            }
        }
    }

    async fn siwe_login(&self, generation: u64) -> Result<(Session, User)> {
        if !self.wallet.is_available() {
            return Err(AuthError::ProviderUnavailable);
        }
        if self.config.require_metamask && !self.wallet.is_metamask() {
            return Err(AuthError::WrongProvider);
        }

        let accounts = self.wallet.request_accounts().await?;
        self.ensure_current(generation)?;
        let address = accounts
            .into_iter()
            .map(|account| account.trim().to_string())
            .find(|account| !account.is_empty())
            .ok_or(AuthError::ProviderUnavailable)?;
        debug!(wallet = %address, "wallet account selected");

        let nonce = self.backend.request_nonce(&address).await?;
        self.ensure_current(generation)?;

        let message = SiweMessage::build(&SiweParams {
            domain: self.config.domain.clone(),
            origin: self.config.origin.clone(),
            address: address.clone(),
            nonce,
            chain_id: self.wallet.chain_id().unwrap_or(self.config.chain_id),
            statement: self.config.statement.clone(),
            issued_at: (self.clock)(),
        })?
        .to_string();

        let signature = self.wallet.sign_message(&address, &message).await?;
        self.ensure_current(generation)?;

        let response = self
            .backend
            .verify(&VerifyRequest {
                wallet: address.clone(),
                message,
                signature,
            })
            .await?;
        self.ensure_current(generation)?;

        if !addresses_match(&response.user.wallet, &address) {
            return Err(AuthError::AuthRejected(format!(
                "Verified wallet {} does not match {}",
                response.user.wallet, address
            )));
        }

        let session = Session::new(&address, response.access_token, (self.clock)());
        Ok((session, response.user))
    }

    async fn demo_login(&self) -> (Session, User) {
        let account = if self.wallet.is_available() {
            match self.wallet.request_accounts().await {
                Ok(accounts) => accounts.into_iter().next(),
                Err(err) => {
                    debug!(error = %err, "demo login without wallet account");
                    None
                }
            }
        } else {
            None
        };
        let address = normalize_address(account.as_deref().unwrap_or(DEMO_WALLET_ADDRESS));

        let now = (self.clock)();
        let session = Session::new(&address, format!("{DEMO_TOKEN_PREFIX}{address}"), now);
        (session, demo_user(&address, now))
    }

    async fn fetch_user(&self, session: &Session) -> Result<User> {
        let demo_token = format!("{DEMO_TOKEN_PREFIX}{}", session.wallet_address);
        let user = if self.config.mode == AuthMode::Demo && session.session_token == demo_token {
            demo_user(&session.wallet_address, session.issued_at)
        } else {
            self.backend.current_user(&session.session_token).await?
        };

        if !addresses_match(&user.wallet, &session.wallet_address) {
            return Err(AuthError::AuthRejected(
                "Session belongs to a different wallet".to_string(),
            ));
        }
        Ok(user)
    }

    fn finish_login(
        &self,
        guard: &FlightGuard<'_>,
        outcome: Result<(Session, User)>,
    ) -> Result<Session> {
        if !self.is_current(guard.generation) {
            debug!("discarding stale login result");
            return Err(AuthError::Superseded);
        }

        let (session, user) = match outcome {
            Ok(established) => established,
            Err(err) => return self.fail(err),
        };
        if let Err(err) = self.store.save(&session) {
            return self.fail(err);
        }

        info!(wallet = %session.wallet_address, user_id = user.id, "login succeeded");
        self.snapshot.send_replace(AuthSnapshot {
            state: AuthState::Authenticated,
            session: Some(session.clone()),
            user: Some(user),
            error: None,
        });
        Ok(session)
    }

    fn end_session(&self, error: Option<AuthErrorInfo>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.in_flight() = None;

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
        self.snapshot.send_replace(AuthSnapshot {
            error,
            ..AuthSnapshot::default()
        });
    }

    /// Apply `update` only while `session` is still the active one
    fn update_session(&self, session: &Session, update: impl FnOnce(&mut AuthSnapshot)) {
        self.snapshot.send_if_modified(|snapshot| {
            let same_session = snapshot.session.as_ref() == Some(session);
            if same_session {
                update(snapshot);
            }
            same_session
        });
    }

    fn fail<T>(&self, err: AuthError) -> Result<T> {
        warn!(kind = err.kind().as_str(), error = %err, "login failed");
        let info = err.is_user_facing().then(|| AuthErrorInfo::from(&err));

        self.snapshot.send_replace(AuthSnapshot {
            state: AuthState::Failed,
            error: info,
            ..AuthSnapshot::default()
        });
        self.snapshot.send_modify(|snapshot| snapshot.state = AuthState::Unauthenticated);
        Err(err)
    }

    fn begin(&self) -> Result<FlightGuard<'_>> {
        let mut in_flight = self.in_flight();
        if in_flight.is_some() {
            return Err(AuthError::LoginInProgress);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *in_flight = Some(generation);

        Ok(FlightGuard {
            controller: self,
            generation,
        })
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(AuthError::Superseded)
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<u64>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn demo_user(address: &str, created_at: DateTime<Utc>) -> User {
    User {
        id: DEMO_USER_ID,
        wallet: normalize_address(address),
        role: UserRole::Admin,
        kyc_status: KycStatus::Approved,
        reputation: 100,
        created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        name: Some("Demo User".to_string()),
        email: Some("demo@example.com".to_string()),
    }
}
