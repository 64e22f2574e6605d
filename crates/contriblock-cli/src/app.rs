/*
[INPUT]:  Validated CLI configuration and an optional signing key
[OUTPUT]: Wired auth controller with file-backed session and HTTP backend
[POS]:    Application layer - command implementations
[UPDATE]: When commands or controller wiring change
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use contriblock_auth::{
    ApiClient, AuthController, FileSessionStore, LocalWalletProvider, Session, SessionStore,
    UnavailableWallet, User, WalletProvider,
};

use crate::config::CliConfig;

/// Controller plus the pieces the commands inspect directly
#[derive(Debug)]
pub struct App {
    controller: Arc<AuthController>,
    store: Arc<FileSessionStore>,
}

impl App {
    pub fn new(config: &CliConfig, private_key: Option<&str>) -> Result<Self> {
        let session_dir = config.session_dir()?;
        let store = Arc::new(FileSessionStore::new(&session_dir));

        let wallet: Arc<dyn WalletProvider> = match private_key {
            Some(key) => Arc::new(
                LocalWalletProvider::new(key)
                    .context("load signing key")?
                    .with_chain_id(config.chain_id),
            ),
            None => Arc::new(UnavailableWallet),
        };

        let client = Arc::new(
            ApiClient::with_config(config.client_config(), &config.api_url, store.clone())
                .context("build API client")?,
        );

        info!(
            api_url = %config.api_url,
            session_dir = %session_dir.display(),
            mode = ?config.mode,
            "client initialized"
        );

        let controller = Arc::new(AuthController::new(
            wallet,
            client.clone(),
            store.clone(),
            config.auth_config(),
        ));
        client.set_unauthorized_hook(controller.unauthorized_hook());

        Ok(Self { controller, store })
    }

    pub fn controller(&self) -> &Arc<AuthController> {
        &self.controller
    }

    pub async fn login(&self) -> Result<Session> {
        self.controller.login().await.context("login failed")
    }

    /// Drop whatever attempt is in flight, e.g. on Ctrl-C
    pub fn abandon_login(&self) {
        self.controller.abandon_login();
    }

    pub fn logout(&self) {
        self.controller.logout();
    }

    /// Validate the stored session against the API
    pub async fn restore(&self) -> Result<Option<User>> {
        self.controller
            .restore_session()
            .await
            .context("restore session")
    }

    /// Stored session, without touching the network
    pub fn stored_session(&self) -> Option<Session> {
        self.store.load()
    }
}
