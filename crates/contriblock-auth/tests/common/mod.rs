/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for contriblock-auth tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use contriblock_auth::{
    AuthBackend, AuthConfig, AuthController, AuthMode, LocalWalletProvider, MemorySessionStore,
    SessionStore, WalletProvider,
};
use wiremock::MockServer;

/// Well-known development key (anvil/hardhat account #0)
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Address used by the SIWE message scenario
pub const SCENARIO_ADDRESS: &str = "0xABC0000000000000000000000000000000000123";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_wallet() -> LocalWalletProvider {
    LocalWalletProvider::new(TEST_PRIVATE_KEY).expect("test key is valid")
}

pub fn temp_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("contriblock-test-{}", uuid::Uuid::new_v4()));
    path
}

pub fn config(mode: AuthMode) -> AuthConfig {
    AuthConfig {
        mode,
        ..AuthConfig::default()
    }
}

/// Controller wired to the given parts, shared behind `Arc`
pub fn setup_controller(
    wallet: impl WalletProvider + 'static,
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    mode: AuthMode,
) -> Arc<AuthController> {
    Arc::new(AuthController::new(
        Arc::new(wallet),
        backend,
        store,
        config(mode),
    ))
}

pub fn memory_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new())
}

/// User payload as the backend serializes it
pub fn user_json(id: i64, wallet: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "wallet": wallet.to_ascii_lowercase(),
        "role": "user",
        "kyc_status": "none",
        "reputation": 0,
        "created_at": "2024-01-01T00:00:00",
    })
}
