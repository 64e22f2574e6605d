/*
[INPUT]:  Wallet provider, backend, and session storage configuration
[OUTPUT]: Sign-in flow, sessions, SIWE messages, and auth errors
[POS]:    Auth layer - handles ContriBlock wallet authentication
[UPDATE]: When auth flow or wallet integrations change
*/

pub mod backend;
pub mod evm_wallet;
pub mod file_store;
pub mod inmem_backend;
pub mod manager;
pub mod session;
pub mod siwe;
pub mod wallet;

pub use backend::AuthBackend;
pub use evm_wallet::LocalWalletProvider;
pub use file_store::{FileSessionStore, SESSION_FILE_NAME};
pub use inmem_backend::InMemoryAuthBackend;
pub use manager::{
    AuthConfig, AuthController, AuthSnapshot, AuthState, Clock, DEMO_TOKEN_PREFIX,
    DEMO_WALLET_ADDRESS,
};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use siwe::{DEFAULT_STATEMENT, SiweMessage, SiweParams};
pub use wallet::{
    MockWalletProvider, UnavailableWallet, WalletEvent, WalletProvider, addresses_match,
    normalize_address,
};
