/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public ContriBlock auth crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthBackend,
    AuthConfig,
    AuthController,
    AuthSnapshot,
    AuthState,
    FileSessionStore,
    InMemoryAuthBackend,
    LocalWalletProvider,
    MemorySessionStore,
    MockWalletProvider,
    Session,
    SessionStore,
    SiweMessage,
    SiweParams,
    UnavailableWallet,
    WalletEvent,
    WalletProvider,
};

// Re-export commonly used types from http
pub use http::{
    ApiClient,
    AuthError,
    AuthErrorInfo,
    ClientConfig,
    ErrorKind,
    Result,
    UnauthorizedHook,
};

// Re-export all types
pub use types::*;
