/*
[INPUT]:  Account requests and messages to sign
[OUTPUT]: Wallet accounts, signatures, and provider availability
[POS]:    Auth layer - injected wallet provider abstraction
[UPDATE]: When adding new wallet types or changing signature format
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::auth::LocalWalletProvider;
use crate::http::{AuthError, Result};

/// Trait for the wallet capability the controller is given
///
/// Mirrors an injected browser wallet (`window.ethereum`): availability
/// detection, account access and personal-message signing. Both async
/// calls may wait on a user prompt for as long as the user takes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet is injected at all
    fn is_available(&self) -> bool;

    /// Whether the injected wallet identifies itself as MetaMask
    fn is_metamask(&self) -> bool;

    /// Chain the wallet is connected to, if it reports one
    fn chain_id(&self) -> Option<u64>;

    /// Ask the wallet for account access (`eth_requestAccounts`)
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Sign `message` as an EIP-191 personal message with `address`
    ///
    /// Returns a 0x-prefixed hex signature (65 bytes, r || s || v).
    async fn sign_message(&self, address: &str, message: &str) -> Result<String>;
}

/// Events an injected wallet emits through its `on` subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnected,
}

/// Lowercase a wallet address and ensure the `0x` prefix
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    format!("0x{}", hex.to_ascii_lowercase())
}

/// Case-insensitive address comparison
pub fn addresses_match(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}

/// Stand-in for an environment where no wallet extension is installed
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableWallet;

#[async_trait]
impl WalletProvider for UnavailableWallet {
    fn is_available(&self) -> bool {
        false
    }

    fn is_metamask(&self) -> bool {
        false
    }

    fn chain_id(&self) -> Option<u64> {
        None
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        Err(AuthError::ProviderUnavailable)
    }

    async fn sign_message(&self, _address: &str, _message: &str) -> Result<String> {
        Err(AuthError::ProviderUnavailable)
    }
}

#[derive(Debug, Clone)]
enum MockSignature {
    Fixed(String),
    Reject,
    Delegate(Arc<LocalWalletProvider>),
}

/// Scriptable wallet for testing
#[derive(Debug, Clone)]
pub struct MockWalletProvider {
    available: bool,
    metamask: bool,
    chain_id: Option<u64>,
    accounts: Vec<String>,
    signature: MockSignature,
    gate: Option<Arc<Notify>>,
    account_requests: Arc<AtomicUsize>,
    sign_requests: Arc<AtomicUsize>,
}

impl MockWalletProvider {
    /// Create a MetaMask-like mock that always returns `signature`
    pub fn new(address: &str, signature: &str) -> Self {
        Self {
            available: true,
            metamask: true,
            chain_id: None,
            accounts: vec![address.to_string()],
            signature: MockSignature::Fixed(signature.to_string()),
            gate: None,
            account_requests: Arc::new(AtomicUsize::new(0)),
            sign_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock backed by a real key, so signatures verify
    pub fn with_wallet(wallet: LocalWalletProvider) -> Self {
        let mut mock = Self::new(wallet.address(), "");
        mock.signature = MockSignature::Delegate(Arc::new(wallet));
        mock
    }

    /// No wallet injected
    pub fn not_injected() -> Self {
        let mut mock = Self::new("", "");
        mock.available = false;
        mock.metamask = false;
        mock.accounts.clear();
        mock
    }

    /// Present, but not MetaMask
    pub fn non_metamask(mut self) -> Self {
        self.metamask = false;
        self
    }

    /// The holder declines every signature prompt
    pub fn rejecting_signatures(mut self) -> Self {
        self.signature = MockSignature::Reject;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Hold every signature prompt open until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn account_requests(&self) -> usize {
        self.account_requests.load(Ordering::SeqCst)
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn is_metamask(&self) -> bool {
        self.metamask
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        self.account_requests.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(AuthError::ProviderUnavailable);
        }
        Ok(self.accounts.clone())
    }

    async fn sign_message(&self, address: &str, message: &str) -> Result<String> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(AuthError::ProviderUnavailable);
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.signature {
            MockSignature::Fixed(signature) => Ok(signature.clone()),
            MockSignature::Reject => Err(AuthError::UserRejected),
            MockSignature::Delegate(wallet) => wallet.sign_message(address, message).await,
        }
    }
}
