/*
[INPUT]:  EVM private key (hex string)
[OUTPUT]: Signed messages and wallet address for EVM chains
[POS]:    Auth layer - local key wallet provider
[UPDATE]: When signing logic or EVM address formatting changes
*/

use std::fmt;
use std::str::FromStr;

use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::warn;

use crate::auth::wallet::{WalletProvider, addresses_match};
use crate::http::{AuthError, Result};

/// Wallet provider that signs with a locally held EVM key
///
/// Used by the CLI in place of a browser extension. It never prompts, and it
/// refuses to sign for any address other than its own.
pub struct LocalWalletProvider {
    signer: PrivateKeySigner,
    address: String,
    chain_id: Option<u64>,
}

impl LocalWalletProvider {
    /// Create a wallet from a hex-encoded private key
    ///
    /// Supports both "0x"-prefixed and non-prefixed hex strings.
    pub fn new(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex.trim();
        let private_key_hex = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);
        let signer = PrivateKeySigner::from_str(private_key_hex)
            .map_err(|e| AuthError::Config(format!("Invalid EVM private key: {}", e)))?;

        let address = signer.address().to_checksum(None);

        Ok(Self {
            signer,
            address,
            chain_id: None,
        })
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// EIP-55 checksummed address
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Debug for LocalWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWalletProvider")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    fn is_available(&self) -> bool {
        true
    }

    fn is_metamask(&self) -> bool {
        true
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(vec![self.address.clone()])
    }

    async fn sign_message(&self, address: &str, message: &str) -> Result<String> {
        if !addresses_match(address, &self.address) {
            warn!(requested = %address, "refusing to sign for an unknown account");
            return Err(AuthError::UserRejected);
        }

        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| AuthError::Wallet(format!("Failed to sign EVM message: {}", e)))?;

        // alloy's Signature as_bytes() returns [r, s, v]
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}
