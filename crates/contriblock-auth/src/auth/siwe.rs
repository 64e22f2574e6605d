/*
[INPUT]:  Domain, origin, wallet address, nonce, chain id, issue time
[OUTPUT]: EIP-4361 (Sign-In With Ethereum) challenge text
[POS]:    Auth layer - SIWE message construction
[UPDATE]: When the message layout or optional EIP-4361 fields change
*/

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::http::{AuthError, Result};

pub const SIWE_VERSION: &str = "1";
pub const DEFAULT_STATEMENT: &str = "Sign in with Ethereum to ContriBlock";

const PREAMBLE_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_ID_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";

/// Inputs for a single login attempt
#[derive(Debug, Clone)]
pub struct SiweParams {
    pub domain: String,
    pub origin: String,
    pub address: String,
    pub nonce: String,
    pub chain_id: u64,
    pub statement: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Ephemeral sign-in challenge; rendered with `Display`, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl SiweMessage {
    /// Build a message from `params`. Pure: same params, same text.
    pub fn build(params: &SiweParams) -> Result<Self> {
        let address = single_token("address", &params.address)?;
        let nonce = single_token("nonce", &params.nonce)?;
        let domain = single_token("domain", &params.domain)?;
        let uri = single_token("origin", &params.origin)?;

        let statement = match params.statement.as_deref().map(str::trim) {
            Some(statement) if statement.contains('\n') => {
                return Err(AuthError::InvalidInput(
                    "statement must be a single line".to_string(),
                ));
            }
            Some(statement) if !statement.is_empty() => Some(statement.to_string()),
            _ => None,
        };

        Ok(Self {
            domain,
            address,
            statement,
            uri,
            version: SIWE_VERSION.to_string(),
            chain_id: params.chain_id,
            nonce,
            issued_at: params.issued_at.trunc_subsecs(0),
        })
    }
}

fn single_token(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::InvalidInput(format!("{field} must not be empty")));
    }
    if value.contains(char::is_whitespace) {
        return Err(AuthError::InvalidInput(format!(
            "{field} must not contain whitespace"
        )));
    }
    Ok(value.to_string())
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.domain, PREAMBLE_SUFFIX)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "{URI_TAG}{}", self.uri)?;
        writeln!(f, "{VERSION_TAG}{}", self.version)?;
        writeln!(f, "{CHAIN_ID_TAG}{}", self.chain_id)?;
        writeln!(f, "{NONCE_TAG}{}", self.nonce)?;
        write!(
            f,
            "{ISSUED_AT_TAG}{}",
            self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use chrono::TimeZone;

    fn params() -> SiweParams {
        SiweParams {
            domain: "contriblock.app".to_string(),
            origin: "https://contriblock.app".to_string(),
            address: "0xABC0000000000000000000000000000000000123".to_string(),
            nonce: "n0nce1".to_string(),
            chain_id: 1337,
            statement: Some(DEFAULT_STATEMENT.to_string()),
            issued_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_build_renders_eip4361_text() {
        let message = SiweMessage::build(&params()).unwrap();
        let expected = "contriblock.app wants you to sign in with your Ethereum account:\n\
                        0xABC0000000000000000000000000000000000123\n\
                        \n\
                        Sign in with Ethereum to ContriBlock\n\
                        \n\
                        URI: https://contriblock.app\n\
                        Version: 1\n\
                        Chain ID: 1337\n\
                        Nonce: n0nce1\n\
                        Issued At: 2024-05-01T12:30:00Z";
        assert_eq!(message.to_string(), expected);
    }

    #[test]
    fn test_build_keeps_exact_address_and_nonce() {
        let text = SiweMessage::build(&params()).unwrap().to_string();
        assert!(text.contains("0xABC0000000000000000000000000000000000123"));
        assert!(text.contains("Nonce: n0nce1\n"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = SiweMessage::build(&params()).unwrap().to_string();
        let b = SiweMessage::build(&params()).unwrap().to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_rejects_empty_address_or_nonce() {
        let mut p = params();
        p.address = "  ".to_string();
        assert!(matches!(
            SiweMessage::build(&p),
            Err(AuthError::InvalidInput(_))
        ));

        let mut p = params();
        p.nonce = String::new();
        assert!(matches!(
            SiweMessage::build(&p),
            Err(AuthError::InvalidInput(_))
        ));

        let mut p = params();
        p.nonce = "abc\nURI: evil".to_string();
        assert!(matches!(
            SiweMessage::build(&p),
            Err(AuthError::InvalidInput(_))
        ));
    }

    /// Checksummed address and a nonce long enough for strict verifiers
    fn standard_params() -> SiweParams {
        SiweParams {
            address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
            nonce: "n0nce1abcd".to_string(),
            ..params()
        }
    }

    #[test]
    fn test_message_is_standard_eip4361() {
        let message = SiweMessage::build(&standard_params()).unwrap();
        let parsed = siwe::Message::from_str(&message.to_string()).unwrap();
        assert_eq!(parsed.nonce, "n0nce1abcd");
        assert_eq!(parsed.chain_id, 1337);
        assert_eq!(parsed.statement.as_deref(), Some(DEFAULT_STATEMENT));
        assert_eq!(parsed.to_string(), message.to_string());
    }

    #[test]
    fn test_message_without_statement() {
        let mut p = standard_params();
        p.statement = Some("   ".to_string());
        let text = SiweMessage::build(&p).unwrap().to_string();
        assert!(text.contains("2266\n\n\nURI: "));

        let parsed = siwe::Message::from_str(&text).unwrap();
        assert_eq!(parsed.statement, None);
        assert_eq!(parsed.to_string(), text);
    }
}
