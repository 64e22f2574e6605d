/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UserRole {
    #[default]
    #[serde(rename = "user", alias = "USER", alias = "User")]
    User,
    #[serde(rename = "verifier", alias = "VERIFIER", alias = "Verifier")]
    Verifier,
    #[serde(rename = "admin", alias = "ADMIN", alias = "Admin")]
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KycStatus {
    #[default]
    #[serde(rename = "none", alias = "NONE", alias = "None")]
    None,
    #[serde(rename = "pending", alias = "PENDING", alias = "Pending")]
    Pending,
    #[serde(rename = "approved", alias = "APPROVED", alias = "Approved")]
    Approved,
    #[serde(rename = "rejected", alias = "REJECTED", alias = "Rejected")]
    Rejected,
}

/// How the controller establishes a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Nonce -> sign -> verify against the backend
    #[default]
    Siwe,
    /// Local demo session, no backend calls. Dev/test only.
    Demo,
}
