/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::enums::{KycStatus, UserRole};

/// User record as returned by `/users/me` and `/auth/verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub wallet: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, alias = "kycStatus")]
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub reputation: i64,
    #[serde(alias = "createdAt")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
