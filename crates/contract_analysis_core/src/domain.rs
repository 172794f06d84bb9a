//! crates/contract_analysis_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// The five fields the AI provider extracts from a contract document.
///
/// The provider must return all five; the fields are optional here because
/// the persisted columns are nullable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAnalysis {
    pub parties: Option<String>,
    pub monetary_values: Option<String>,
    pub main_obligations: Option<String>,
    pub additional_data: Option<String>,
    pub termination_clause: Option<String>,
}

/// A persisted contract: the uploaded file's metadata plus the extracted fields.
#[derive(Debug, Clone)]
pub struct Contract {
    pub id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub analysis: ContractAnalysis,
    pub processed_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// Everything needed to insert a contract row; the id and timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub filename: String,
    pub file_path: String,
    pub analysis: ContractAnalysis,
}
