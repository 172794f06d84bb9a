//! crates/contract_analysis_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Contract, ContractAnalysis, NewContract, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("AI provider credential is not configured")]
    ProviderUnconfigured,
    #[error("AI provider call failed: {0}")]
    Provider(String),
    #[error("AI provider returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn find_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    /// Creates the bootstrap account, or replaces its password hash if the
    /// username already exists. Idempotent; guarded by the uniqueness
    /// constraint on `username`.
    async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> PortResult<User>;

    // --- Contract Management ---
    async fn create_contract(&self, new: NewContract, created_by: Uuid) -> PortResult<Contract>;

    /// Filenames are not unique; with duplicates this returns the most
    /// recently processed match.
    async fn find_contract_by_filename(&self, filename: &str) -> PortResult<Contract>;
}

/// What gets submitted to the AI provider, one variant per supported format.
///
/// PDF bytes travel as an inline document attachment; DOCX content is reduced
/// to plain paragraph text before it reaches this boundary.
#[derive(Debug, Clone)]
pub enum ContractDocument {
    Pdf(Vec<u8>),
    Text(String),
}

#[async_trait]
pub trait ContractExtractionService: Send + Sync {
    /// Runs the document through the provider and returns the five extracted
    /// fields. A fresh provider call every time; results may differ between
    /// invocations for identical input.
    async fn extract_contract_data(&self, document: ContractDocument)
        -> PortResult<ContractAnalysis>;
}
