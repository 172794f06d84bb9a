//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contract_analysis_core::domain::{Contract, ContractAnalysis, NewContract, User, UserCredentials};
use contract_analysis_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserCredentialsRecord {
    id: Uuid,
    username: String,
    password_hash: String,
}
impl UserCredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct ContractRecord {
    id: Uuid,
    filename: String,
    file_path: String,
    parties: Option<String>,
    monetary_values: Option<String>,
    main_obligations: Option<String>,
    additional_data: Option<String>,
    termination_clause: Option<String>,
    processed_at: DateTime<Utc>,
    created_by: Uuid,
}
impl ContractRecord {
    fn to_domain(self) -> Contract {
        Contract {
            id: self.id,
            filename: self.filename,
            file_path: self.file_path,
            analysis: ContractAnalysis {
                parties: self.parties,
                monetary_values: self.monetary_values,
                main_obligations: self.main_obligations,
                additional_data: self.additional_data,
                termination_clause: self.termination_clause,
            },
            processed_at: self.processed_at,
            created_by: self.created_by,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User '{}' not found", username)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn upsert_admin_user(&self, username: &str, password_hash: &str) -> PortResult<User> {
        // The uniqueness constraint on `username` makes this idempotent,
        // including under concurrent invocations of the reset endpoint.
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3) \
             ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash \
             RETURNING id, username, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn create_contract(&self, new: NewContract, created_by: Uuid) -> PortResult<Contract> {
        let record = sqlx::query_as::<_, ContractRecord>(
            "INSERT INTO contracts \
                 (id, filename, file_path, parties, monetary_values, main_obligations, \
                  additional_data, termination_clause, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, filename, file_path, parties, monetary_values, main_obligations, \
                       additional_data, termination_clause, processed_at, created_by",
        )
        .bind(Uuid::new_v4())
        .bind(&new.filename)
        .bind(&new.file_path)
        .bind(&new.analysis.parties)
        .bind(&new.analysis.monetary_values)
        .bind(&new.analysis.main_obligations)
        .bind(&new.analysis.additional_data)
        .bind(&new.analysis.termination_clause)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn find_contract_by_filename(&self, filename: &str) -> PortResult<Contract> {
        // Filenames are not unique; prefer the most recently processed match.
        let record = sqlx::query_as::<_, ContractRecord>(
            "SELECT id, filename, file_path, parties, monetary_values, main_obligations, \
                    additional_data, termination_clause, processed_at, created_by \
             FROM contracts WHERE filename = $1 \
             ORDER BY processed_at DESC LIMIT 1",
        )
        .bind(filename)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Contract '{}' not found", filename))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }
}
