//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::docx;
use crate::intake::{self, IntakeError, MediaType, StoredUpload};
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use contract_analysis_core::domain::{Contract, NewContract};
use contract_analysis_core::ports::{ContractDocument, PortError, PortResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        upload_contract_handler,
        get_contract_handler,
    ),
    components(
        schemas(
            ContractResponse,
            crate::web::auth::LoginRequest,
            crate::web::auth::TokenResponse,
        )
    ),
    tags(
        (name = "Contract Analysis API", description = "API endpoints for contract upload and AI-driven field extraction.")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the bearer scheme the protected paths reference, so the Swagger
/// UI Authorize button actually applies the token.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A persisted contract as returned by the upload and fetch endpoints.
#[derive(Serialize, ToSchema)]
pub struct ContractResponse {
    id: Uuid,
    filename: String,
    parties: Option<String>,
    monetary_values: Option<String>,
    main_obligations: Option<String>,
    additional_data: Option<String>,
    termination_clause: Option<String>,
}

impl From<Contract> for ContractResponse {
    fn from(contract: Contract) -> Self {
        Self {
            id: contract.id,
            filename: contract.filename,
            parties: contract.analysis.parties,
            monetary_values: contract.analysis.monetary_values,
            main_obligations: contract.analysis.main_obligations,
            additional_data: contract.analysis.additional_data,
            termination_clause: contract.analysis.termination_clause,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a contract document and run the analysis pipeline.
///
/// Accepts a multipart/form-data request with a single file part
/// (`.pdf` or `.docx`). The file is validated and stored, the content is
/// analyzed by the AI provider, and the extracted record is persisted under
/// the authenticated uploader's identity. On any failure after the file has
/// been stored it is removed again; the contract row is only inserted after
/// a successful extraction.
#[utoipa::path(
    post,
    path = "/contracts/upload",
    request_body(content_type = "multipart/form-data", description = "The contract document to upload."),
    responses(
        (status = 200, description = "Contract analyzed and persisted", body = ContractResponse),
        (status = 400, description = "Unsupported file type or file too large"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Processing error")
    ),
    security(("bearer_token" = []))
)]
pub async fn upload_contract_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (original_name, data) = if let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error_response(e, "Failed to read multipart data"))?
    {
        let name = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "File part must have a filename".to_string(),
                )
            })?;
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error_response(e, "Failed to read file bytes"))?;
        (name, data)
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let stored = intake::accept(&state.config.upload_dir, &original_name, data)
        .await
        .map_err(|e| {
            let status = match e {
                IntakeError::UnsupportedType(_) | IntakeError::TooLarge => StatusCode::BAD_REQUEST,
                IntakeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })?;
    info!(filename = %stored.original_name, "file stored");

    match analyze_and_persist(state.as_ref(), &stored, user.user_id).await {
        Ok(contract) => {
            info!(contract_id = %contract.id, filename = %contract.filename, "contract processed");
            Ok(Json(ContractResponse::from(contract)))
        }
        Err(e) => {
            // The file was durably written above; a contract row must never
            // outlive a failed pipeline, and neither must the file.
            error!(filename = %stored.original_name, error = %e, "upload pipeline failed");
            intake::remove_file(&stored.path).await;
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process contract: {}", e),
            ))
        }
    }
}

/// A body that blows the transport limit gets the same wording as a file
/// that fails the intake ceiling.
fn multipart_error_response(
    e: axum::extract::multipart::MultipartError,
    context: &str,
) -> (StatusCode, String) {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        (StatusCode::BAD_REQUEST, IntakeError::TooLarge.to_string())
    } else {
        (StatusCode::BAD_REQUEST, format!("{}: {}", context, e))
    }
}

/// The post-storage pipeline steps: format dispatch, extraction, persistence.
async fn analyze_and_persist(
    state: &AppState,
    stored: &StoredUpload,
    created_by: Uuid,
) -> PortResult<Contract> {
    let document = match stored.media_type {
        MediaType::Pdf => ContractDocument::Pdf(stored.bytes.to_vec()),
        MediaType::Docx => {
            // DOCX content is reduced to paragraph text from the stored file.
            let bytes = tokio::fs::read(&stored.path)
                .await
                .map_err(|e| PortError::Unexpected(format!("Failed to re-read stored file: {}", e)))?;
            let text = docx::extract_text(&bytes)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            ContractDocument::Text(text)
        }
    };

    let analysis = state.extractor.extract_contract_data(document).await?;

    state
        .db
        .create_contract(
            NewContract {
                filename: stored.original_name.clone(),
                file_path: stored.path.display().to_string(),
                analysis,
            },
            created_by,
        )
        .await
}

/// Fetch a contract by its original filename.
///
/// Filenames are not unique; with duplicates the most recently processed
/// record is returned.
#[utoipa::path(
    get,
    path = "/contracts/{name}",
    responses(
        (status = 200, description = "Contract found", body = ContractResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No contract with that filename")
    ),
    params(
        ("name" = String, Path, description = "The original filename of the contract.")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_contract_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.db.find_contract_by_filename(&name).await {
        Ok(contract) => Ok(Json(ContractResponse::from(contract))),
        Err(PortError::NotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "Contract not found".to_string()))
        }
        Err(e) => {
            error!(filename = %name, error = %e, "contract lookup failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch contract".to_string(),
            ))
        }
    }
}

/// GET / - Status banner
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Contract Analysis API",
        "status": "online"
    }))
}

/// GET /health - Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// POST /debug/reset-admin - Re-provision the bootstrap account.
///
/// Operational escape hatch, deliberately unauthenticated; not for
/// production exposure.
pub async fn reset_admin_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    warn!("unauthenticated admin reset invoked");

    let password_hash = crate::web::auth::hash_password(&state.config.admin_password)
        .map_err(|e| {
            error!("Failed to hash admin password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reset admin user".to_string(),
            )
        })?;

    state
        .db
        .upsert_admin_user(&state.config.admin_username, &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to reset admin user: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reset admin user".to_string(),
            )
        })?;

    Ok(Json(serde_json::json!({ "message": "Admin user reset" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::web::auth::{create_access_token, Claims};
    use crate::web::middleware::require_auth;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::DefaultBodyLimit;
    use axum::http::{header, Request};
    use axum::middleware as axum_middleware;
    use axum::routing::{get, post};
    use axum::Router;
    use chrono::Utc;
    use contract_analysis_core::domain::{ContractAnalysis, User, UserCredentials};
    use contract_analysis_core::ports::{ContractExtractionService, DatabaseService};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "test-secret";

    struct MockDb {
        contracts: Mutex<Vec<Contract>>,
    }

    impl MockDb {
        fn new() -> Self {
            Self {
                contracts: Mutex::new(Vec::new()),
            }
        }

        fn contract_count(&self) -> usize {
            self.contracts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DatabaseService for MockDb {
        async fn find_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
            Err(PortError::NotFound(format!("User '{}' not found", username)))
        }

        async fn upsert_admin_user(&self, username: &str, _password_hash: &str) -> PortResult<User> {
            Ok(User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                created_at: Utc::now(),
            })
        }

        async fn create_contract(&self, new: NewContract, created_by: Uuid) -> PortResult<Contract> {
            let contract = Contract {
                id: Uuid::new_v4(),
                filename: new.filename,
                file_path: new.file_path,
                analysis: new.analysis,
                processed_at: Utc::now(),
                created_by,
            };
            self.contracts.lock().unwrap().push(contract.clone());
            Ok(contract)
        }

        async fn find_contract_by_filename(&self, filename: &str) -> PortResult<Contract> {
            self.contracts
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|c| c.filename == filename)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Contract '{}' not found", filename)))
        }
    }

    struct StubExtractor;

    #[async_trait]
    impl ContractExtractionService for StubExtractor {
        async fn extract_contract_data(
            &self,
            _document: ContractDocument,
        ) -> PortResult<ContractAnalysis> {
            Ok(ContractAnalysis {
                parties: Some("A and B".into()),
                monetary_values: Some("$100".into()),
                main_obligations: Some("deliver".into()),
                additional_data: Some("one year".into()),
                termination_clause: Some("30 days notice".into()),
            })
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl ContractExtractionService for FailingExtractor {
        async fn extract_contract_data(
            &self,
            _document: ContractDocument,
        ) -> PortResult<ContractAnalysis> {
            Err(PortError::Provider("provider unavailable".into()))
        }
    }

    fn test_state(
        upload_dir: &TempDir,
        db: Arc<MockDb>,
        extractor: Arc<dyn ContractExtractionService>,
    ) -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            jwt_secret: TEST_SECRET.to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            upload_dir: upload_dir.path().to_path_buf(),
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
        };
        Arc::new(AppState {
            db,
            extractor,
            config: Arc::new(config),
        })
    }

    fn test_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/contracts/upload", post(upload_contract_handler))
            .route("/contracts/{name}", get(get_contract_handler))
            .layer(axum_middleware::from_fn_with_state(
                state.clone(),
                require_auth,
            ))
            .with_state(state)
    }

    fn bearer_token() -> String {
        let claims = Claims::new(Uuid::new_v4(), "admin".into());
        create_access_token(&claims, TEST_SECRET).unwrap()
    }

    fn upload_request(filename: &str, content: &[u8], token: Option<&str>) -> Request<Body> {
        let boundary = "contract-upload-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/contracts/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn upload_without_bearer_token_is_unauthorized() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        let app = test_router(test_state(&dir, db.clone(), Arc::new(StubExtractor)));

        let response = app
            .oneshot(upload_request("contract.pdf", b"%PDF-1.4", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(db.contract_count(), 0);
    }

    #[tokio::test]
    async fn txt_upload_is_rejected_and_nothing_persists() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        let app = test_router(test_state(&dir, db.clone(), Arc::new(StubExtractor)));

        let response = app
            .oneshot(upload_request(
                "notes.txt",
                b"plain text",
                Some(&bearer_token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(db.contract_count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_removes_file_and_creates_no_row() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        let app = test_router(test_state(&dir, db.clone(), Arc::new(FailingExtractor)));

        let response = app
            .oneshot(upload_request(
                "contract.pdf",
                b"%PDF-1.4",
                Some(&bearer_token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(db.contract_count(), 0);
        // The stored file must not outlive the failed pipeline.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn successful_upload_persists_contract_and_keeps_file() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        let app = test_router(test_state(&dir, db.clone(), Arc::new(StubExtractor)));

        let response = app
            .oneshot(upload_request(
                "contract.pdf",
                b"%PDF-1.4",
                Some(&bearer_token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(db.contract_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["filename"], "contract.pdf");
        assert_eq!(json["parties"], "A and B");
        assert_eq!(json["termination_clause"], "30 days notice");
        assert!(json["id"].is_string());
    }

    #[tokio::test]
    async fn fetch_unknown_filename_is_not_found() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        let app = test_router(test_state(&dir, db, Arc::new(StubExtractor)));

        let request = Request::builder()
            .method("GET")
            .uri("/contracts/missing.pdf")
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn body_over_transport_limit_reports_too_large() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MockDb::new());
        // A tiny limit stands in for the real ceiling-plus-headroom.
        let app = test_router(test_state(&dir, db.clone(), Arc::new(StubExtractor)))
            .layer(DefaultBodyLimit::max(1024));

        let response = app
            .oneshot(upload_request(
                "contract.pdf",
                &vec![0u8; 4096],
                Some(&bearer_token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("File too large"));
        assert_eq!(db.contract_count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
