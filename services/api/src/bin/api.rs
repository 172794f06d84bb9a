//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiExtractor},
    config::{Config, MAX_UPLOAD_BYTES},
    error::ApiError,
    web::{
        auth::{hash_password, login_handler},
        get_contract_handler, health_handler, require_auth, reset_admin_handler, rest::ApiDoc,
        root_handler, state::AppState, upload_contract_handler,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Schema/connectivity bootstrap: bounded, fixed-delay, fatal on exhaustion.
const DB_CONNECT_ATTEMPTS: u32 = 30;
const DB_CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Bootstrap-account provisioning: bounded, fixed-delay, non-fatal on exhaustion.
const ADMIN_PROVISION_ATTEMPTS: u32 = 3;
const ADMIN_PROVISION_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not configured; uploads will fail until it is set");
    }

    // --- 2. Connect to Database & Run Migrations (bounded retry) ---
    let db_pool = connect_and_migrate(&config).await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Database ready.");

    // --- 3. Provision the Bootstrap Account (non-fatal on exhaustion) ---
    provision_admin_user(db_adapter.as_ref(), &config).await;

    // --- 4. Ensure the Upload Directory Exists ---
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // --- 5. Initialize the Extraction Adapter ---
    let extractor = Arc::new(GeminiExtractor::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));

    // --- 6. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        extractor,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // --- 7. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/login", post(login_handler))
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/debug/reset-admin", post(reset_admin_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/contracts/upload", post(upload_contract_handler))
        .route("/contracts/{name}", get(get_contract_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes. The body limit sits above the upload ceiling so
    // oversize files reach the intake check and get the 400 it produces,
    // not a transport-level 413.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 8. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects to Postgres and runs migrations, retrying the whole step with a
/// fixed delay. Exhausting the attempts aborts startup.
async fn connect_and_migrate(config: &Config) -> Result<PgPool, ApiError> {
    for attempt in 1..=DB_CONNECT_ATTEMPTS {
        let result = async {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await?;
            DbAdapter::new(pool.clone()).run_migrations().await?;
            Ok::<_, sqlx::Error>(pool)
        }
        .await;

        match result {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < DB_CONNECT_ATTEMPTS => {
                warn!(attempt, error = %e, "database not ready, retrying");
                tokio::time::sleep(DB_CONNECT_DELAY).await;
            }
            Err(e) => {
                error!(error = %e, "failed to connect to database");
                return Err(e.into());
            }
        }
    }
    unreachable!("retry loop always returns");
}

/// Idempotently creates (or resets) the bootstrap account. Exhausting the
/// attempts is logged but does not abort startup; the debug reset endpoint
/// remains available as a fallback.
async fn provision_admin_user(db: &DbAdapter, config: &Config) {
    use contract_analysis_core::ports::DatabaseService;

    let password_hash = match hash_password(&config.admin_password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "failed to hash admin password; skipping provisioning");
            return;
        }
    };

    for attempt in 1..=ADMIN_PROVISION_ATTEMPTS {
        match db
            .upsert_admin_user(&config.admin_username, &password_hash)
            .await
        {
            Ok(_) => {
                info!(username = %config.admin_username, "admin user ready");
                return;
            }
            Err(e) if attempt < ADMIN_PROVISION_ATTEMPTS => {
                warn!(attempt, error = %e, "failed to provision admin user, retrying");
                tokio::time::sleep(ADMIN_PROVISION_DELAY).await;
            }
            Err(e) => {
                error!(error = %e, "failed to provision admin user");
            }
        }
    }
}
