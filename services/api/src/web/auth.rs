//! services/api/src/web/auth.rs
//!
//! The login endpoint plus the password-hashing and JWT helpers it is built on.
//! Tokens are stateless: signature + expiry are the only validity checks, and
//! there is no refresh or server-side revocation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::TOKEN_LIFETIME_MINUTES;
use crate::web::state::AppState;

//=========================================================================================
// Token Claims and Helpers
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    pub username: String,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
}

impl Claims {
    pub fn new(user_id: Uuid, username: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::minutes(TOKEN_LIFETIME_MINUTES);
        Self {
            sub: user_id,
            username,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_access_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

//=========================================================================================
// Password Hashing
//=========================================================================================

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// PHC-format verification; the comparison inside argon2 is constant-time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /login - Exchange username/password for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Look the user up; an unknown username gets the same response as a
    // bad password.
    let user = state
        .db
        .find_user_by_username(&req.username)
        .await
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "Incorrect username or password".to_string(),
            )
        })?;

    // 2. Verify the password against the stored hash
    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    if !valid {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Incorrect username or password".to_string(),
        ));
    }

    // 3. Issue a signed token with a fixed lifetime
    let claims = Claims::new(user.id, user.username);
    let access_token = create_access_token(&claims, &state.config.jwt_secret).map_err(|e| {
        error!("Failed to sign access token: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "admin".into());
        let token = create_access_token(&claims, "secret").expect("create token");
        let decoded = verify_access_token(&token, "secret").expect("verify token");
        assert_eq!(decoded.sub, user_id);
        assert_eq!(decoded.username, "admin");
    }

    #[test]
    fn token_lifetime_is_thirty_minutes() {
        let claims = Claims::new(Uuid::new_v4(), "admin".into());
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_MINUTES * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), "admin".into());
        // Push expiry well past the default validation leeway.
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = create_access_token(&claims, "secret").expect("create token");
        assert!(verify_access_token(&token, "secret").is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "admin".into());
        let token = create_access_token(&claims, "secret").expect("create token");
        assert!(verify_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(verify_access_token("not-a-jwt", "secret").is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("admin123").expect("hash");
        assert!(verify_password("admin123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
