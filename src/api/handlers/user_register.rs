use super::{
    rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter},
    utils::extract_client_ip,
};
use crate::credentials::{
    check_password_policy, CreateOutcome, CredentialHasher, CredentialStore, NewUser,
};
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, sync::Arc};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct UserRegister {
    username: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[schema(format = Password)]
    password: String,
    #[schema(format = Password)]
    confirm_password: String,
}

impl fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/user/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Registration successful", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing payload, empty username or weak password", body = String),
        (status = 409, description = "User with the specified username already exists", body = String),
        (status = 429, description = "Too many attempts", body = String),
    ),
    tag= "register"
)]
#[instrument(skip(headers, peer, store, hasher, rate_limiter, payload))]
pub async fn register(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    store: Extension<Arc<dyn CredentialStore>>,
    hasher: Extension<Arc<CredentialHasher>>,
    rate_limiter: Extension<Arc<dyn RateLimiter>>,
    payload: Option<Json<UserRegister>>,
) -> impl IntoResponse {
    let client_ip = extract_client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    if rate_limiter.check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        debug!("Rate limited");
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string());
    }

    let user: UserRegister = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    debug!("user: {:?}", user);

    let username = user.username.trim().to_string();
    if username.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string());
    }

    if let Err(violation) = check_password_policy(&user.password, &user.confirm_password) {
        debug!(%violation, "password rejected by policy");
        return (StatusCode::BAD_REQUEST, violation.to_string());
    }

    // bcrypt is CPU bound; keep it off the async workers
    let hasher = Arc::clone(&hasher.0);
    let password = user.password;
    let credential_hash = match tokio::task::spawn_blocking(move || hasher.hash(&password)).await
    {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            error!("Error hashing password: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error hashing password".to_string(),
            );
        }
        Err(e) => {
            error!("Hashing task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error hashing password".to_string(),
            );
        }
    };

    let new_user = NewUser {
        username,
        first_name: user.first_name.trim().to_string(),
        last_name: user.last_name.trim().to_string(),
        credential_hash,
    };

    match store.create_user(&new_user).await {
        Ok(CreateOutcome::Created(user_id)) => {
            debug!(user_id, "user created");
            (StatusCode::CREATED, "User created".to_string())
        }
        Ok(CreateOutcome::Conflict) => {
            debug!("User already exists");
            (StatusCode::CONFLICT, "User already exists".to_string())
        }
        Err(e) => {
            error!("Error inserting user: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error inserting user".to_string(),
            )
        }
    }
}
