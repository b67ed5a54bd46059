use super::{
    rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter},
    utils::extract_client_ip,
};
use crate::credentials::{Authenticator, Identity};
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, sync::Arc};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct UserLogin {
    username: String,
    #[schema(format = Password)]
    password: String,
}

impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/user/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Unauthorized", body = String),
        (status = 429, description = "Too many attempts", body = String),
    ),
    tag= "login"
)]
#[instrument(skip(headers, peer, authenticator, rate_limiter, payload))]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    authenticator: Extension<Authenticator>,
    rate_limiter: Extension<Arc<dyn RateLimiter>>,
    payload: Option<Json<UserLogin>>,
) -> impl IntoResponse {
    let user: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    let client_ip = extract_client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    if rate_limiter.check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
        || rate_limiter.check_username(&user.username, RateLimitAction::Login)
            == RateLimitDecision::Limited
    {
        debug!("Rate limited");
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string());
    }

    debug!("user: {:?}", user);

    let password = SecretString::from(user.password);

    match authenticator
        .verify(Identity::Username(user.username.trim()), &password)
        .await
    {
        Ok(true) => {
            debug!("Login successful");

            (StatusCode::OK, String::from("Login successful"))
        }

        // Same answer for unknown user and wrong password.
        Ok(false) => {
            debug!("Unauthorized");

            (StatusCode::UNAUTHORIZED, String::from("Unauthorized"))
        }

        Err(e) => {
            error!("Error verifying credential: {:#}", e);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error verifying credential".to_string(),
            )
        }
    }
}
