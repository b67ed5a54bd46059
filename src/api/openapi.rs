use super::handlers::{health, uploads, user_login, user_register};
use utoipa::OpenApi;

// Info (title, version, license) is filled from Cargo metadata by the derive.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user_register::register,
        user_login::login,
        uploads::upload,
        uploads::download,
    ),
    components(schemas(
        health::Health,
        user_register::UserRegister,
        user_login::UserLogin,
        uploads::UploadForm,
        uploads::Uploaded,
    )),
    tags(
        (name = "health", description = "Service and database status"),
        (name = "register", description = "Account creation"),
        (name = "login", description = "Password authentication"),
        (name = "uploads", description = "Validated image uploads"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
