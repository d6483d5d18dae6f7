use axum::{Json, http::StatusCode, response::IntoResponse};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    axum::extract::Extension(user): axum::extract::Extension<crate::context::UserContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": user.user_id(),
    }))
}
