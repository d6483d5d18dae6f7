use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    routing::{get, post},
};

use flashsale_core::GoodsId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/do_seckill", post(do_seckill))
        .route("/result", get(result))
}

/// POST is deliberate: admission consumes shared state and is not idempotent.
pub async fn do_seckill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::GoodsIdParams>,
) -> axum::response::Response {
    let goods_id = GoodsId::new(params.goods_id);

    match services.do_seckill(user.user_id(), goods_id).await {
        // `data: 0` means queued; the final outcome is read via `/result`.
        Ok(()) => errors::success(0),
        Err(e) => errors::seckill_error_to_response(e),
    }
}

pub async fn result(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::GoodsIdParams>,
) -> axum::response::Response {
    let goods_id = GoodsId::new(params.goods_id);

    match services.result(user.user_id(), goods_id).await {
        Ok(result) => errors::success(result.as_wire()),
        Err(e) => errors::seckill_error_to_response(e),
    }
}
