use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use flashsale_seckill::SeckillError;

/// Fixed result code + message surfaced to clients.
///
/// Business outcomes (sold out, repeat, rate limited) travel in the envelope
/// with HTTP 200: pollers discriminate on `code`/`data`, not on the status
/// line. Only session and internal failures carry an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMsg {
    pub code: i32,
    pub msg: &'static str,
}

pub const SUCCESS: CodeMsg = CodeMsg { code: 0, msg: "success" };
pub const SERVER_ERROR: CodeMsg = CodeMsg { code: 500100, msg: "server error" };
pub const SESSION_ERROR: CodeMsg = CodeMsg { code: 500101, msg: "session invalid" };
pub const REQUEST_ILLEGAL: CodeMsg = CodeMsg { code: 500102, msg: "request illegal" };
pub const ACCESS_LIMIT_REACHED: CodeMsg = CodeMsg { code: 500104, msg: "access limit reached" };
pub const SECKILL_OVER: CodeMsg = CodeMsg { code: 500500, msg: "seckill is over" };
pub const REPEAT_SECKILL: CodeMsg = CodeMsg { code: 500501, msg: "repeated seckill" };

pub fn success(data: impl serde::Serialize) -> axum::response::Response {
    (
        StatusCode::OK,
        axum::Json(json!({
            "code": SUCCESS.code,
            "msg": SUCCESS.msg,
            "data": data,
        })),
    )
        .into_response()
}

pub fn error(status: StatusCode, code_msg: CodeMsg) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "code": code_msg.code,
            "msg": code_msg.msg,
            "data": null,
        })),
    )
        .into_response()
}

pub fn seckill_error_to_response(err: SeckillError) -> axum::response::Response {
    match err {
        SeckillError::RateLimited => error(StatusCode::OK, ACCESS_LIMIT_REACHED),
        SeckillError::UnknownGoods(_) => error(StatusCode::OK, REQUEST_ILLEGAL),
        SeckillError::SoldOut => error(StatusCode::OK, SECKILL_OVER),
        SeckillError::DuplicatePurchase => error(StatusCode::OK, REPEAT_SECKILL),
        SeckillError::Store(e) => {
            tracing::error!("store failure: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
        }
        SeckillError::Enqueue(msg) => {
            tracing::error!("enqueue failure: {msg}");
            error(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
        }
    }
}
