use serde::Deserialize;

// -------------------------
// Request DTOs
// -------------------------

/// Query parameters for the seckill endpoints (`?goodsId=<id>`).
#[derive(Debug, Deserialize)]
pub struct GoodsIdParams {
    #[serde(rename = "goodsId")]
    pub goods_id: i64,
}
