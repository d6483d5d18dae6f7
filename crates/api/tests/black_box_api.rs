use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::Value;

use flashsale_auth::JwtClaims;
use flashsale_core::{GoodsId, UserId};
use flashsale_goods::Goods;
use flashsale_seckill::RateGateConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str, goods: Vec<Goods>, gate: RateGateConfig) -> Self {
        // Build the app (same router as prod) over in-memory stores, bound
        // to an ephemeral port.
        let services = Arc::new(
            flashsale_api::app::services::build_in_memory_services_with(goods, gate).await,
        );
        let app = flashsale_api::app::build_app_with(jwt_secret.to_string(), services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user_id: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        issued_at: now - ChronoDuration::minutes(1),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn open_gate() -> RateGateConfig {
    RateGateConfig {
        permits_per_sec: 0,
        burst: 0,
        admit_timeout: Duration::ZERO,
    }
}

fn flash_goods(stock: i64) -> Vec<Goods> {
    vec![Goods::new(GoodsId::new(42), "flash item", 99_00, stock).unwrap()]
}

async fn do_seckill(client: &reqwest::Client, base_url: &str, token: &str, goods_id: i64) -> Value {
    client
        .post(format!("{base_url}/seckill/do_seckill?goodsId={goods_id}"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn poll_result(client: &reqwest::Client, base_url: &str, token: &str, goods_id: i64) -> i64 {
    // The order materializes asynchronously (queue -> worker). Poll until
    // the result leaves "pending".
    for _ in 0..200 {
        let body: Value = client
            .get(format!("{base_url}/seckill/result?goodsId={goods_id}"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["code"], 0);
        let data = body["data"].as_i64().unwrap();
        if data != 0 {
            return data;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("seckill result stayed pending within timeout");
}

#[tokio::test]
async fn health_is_open() {
    let srv = TestServer::spawn("test-secret", flash_goods(1), open_gate()).await;

    let res = reqwest::Client::new()
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_is_required_for_seckill_endpoints() {
    let srv = TestServer::spawn("test-secret", flash_goods(1), open_gate()).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/seckill/do_seckill?goodsId=42", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], 500101);
}

#[tokio::test]
async fn user_identity_is_derived_from_token() {
    let srv = TestServer::spawn("test-secret", flash_goods(1), open_gate()).await;
    let token = mint_jwt("test-secret", UserId::new(77));

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], 77);
}

#[tokio::test(flavor = "multi_thread")]
async fn last_unit_queues_one_user_and_sells_out_the_other() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret, flash_goods(1), open_gate()).await;
    let client = reqwest::Client::new();

    let winner = mint_jwt(jwt_secret, UserId::new(1));
    let loser = mint_jwt(jwt_secret, UserId::new(2));

    // Winner is queued immediately...
    let body = do_seckill(&client, &srv.base_url, &winner, 42).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], 0);

    // ...and the order materializes asynchronously.
    let order_id = poll_result(&client, &srv.base_url, &winner, 42).await;
    assert!(order_id > 0);

    // The counter is exhausted; reconciliation confirms authoritative stock
    // is gone and the second user is told the sale is over.
    let body = do_seckill(&client, &srv.base_url, &loser, 42).await;
    assert_eq!(body["code"], 500500);

    let lost = poll_result(&client, &srv.base_url, &loser, 42).await;
    assert_eq!(lost, -1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_seckill_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret, flash_goods(5), open_gate()).await;
    let client = reqwest::Client::new();

    let token = mint_jwt(jwt_secret, UserId::new(1));

    let body = do_seckill(&client, &srv.base_url, &token, 42).await;
    assert_eq!(body["code"], 0);

    let order_id = poll_result(&client, &srv.base_url, &token, 42).await;
    assert!(order_id > 0);

    let body = do_seckill(&client, &srv.base_url, &token, 42).await;
    assert_eq!(body["code"], 500501);
}

#[tokio::test]
async fn unknown_goods_fail_closed() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret, flash_goods(1), open_gate()).await;
    let client = reqwest::Client::new();

    let token = mint_jwt(jwt_secret, UserId::new(1));
    let body = do_seckill(&client, &srv.base_url, &token, 999).await;
    assert_eq!(body["code"], 500102);
}

#[tokio::test]
async fn over_rate_requests_get_access_limit_code() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(
        jwt_secret,
        flash_goods(100),
        RateGateConfig {
            permits_per_sec: 1,
            burst: 1,
            admit_timeout: Duration::from_millis(5),
        },
    )
    .await;
    let client = reqwest::Client::new();

    let first = mint_jwt(jwt_secret, UserId::new(1));
    let body = do_seckill(&client, &srv.base_url, &first, 42).await;
    assert_eq!(body["code"], 0);

    let second = mint_jwt(jwt_secret, UserId::new(2));
    let body = do_seckill(&client, &srv.base_url, &second, 42).await;
    assert_eq!(body["code"], 500104);
}
