//! End-to-end pipeline tests against the in-memory stores.
//!
//! These exercise the concurrency contract: the oversell bound under a
//! request surge, terminal sold-out behavior, duplicate rejection, seeding
//! idempotence, fail-closed reads, and admission gating.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use flashsale_core::{GoodsId, UserId};
use flashsale_goods::Goods;
use flashsale_orders::{InMemoryOrderQueue, OrderQueue, SeckillResult};
use flashsale_seckill::{
    GoodsStore, RateGateConfig, SeckillError, SeckillPipeline, StockCounter, StoreError,
};

use crate::goods_store::InMemoryGoodsStore;
use crate::order_store::InMemoryOrderStore;
use crate::stock_counter::InMemoryStockCounter;
use crate::worker::OrderWorker;

const ITEM: GoodsId = GoodsId::new(42);

/// Goods store wrapper counting authoritative stock reads, to assert the
/// sold-out fast path really short-circuits them.
#[derive(Debug)]
struct CountingGoodsStore {
    inner: InMemoryGoodsStore,
    authoritative_reads: AtomicUsize,
}

impl CountingGoodsStore {
    fn new(goods: Vec<Goods>) -> Self {
        Self {
            inner: InMemoryGoodsStore::with_goods(goods),
            authoritative_reads: AtomicUsize::new(0),
        }
    }

    fn authoritative_reads(&self) -> usize {
        self.authoritative_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GoodsStore for CountingGoodsStore {
    async fn list_goods(&self) -> Result<Vec<Goods>, StoreError> {
        self.inner.list_goods().await
    }

    async fn get_goods(&self, goods_id: GoodsId) -> Result<Option<Goods>, StoreError> {
        self.inner.get_goods(goods_id).await
    }

    async fn stock_count(&self, goods_id: GoodsId) -> Result<Option<i64>, StoreError> {
        self.authoritative_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.stock_count(goods_id).await
    }

    async fn reduce_stock(&self, goods_id: GoodsId) -> Result<bool, StoreError> {
        self.inner.reduce_stock(goods_id).await
    }
}

type TestPipeline = SeckillPipeline<
    Arc<InMemoryStockCounter>,
    Arc<CountingGoodsStore>,
    Arc<InMemoryOrderStore>,
    Arc<InMemoryOrderQueue>,
>;

struct Harness {
    pipeline: Arc<TestPipeline>,
    counter: Arc<InMemoryStockCounter>,
    goods: Arc<CountingGoodsStore>,
    orders: Arc<InMemoryOrderStore>,
    queue: Arc<InMemoryOrderQueue>,
}

fn open_gate() -> RateGateConfig {
    RateGateConfig {
        permits_per_sec: 0,
        burst: 0,
        admit_timeout: Duration::ZERO,
    }
}

async fn harness_with(stock: i64, gate: RateGateConfig) -> Harness {
    let counter = Arc::new(InMemoryStockCounter::new());
    let goods = Arc::new(CountingGoodsStore::new(vec![
        Goods::new(ITEM, "flash item", 99_00, stock).unwrap(),
    ]));
    let orders = Arc::new(InMemoryOrderStore::new());
    let queue = Arc::new(InMemoryOrderQueue::new());

    let pipeline = Arc::new(SeckillPipeline::new(
        counter.clone(),
        goods.clone(),
        orders.clone(),
        queue.clone(),
        gate,
    ));
    pipeline.seed_all().await.unwrap();

    Harness {
        pipeline,
        counter,
        goods,
        orders,
        queue,
    }
}

async fn harness(stock: i64) -> Harness {
    harness_with(stock, open_gate()).await
}

fn spawn_worker(h: &Harness) -> tokio::task::JoinHandle<()> {
    OrderWorker::new(h.goods.clone(), h.orders.clone(), h.pipeline.flags()).spawn(&h.queue)
}

/// Poll the result endpoint until it leaves `Pending`.
async fn result_eventually(pipeline: &TestPipeline, user: UserId) -> SeckillResult {
    for _ in 0..1000 {
        match pipeline.result(user, ITEM).await.unwrap() {
            SeckillResult::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
            terminal => return terminal,
        }
    }
    panic!("result did not become terminal within timeout");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn surge_of_requests_never_oversells() {
    let h = harness(5).await;
    spawn_worker(&h);

    let mut handles = Vec::new();
    for user in 1..=200i64 {
        let pipeline = h.pipeline.clone();
        handles.push(tokio::spawn(async move {
            (user, pipeline.do_seckill(UserId::new(user), ITEM).await)
        }));
    }

    let mut queued = Vec::new();
    for handle in handles {
        let (user, outcome) = handle.await.unwrap();
        match outcome {
            Ok(()) => queued.push(UserId::new(user)),
            Err(SeckillError::SoldOut) => {}
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }

    // Drive the system to quiescence: fresh probe users keep hitting the
    // pipeline until the item is definitively sold out.
    let mut probe = 10_000i64;
    loop {
        match h.pipeline.do_seckill(UserId::new(probe), ITEM).await {
            Err(SeckillError::SoldOut) => break,
            Ok(()) => {}
            Err(other) => panic!("unexpected probe outcome: {other:?}"),
        }
        probe += 1;
        assert!(probe < 11_000, "item never reported sold out");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // Every queued request settles: an order or the lost outcome. The
    // durable stock take bounds materialized orders by the seeded stock no
    // matter how many requests were optimistically queued.
    let mut succeeded = 0usize;
    for user in queued {
        match result_eventually(&h.pipeline, user).await {
            SeckillResult::Succeeded(order_id) => {
                assert!(order_id.as_i64() > 0);
                succeeded += 1;
            }
            SeckillResult::SoldOut => {}
            SeckillResult::Pending => unreachable!(),
        }
    }

    assert!(succeeded <= 5, "more successes than stock: {succeeded}");
    assert!(h.orders.len() <= 5, "oversold: {} orders", h.orders.len());
    assert_eq!(h.goods.stock_count(ITEM).await.unwrap(), Some(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn last_unit_admits_exactly_one_of_two_users() {
    let h = harness(1).await;
    spawn_worker(&h);

    let winner = UserId::new(1);
    let loser = UserId::new(2);

    h.pipeline.do_seckill(winner, ITEM).await.unwrap();
    let outcome = result_eventually(&h.pipeline, winner).await;
    assert!(matches!(outcome, SeckillResult::Succeeded(_)));

    // Counter goes negative, reconciliation reads authoritative stock 0.
    let err = h.pipeline.do_seckill(loser, ITEM).await.unwrap_err();
    assert!(matches!(err, SeckillError::SoldOut));

    assert_eq!(
        h.pipeline.result(loser, ITEM).await.unwrap(),
        SeckillResult::SoldOut
    );
    assert_eq!(h.orders.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_purchase_is_rejected() {
    let h = harness(5).await;
    spawn_worker(&h);

    let user = UserId::new(1);
    h.pipeline.do_seckill(user, ITEM).await.unwrap();
    let outcome = result_eventually(&h.pipeline, user).await;
    assert!(matches!(outcome, SeckillResult::Succeeded(_)));

    let err = h.pipeline.do_seckill(user, ITEM).await.unwrap_err();
    assert!(matches!(err, SeckillError::DuplicatePurchase));
    assert_eq!(h.orders.len(), 1);
}

#[tokio::test]
async fn seeding_twice_is_idempotent() {
    let h = harness(5).await;

    // Unchanged authoritative values: a second seed leaves the same state.
    h.pipeline.seed_all().await.unwrap();
    assert_eq!(h.counter.get(ITEM).await.unwrap(), 5);
    assert_eq!(h.pipeline.flags().check(ITEM), Some(false));

    // A reseed is a full reinitialization: it restores a drained counter.
    h.counter.decrement(ITEM).await.unwrap();
    h.counter.decrement(ITEM).await.unwrap();
    h.pipeline.seed_all().await.unwrap();
    assert_eq!(h.counter.get(ITEM).await.unwrap(), 5);
}

#[tokio::test]
async fn unseeded_goods_fail_closed() {
    let h = harness(5).await;
    let unknown = GoodsId::new(999);

    let err = h.pipeline.do_seckill(UserId::new(1), unknown).await.unwrap_err();
    assert!(matches!(err, SeckillError::UnknownGoods(_)));

    let err = h.pipeline.result(UserId::new(1), unknown).await.unwrap_err();
    assert!(matches!(err, SeckillError::UnknownGoods(_)));

    // The rejected request never touched the counter.
    assert_eq!(h.counter.get(unknown).await.unwrap(), 0);
}

#[tokio::test]
async fn sold_out_flag_short_circuits_authoritative_reads() {
    // Zero stock: the first request reconciles once, marks the flag, and
    // everything after is answered from process memory.
    let h = harness(0).await;

    let err = h.pipeline.do_seckill(UserId::new(1), ITEM).await.unwrap_err();
    assert!(matches!(err, SeckillError::SoldOut));
    assert_eq!(h.goods.authoritative_reads(), 1);

    for user in 2..=20i64 {
        let err = h
            .pipeline
            .do_seckill(UserId::new(user), ITEM)
            .await
            .unwrap_err();
        assert!(matches!(err, SeckillError::SoldOut));
    }
    assert_eq!(h.goods.authoritative_reads(), 1);
}

#[tokio::test]
async fn over_rate_requests_are_rejected() {
    let h = harness_with(
        100,
        RateGateConfig {
            permits_per_sec: 1,
            burst: 1,
            admit_timeout: Duration::from_millis(5),
        },
    )
    .await;

    h.pipeline.do_seckill(UserId::new(1), ITEM).await.unwrap();

    // Bucket drained; the next token is ~1s away, far beyond the 5ms wait.
    let err = h.pipeline.do_seckill(UserId::new(2), ITEM).await.unwrap_err();
    assert!(matches!(err, SeckillError::RateLimited));
}

#[tokio::test]
async fn at_or_below_rate_is_never_rejected() {
    let h = harness_with(
        100,
        RateGateConfig {
            permits_per_sec: 1000,
            burst: 20,
            admit_timeout: Duration::from_millis(1000),
        },
    )
    .await;

    for user in 1..=20i64 {
        h.pipeline.do_seckill(UserId::new(user), ITEM).await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_messages_reach_the_consumer() {
    let h = harness(5).await;
    let sub = h.queue.subscribe();

    h.pipeline.do_seckill(UserId::new(7), ITEM).await.unwrap();

    let msg = sub
        .recv_timeout(Duration::from_secs(1))
        .expect("message not published");
    assert_eq!(msg.user_id, UserId::new(7));
    assert_eq!(msg.goods_id, ITEM);
}
