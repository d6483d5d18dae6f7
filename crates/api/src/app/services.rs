use std::sync::Arc;

use flashsale_core::{GoodsId, UserId};
use flashsale_goods::Goods;
use flashsale_infra::{
    goods_store::InMemoryGoodsStore, order_store::InMemoryOrderStore,
    stock_counter::InMemoryStockCounter, worker::OrderWorker,
};
use flashsale_orders::{InMemoryOrderQueue, SeckillResult};
use flashsale_seckill::{RateGateConfig, SeckillError, SeckillPipeline};

#[cfg(feature = "redis")]
use flashsale_infra::{
    goods_store::PostgresGoodsStore, order_queue::RedisStreamsOrderQueue,
    order_store::PostgresOrderStore, stock_counter::RedisStockCounter,
};
#[cfg(feature = "redis")]
use sqlx::PgPool;

// Pipeline wired against in-memory implementations
type InMemoryPipeline = SeckillPipeline<
    Arc<InMemoryStockCounter>,
    Arc<InMemoryGoodsStore>,
    Arc<InMemoryOrderStore>,
    Arc<InMemoryOrderQueue>,
>;

// Pipeline wired against persistent implementations
#[cfg(feature = "redis")]
type PersistentPipeline = SeckillPipeline<
    RedisStockCounter,
    PostgresGoodsStore,
    PostgresOrderStore,
    RedisStreamsOrderQueue,
>;

pub enum AppServices {
    InMemory {
        pipeline: Arc<InMemoryPipeline>,
    },
    #[cfg(feature = "redis")]
    Persistent {
        pipeline: Arc<PersistentPipeline>,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services(Vec::new()).await;
        }
    }

    build_in_memory_services(Vec::new()).await
}

pub async fn build_in_memory_services(goods: Vec<Goods>) -> AppServices {
    build_in_memory_services_with(goods, RateGateConfig::from_env()).await
}

/// In-memory infra wiring (dev/test): stores + queue + pipeline + worker.
pub async fn build_in_memory_services_with(
    goods: Vec<Goods>,
    gate: RateGateConfig,
) -> AppServices {
    if goods.is_empty() {
        tracing::warn!("in-memory goods store is empty; every request will fail closed");
    }

    let counter = Arc::new(InMemoryStockCounter::new());
    let goods_store = Arc::new(InMemoryGoodsStore::with_goods(goods));
    let orders = Arc::new(InMemoryOrderStore::new());
    let queue = Arc::new(InMemoryOrderQueue::new());

    let pipeline = Arc::new(SeckillPipeline::new(
        counter,
        goods_store.clone(),
        orders.clone(),
        queue.clone(),
        gate,
    ));
    pipeline
        .seed_all()
        .await
        .expect("failed to seed stock counters");

    // Background consumer: queue -> order materialization.
    OrderWorker::new(goods_store, orders, pipeline.flags()).spawn(&queue);

    AppServices::InMemory { pipeline }
}

#[cfg(feature = "redis")]
async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let counter = RedisStockCounter::new(&redis_url, None)
        .expect("Failed to create Redis stock counter");
    let goods_store = PostgresGoodsStore::new(pool.clone());
    let orders = PostgresOrderStore::new(pool);
    let queue = RedisStreamsOrderQueue::new(&redis_url, None, None)
        .expect("Failed to create Redis Streams order queue");

    queue
        .ensure_consumer_group("orders.worker")
        .expect("Failed to create consumer group");

    let pipeline = Arc::new(SeckillPipeline::new(
        counter,
        goods_store.clone(),
        orders.clone(),
        queue.clone(),
        RateGateConfig::from_env(),
    ));
    pipeline
        .seed_all()
        .await
        .expect("failed to seed stock counters");

    OrderWorker::new(goods_store, orders, pipeline.flags()).spawn(&queue);

    AppServices::Persistent { pipeline }
}

impl AppServices {
    pub async fn do_seckill(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<(), SeckillError> {
        match self {
            AppServices::InMemory { pipeline } => pipeline.do_seckill(user_id, goods_id).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { pipeline } => pipeline.do_seckill(user_id, goods_id).await,
        }
    }

    pub async fn result(
        &self,
        user_id: UserId,
        goods_id: GoodsId,
    ) -> Result<SeckillResult, SeckillError> {
        match self {
            AppServices::InMemory { pipeline } => pipeline.result(user_id, goods_id).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { pipeline } => pipeline.result(user_id, goods_id).await,
        }
    }
}
