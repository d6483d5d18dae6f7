//! In-memory goods store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use flashsale_core::GoodsId;
use flashsale_goods::Goods;
use flashsale_seckill::{GoodsStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryGoodsStore {
    goods: RwLock<HashMap<GoodsId, Goods>>,
}

impl InMemoryGoodsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goods(goods: Vec<Goods>) -> Self {
        let store = Self::new();
        {
            let mut map = store.goods.write().unwrap();
            for g in goods {
                map.insert(g.id, g);
            }
        }
        store
    }

    pub fn insert(&self, goods: Goods) {
        self.goods.write().unwrap().insert(goods.id, goods);
    }
}

#[async_trait]
impl GoodsStore for InMemoryGoodsStore {
    async fn list_goods(&self) -> Result<Vec<Goods>, StoreError> {
        let map = self.goods.read().unwrap();
        let mut all: Vec<Goods> = map.values().cloned().collect();
        all.sort_by_key(|g| g.id);
        Ok(all)
    }

    async fn get_goods(&self, goods_id: GoodsId) -> Result<Option<Goods>, StoreError> {
        Ok(self.goods.read().unwrap().get(&goods_id).cloned())
    }

    async fn stock_count(&self, goods_id: GoodsId) -> Result<Option<i64>, StoreError> {
        Ok(self
            .goods
            .read()
            .unwrap()
            .get(&goods_id)
            .map(|g| g.stock_count))
    }

    async fn reduce_stock(&self, goods_id: GoodsId) -> Result<bool, StoreError> {
        let mut map = self.goods.write().unwrap();
        match map.get_mut(&goods_id) {
            Some(g) if g.stock_count > 0 => {
                g.stock_count -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
