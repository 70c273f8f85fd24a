use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;
use kernel::repository::health::HealthCheckRepository;

use crate::{database::ConnectionPool, redis::RedisClient};

#[derive(new)]
pub struct HealthCheckRepositoryImpl {
    db: ConnectionPool,
    kv: Arc<RedisClient>,
}

#[async_trait]
impl HealthCheckRepository for HealthCheckRepositoryImpl {
    async fn check_db(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(self.db.inner_ref())
            .await
            .is_ok()
    }

    async fn check_kv(&self) -> bool {
        self.kv.try_connect().await.is_ok()
    }
}
