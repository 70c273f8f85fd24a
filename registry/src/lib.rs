use std::sync::Arc;

use adapter::{
    database::ConnectionPool,
    hook::SnapshotInvalidator,
    notification::LogNotificationDispatcher,
    redis::RedisClient,
    repository::{
        audit::AuditRepositoryImpl, circulation::CirculationRepositoryImpl,
        health::HealthCheckRepositoryImpl, reservation::ReservationRepositoryImpl,
    },
};
use kernel::{
    hook::PostCommitHook,
    notification::NotificationDispatcher,
    repository::{
        audit::AuditRepository, circulation::CirculationRepository,
        health::HealthCheckRepository, reservation::ReservationRepository,
    },
};
use shared::config::{AppConfig, CirculationConfig};

// DI コンテナ。ハンドラはこの registry 経由でのみリポジトリに触る。
#[derive(Clone)]
pub struct AppRegistry {
    circulation_repository: Arc<dyn CirculationRepository>,
    reservation_repository: Arc<dyn ReservationRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    health_check_repository: Arc<dyn HealthCheckRepository>,
    notification_dispatcher: Arc<dyn NotificationDispatcher>,
    post_commit_hooks: Arc<Vec<Arc<dyn PostCommitHook>>>,
    circulation_config: CirculationConfig,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, kv: Arc<RedisClient>, config: &AppConfig) -> Self {
        let circulation = config.circulation;
        let circulation_repository = Arc::new(CirculationRepositoryImpl::new(
            pool.clone(),
            kv.clone(),
            circulation.snapshot_ttl_seconds,
            circulation.offer_window_days,
        ));
        let reservation_repository = Arc::new(ReservationRepositoryImpl::new(
            pool.clone(),
            circulation.offer_window_days,
        ));
        let audit_repository = Arc::new(AuditRepositoryImpl::new(pool.clone()));
        let health_check_repository = Arc::new(HealthCheckRepositoryImpl::new(pool, kv.clone()));
        let post_commit_hooks: Vec<Arc<dyn PostCommitHook>> =
            vec![Arc::new(SnapshotInvalidator::new(kv))];
        Self {
            circulation_repository,
            reservation_repository,
            audit_repository,
            health_check_repository,
            notification_dispatcher: Arc::new(LogNotificationDispatcher::new()),
            post_commit_hooks: Arc::new(post_commit_hooks),
            circulation_config: circulation,
        }
    }

    pub fn circulation_repository(&self) -> Arc<dyn CirculationRepository> {
        self.circulation_repository.clone()
    }

    pub fn reservation_repository(&self) -> Arc<dyn ReservationRepository> {
        self.reservation_repository.clone()
    }

    pub fn audit_repository(&self) -> Arc<dyn AuditRepository> {
        self.audit_repository.clone()
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn notification_dispatcher(&self) -> Arc<dyn NotificationDispatcher> {
        self.notification_dispatcher.clone()
    }

    pub fn post_commit_hooks(&self) -> &[Arc<dyn PostCommitHook>] {
        &self.post_commit_hooks
    }

    pub fn circulation_config(&self) -> CirculationConfig {
        self.circulation_config
    }
}
