use anyhow::Result;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub circulation: CirculationConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: std::env::var("DATABASE_HOST")?,
            port: std::env::var("DATABASE_PORT")?.parse()?,
            username: std::env::var("DATABASE_USERNAME")?,
            password: std::env::var("DATABASE_PASSWORD")?,
            database: std::env::var("DATABASE_NAME")?,
        };
        let redis = RedisConfig {
            host: std::env::var("REDIS_HOST")?,
            port: std::env::var("REDIS_PORT")?.parse()?,
        };
        let circulation = CirculationConfig::from_env()?;
        Ok(Self {
            database,
            redis,
            circulation,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

// 貸出・予約まわりの運用パラメータ。未設定時は既定値で動かす。
#[derive(Clone, Copy)]
pub struct CirculationConfig {
    // 返却期限までの日数
    pub default_loan_period_days: i64,
    // 予約オファーの有効期間（日数）
    pub offer_window_days: i64,
    // 在庫スナップショットキャッシュの TTL（秒）
    pub snapshot_ttl_seconds: u64,
}

impl CirculationConfig {
    const DEFAULT_LOAN_PERIOD_DAYS: i64 = 30;
    const DEFAULT_OFFER_WINDOW_DAYS: i64 = 7;
    const DEFAULT_SNAPSHOT_TTL_SECONDS: u64 = 300;

    fn from_env() -> Result<Self> {
        Ok(Self {
            default_loan_period_days: env_or("LOAN_PERIOD_DAYS", Self::DEFAULT_LOAN_PERIOD_DAYS)?,
            offer_window_days: env_or("OFFER_WINDOW_DAYS", Self::DEFAULT_OFFER_WINDOW_DAYS)?,
            snapshot_ttl_seconds: env_or("SNAPSHOT_TTL_SECONDS", Self::DEFAULT_SNAPSHOT_TTL_SECONDS)?,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}
