use anyhow::{ Context, Result };
use sqlx::pool::PoolConnection;
use sqlx::postgres::{ PgConnectOptions, PgPool, PgPoolOptions };
use sqlx::Postgres;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::db::error::{ DbError, DbResult, DbResultExt };

/// Driver names accepted in `DATABASE_DRIVER`
pub const SUPPORTED_DRIVERS: [&str; 3] = ["postgres", "postgresql", "org.postgresql.Driver"];

/// Database configuration for the connection pool
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub driver: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accepted for compatibility; the pool grows one connection at a time
    pub acquire_increment: u32,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    /// Zero disables idle reaping
    pub max_idle_time: Duration,
    /// Accepted for compatibility; connections return to the pool on drop
    pub unreturned_connection_timeout: Duration,
    pub connect_timeout: Duration,
}

impl DbConfig {
    /// Config with the given URL and default pool sizing
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            driver: "postgres".to_string(),
            url: url.into(),
            username: None,
            password: None,
            acquire_increment: 1,
            min_pool_size: 1,
            max_pool_size: 5,
            max_idle_time: Duration::from_secs(600),
            unreturned_connection_timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Create a new DbConfig from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self> where F: Fn(&str) -> Option<String> {
        let url = lookup("DATABASE_URL").context("DATABASE_URL environment variable not set")?;
        let defaults = Self::new(url);

        let number = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(raw) =>
                    raw
                        .trim()
                        .parse::<u64>()
                        .with_context(|| format!("Invalid {} value: {}", key, raw)),
                None => Ok(default),
            }
        };
        let small = |key: &str, default: u32| -> Result<u32> {
            let value = number(key, u64::from(default))?;
            u32::try_from(value).with_context(|| format!("{} is out of range: {}", key, value))
        };

        let config = Self {
            driver: lookup("DATABASE_DRIVER").unwrap_or(defaults.driver),
            username: lookup("DATABASE_USERNAME").filter(|s| !s.is_empty()),
            password: lookup("DATABASE_PASSWORD").filter(|s| !s.is_empty()),
            acquire_increment: small("DATABASE_ACQUIRE_INCREMENT", defaults.acquire_increment)?,
            min_pool_size: small("DATABASE_MIN_POOL_SIZE", defaults.min_pool_size)?,
            max_pool_size: small("DATABASE_MAX_POOL_SIZE", defaults.max_pool_size)?,
            max_idle_time: Duration::from_secs(
                number("DATABASE_MAX_IDLE_TIME", defaults.max_idle_time.as_secs())?
            ),
            unreturned_connection_timeout: Duration::from_secs(
                number("DATABASE_UNRETURNED_CONNECTION_TIMEOUT", 0)?
            ),
            connect_timeout: Duration::from_secs(
                number("DATABASE_CONNECT_TIMEOUT", defaults.connect_timeout.as_secs())?
            ),
            url: defaults.url,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject sizing and driver combinations the pool cannot honour
    pub fn validate(&self) -> DbResult<()> {
        if !SUPPORTED_DRIVERS.iter().any(|d| d.eq_ignore_ascii_case(&self.driver)) {
            return Err(DbError::Config(format!("unsupported driver '{}'", self.driver)));
        }
        if self.max_pool_size == 0 {
            return Err(DbError::Config("max_pool_size must be at least 1".to_string()));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(
                DbError::Config(
                    format!(
                        "min_pool_size ({}) exceeds max_pool_size ({})",
                        self.min_pool_size,
                        self.max_pool_size
                    )
                )
            );
        }
        Ok(())
    }

    fn connect_options(&self) -> DbResult<PgConnectOptions> {
        let mut options = PgConnectOptions::from_str(&self.url).map_err(|err|
            DbError::Config(format!("invalid database url: {}", err))
        )?;
        if let Some(username) = &self.username {
            options = options.username(username);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    fn pool_options(&self) -> PgPoolOptions {
        let idle_timeout = if self.max_idle_time.is_zero() { None } else { Some(self.max_idle_time) };

        PgPoolOptions::new()
            .min_connections(self.min_pool_size)
            .max_connections(self.max_pool_size)
            .idle_timeout(idle_timeout)
            .acquire_timeout(self.connect_timeout)
    }
}

/// Connection provider backed by a PostgreSQL pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(config: DbConfig) -> DbResult<Self> {
        config.validate()?;

        if config.acquire_increment != 1 {
            log::warn!(
                "acquire_increment={} ignored: connections are opened one at a time",
                config.acquire_increment
            );
        }
        if !config.unreturned_connection_timeout.is_zero() {
            log::warn!(
                "unreturned_connection_timeout={:?} ignored: connections return to the pool on drop",
                config.unreturned_connection_timeout
            );
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?).await
            .db_context("Failed to connect to database")?;

        // Verify connection by running a simple query
        sqlx::query("SELECT 1").execute(&pool).await.db_context("Failed to execute test query")?;

        log::info!(
            "Connected to database (pool size {}..={})",
            config.min_pool_size,
            config.max_pool_size
        );

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a reference to the inner connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check out one connection; it goes back to the pool when dropped
    pub async fn acquire(&self) -> DbResult<PoolConnection<Postgres>> {
        acquire_from(&self.pool).await
    }

    /// Return a connection to the pool
    pub fn release(&self, conn: PoolConnection<Postgres>) {
        drop(conn);
        log::debug!("Connection released ({} idle)", self.pool.num_idle());
    }

    /// Close every connection and refuse further acquisitions
    pub async fn close(&self) {
        self.pool.close().await;
        log::info!("Database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

pub(crate) async fn acquire_from(pool: &PgPool) -> DbResult<PoolConnection<Postgres>> {
    match pool.acquire().await {
        Ok(conn) => Ok(conn),
        // Acquisition failures are always connection failures, whatever the driver reports
        Err(source) =>
            Err(DbError::Connection {
                context: "Failed to acquire a pooled connection".to_string(),
                source,
            }),
    }
}
