use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub nats_url: String,
    pub port: u16,
    pub likes: LikeConsumerConfig,
    pub shutdown_grace: Duration,
}

/// Settings for the like/unlike partition consumers.
#[derive(Debug, Clone)]
pub struct LikeConsumerConfig {
    /// Partitions per kind subject. Changing it reroutes pairs, so only
    /// change it with the like stream drained.
    pub partitions: u32,
    /// Durable consumer name prefix; instances sharing it share the work.
    pub consumer_group: String,
    /// Deliveries after which a message is dead-lettered.
    pub max_deliveries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    /// Broker redelivers an unacked message after this long.
    pub ack_wait: Duration,
}

impl Default for LikeConsumerConfig {
    fn default() -> Self {
        Self {
            partitions: 3,
            consumer_group: "post-service-likes".to_string(),
            max_deliveries: 10,
            retry_base: Duration::from_millis(200),
            retry_max: Duration::from_secs(30),
            ack_wait: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = LikeConsumerConfig::default();
        let likes = LikeConsumerConfig {
            partitions: parse_or("LIKE_PARTITIONS", defaults.partitions)?,
            consumer_group: env::var("LIKE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            max_deliveries: parse_or("LIKE_MAX_DELIVERIES", defaults.max_deliveries)?,
            retry_base: Duration::from_millis(parse_or("LIKE_RETRY_BASE_MS", 200)?),
            retry_max: Duration::from_millis(parse_or("LIKE_RETRY_MAX_MS", 30_000)?),
            ack_wait: Duration::from_secs(parse_or("LIKE_ACK_WAIT_SECS", 30)?),
        };

        if likes.partitions == 0 {
            anyhow::bail!("LIKE_PARTITIONS must be at least 1");
        }
        if likes.max_deliveries == 0 {
            anyhow::bail!("LIKE_MAX_DELIVERIES must be at least 1");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            port: parse_or("PORT", 3001)?,
            likes,
            shutdown_grace: Duration::from_secs(parse_or("SHUTDOWN_GRACE_SECS", 30)?),
        })
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
