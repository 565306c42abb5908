//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration (thin operator-facing API, not the spec's core)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration (distributed message bus + locks)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Orchestrator core configuration (spec.md §6 table)
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub otlp_endpoint: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

/// The core orchestrator settings from spec.md §6's configuration table.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Scheduler tick period. Default 10s.
    #[serde(default = "default_schedule_interval", with = "humantime_serde")]
    pub schedule_interval: Duration,

    /// Global admission cap. Default 100.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Per-DAG default concurrency. Default 16.
    #[serde(default = "default_dag_concurrency")]
    pub default_dag_concurrency: usize,

    /// Cron zone. Default UTC.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Startup catchup. Default true.
    #[serde(default = "default_enable_catchup")]
    pub enable_catchup: bool,

    /// Per-DAG catchup cap. Default 50.
    #[serde(default = "default_max_catchup_runs")]
    pub max_catchup_runs: usize,

    /// Batch backfill concurrency cap. Default 5.
    #[serde(default = "default_backfill_concurrency")]
    pub backfill_concurrency: usize,

    /// LocalExecutor worker count. Default 4.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// LocalExecutor queue depth. Default 100.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Default handler timeout. Default 30m.
    #[serde(default = "default_task_timeout", with = "humantime_serde")]
    pub task_timeout: Duration,

    /// Drain period on shutdown. Default 30s.
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Circuit breaker: consecutive failures before opening. Not in spec's
    /// configuration table but required to parameterize C4; grounded in the
    /// teacher's `circuit_breaker_threshold` field.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Circuit breaker open-state recovery timeout.
    #[serde(default = "default_circuit_breaker_timeout", with = "humantime_serde")]
    pub circuit_breaker_timeout: Duration,

    /// Worker heartbeat TTL (policy, not protocol — spec.md §9).
    #[serde(default = "default_worker_heartbeat_ttl", with = "humantime_serde")]
    pub worker_heartbeat_ttl: Duration,

    /// Whether to use the distributed (message-bus) executor instead of the
    /// in-process LocalExecutor.
    #[serde(default)]
    pub distributed: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            schedule_interval: default_schedule_interval(),
            max_concurrent_runs: default_max_concurrent_runs(),
            default_dag_concurrency: default_dag_concurrency(),
            default_timezone: default_timezone(),
            enable_catchup: default_enable_catchup(),
            max_catchup_runs: default_max_catchup_runs(),
            backfill_concurrency: default_backfill_concurrency(),
            worker_count: default_worker_count(),
            queue_size: default_queue_size(),
            task_timeout: default_task_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout: default_circuit_breaker_timeout(),
            worker_heartbeat_ttl: default_worker_heartbeat_ttl(),
            distributed: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_redis_pool_size() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_schedule_interval() -> Duration {
    Duration::from_secs(10)
}
fn default_max_concurrent_runs() -> usize {
    100
}
fn default_dag_concurrency() -> usize {
    16
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_enable_catchup() -> bool {
    true
}
fn default_max_catchup_runs() -> usize {
    50
}
fn default_backfill_concurrency() -> usize {
    5
}
fn default_worker_count() -> usize {
    4
}
fn default_queue_size() -> usize {
    100
}
fn default_task_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_circuit_breaker_threshold() -> u32 {
    5
}
fn default_circuit_breaker_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_worker_heartbeat_ttl() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    /// Load configuration from environment and config files.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ORKA").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ORKA").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_defaults_match_spec_table() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.schedule_interval, Duration::from_secs(10));
        assert_eq!(cfg.max_concurrent_runs, 100);
        assert_eq!(cfg.default_dag_concurrency, 16);
        assert_eq!(cfg.default_timezone, "UTC");
        assert!(cfg.enable_catchup);
        assert_eq!(cfg.max_catchup_runs, 50);
        assert_eq!(cfg.backfill_concurrency, 5);
        assert_eq!(cfg.worker_count, 4);
        assert_eq!(cfg.queue_size, 100);
        assert_eq!(cfg.task_timeout, Duration::from_secs(30 * 60));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(30));
    }
}
