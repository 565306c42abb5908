//! ConcurrencyManager (C6): admission gates for global, per-DAG, and named
//! pool concurrency, plus an optional distributed backing store.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// A distributed key-value backend for cross-process locks and counters
/// (implemented over Redis for the shipped distributed mode).
#[async_trait]
pub trait DistributedStore: Send + Sync {
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool>;
    async fn release_lock(&self, key: &str) -> Result<()>;
    async fn incr(&self, counter: &str, ttl_on_create: Duration) -> Result<i64>;
    async fn decr(&self, counter: &str) -> Result<i64>;
}

struct LocalState {
    global_count: i64,
    dag_counts: std::collections::HashMap<String, i64>,
    pool_counts: std::collections::HashMap<String, i64>,
}

/// Three admission gates protected by a single read-write lock: all local
/// state lives behind `state`, counters never go below zero.
pub struct ConcurrencyManager {
    max_global: usize,
    default_dag_limit: usize,
    dag_limits: std::collections::HashMap<String, usize>,
    pools: std::collections::HashMap<String, usize>,
    state: RwLock<LocalState>,
    distributed: Option<std::sync::Arc<dyn DistributedStore>>,
    locks_held: DashMap<String, ()>,
}

impl ConcurrencyManager {
    pub fn new(max_global: usize, default_dag_limit: usize, pools: std::collections::HashMap<String, usize>) -> Self {
        Self {
            max_global,
            default_dag_limit,
            dag_limits: std::collections::HashMap::new(),
            pools,
            state: RwLock::new(LocalState { global_count: 0, dag_counts: std::collections::HashMap::new(), pool_counts: std::collections::HashMap::new() }),
            distributed: None,
            locks_held: DashMap::new(),
        }
    }

    pub fn with_dag_limit(mut self, dag_id: impl Into<String>, limit: usize) -> Self {
        self.dag_limits.insert(dag_id.into(), limit);
        self
    }

    pub fn with_distributed_store(mut self, store: std::sync::Arc<dyn DistributedStore>) -> Self {
        self.distributed = Some(store);
        self
    }

    // ---- Global gate ----

    pub fn can_schedule_global(&self) -> bool {
        (self.state.read().global_count as usize) < self.max_global
    }

    pub fn acquire_global(&self) -> Result<()> {
        let mut state = self.state.write();
        if (state.global_count as usize) >= self.max_global {
            return Err(OrchestratorError::new(
                crate::error::ErrorCode::GlobalConcurrencyExceeded,
                "global concurrency limit reached",
            ));
        }
        state.global_count += 1;
        Ok(())
    }

    pub fn release_global(&self) {
        let mut state = self.state.write();
        state.global_count = (state.global_count - 1).max(0);
    }

    // ---- Per-DAG gate ----

    fn dag_limit(&self, dag_id: &str) -> usize {
        self.dag_limits.get(dag_id).copied().unwrap_or(self.default_dag_limit)
    }

    pub fn can_schedule_dag(&self, dag_id: &str) -> bool {
        let state = self.state.read();
        let count = state.dag_counts.get(dag_id).copied().unwrap_or(0) as usize;
        count < self.dag_limit(dag_id)
    }

    pub fn acquire_dag(&self, dag_id: &str) -> Result<()> {
        let limit = self.dag_limit(dag_id);
        let mut state = self.state.write();
        let count = state.dag_counts.entry(dag_id.to_string()).or_insert(0);
        if (*count as usize) >= limit {
            return Err(OrchestratorError::new(
                crate::error::ErrorCode::DagConcurrencyExceeded,
                format!("DAG {dag_id} concurrency limit reached"),
            ));
        }
        *count += 1;
        Ok(())
    }

    pub fn release_dag(&self, dag_id: &str) {
        let mut state = self.state.write();
        if let Some(count) = state.dag_counts.get_mut(dag_id) {
            *count = (*count - 1).max(0);
        }
    }

    // ---- Named pool gate ----

    pub fn can_schedule_pool(&self, pool: &str) -> bool {
        match self.pools.get(pool) {
            None => true, // an undeclared pool is unlimited
            Some(&limit) => {
                let state = self.state.read();
                (state.pool_counts.get(pool).copied().unwrap_or(0) as usize) < limit
            }
        }
    }

    pub fn acquire_pool(&self, pool: &str) -> Result<()> {
        let Some(&limit) = self.pools.get(pool) else {
            return Ok(());
        };
        let mut state = self.state.write();
        let count = state.pool_counts.entry(pool.to_string()).or_insert(0);
        if (*count as usize) >= limit {
            return Err(OrchestratorError::pool_full(pool));
        }
        *count += 1;
        Ok(())
    }

    pub fn release_pool(&self, pool: &str) {
        let mut state = self.state.write();
        if let Some(count) = state.pool_counts.get_mut(pool) {
            *count = (*count - 1).max(0);
        }
    }

    pub fn reset(&self) {
        let mut state = self.state.write();
        state.global_count = 0;
        state.dag_counts.clear();
        state.pool_counts.clear();
    }

    /// Best-effort counter reconstruction on startup, by replaying the count
    /// of currently-`running` task instances read from the database.
    pub fn reconstruct_from_running(&self, running_counts_by_dag: &std::collections::HashMap<String, i64>) {
        let mut state = self.state.write();
        state.global_count = running_counts_by_dag.values().sum();
        state.dag_counts = running_counts_by_dag.clone();
    }

    pub async fn acquire_distributed_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        match &self.distributed {
            Some(store) => {
                let acquired = store.acquire_lock(key, ttl).await?;
                if acquired {
                    self.locks_held.insert(key.to_string(), ());
                }
                Ok(acquired)
            }
            None => Ok(true),
        }
    }

    pub async fn release_distributed_lock(&self, key: &str) -> Result<()> {
        if let Some(store) = &self.distributed {
            store.release_lock(key).await?;
        }
        self.locks_held.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_gate_blocks_at_capacity() {
        let cm = ConcurrencyManager::new(2, 10, Default::default());
        cm.acquire_global().unwrap();
        cm.acquire_global().unwrap();
        assert!(!cm.can_schedule_global());
        assert!(cm.acquire_global().is_err());
        cm.release_global();
        assert!(cm.can_schedule_global());
    }

    #[test]
    fn per_dag_gate_falls_back_to_default_limit() {
        let cm = ConcurrencyManager::new(100, 1, Default::default());
        cm.acquire_dag("a").unwrap();
        assert!(cm.acquire_dag("a").is_err());
        assert!(cm.acquire_dag("b").is_ok());
    }

    #[test]
    fn per_dag_override_limit_is_respected() {
        let cm = ConcurrencyManager::new(100, 1, Default::default()).with_dag_limit("a", 3);
        cm.acquire_dag("a").unwrap();
        cm.acquire_dag("a").unwrap();
        cm.acquire_dag("a").unwrap();
        assert!(cm.acquire_dag("a").is_err());
    }

    #[test]
    fn undeclared_pool_is_unlimited() {
        let cm = ConcurrencyManager::new(100, 10, Default::default());
        for _ in 0..50 {
            cm.acquire_pool("ghost").unwrap();
        }
    }

    #[test]
    fn declared_pool_enforces_its_cap() {
        let mut pools = std::collections::HashMap::new();
        pools.insert("gpu".to_string(), 1);
        let cm = ConcurrencyManager::new(100, 10, pools);
        cm.acquire_pool("gpu").unwrap();
        assert!(cm.acquire_pool("gpu").is_err());
    }

    #[test]
    fn release_never_drives_counters_below_zero() {
        let cm = ConcurrencyManager::new(100, 10, Default::default());
        cm.release_global();
        cm.release_global();
        assert!(cm.can_schedule_global());
    }
}
