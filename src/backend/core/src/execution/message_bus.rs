//! Redis-backed message bus for the distributed executor (spec.md §4.10.3,
//! §6). Grounded in the teacher's `jobs::queue::RedisQueueBackend`
//! (`redis::Client`, a `get_conn` helper returning a multiplexed
//! connection, `redis::cmd(...).query_async`), generalized from
//! `RPUSH`/`BLPOP` to Redis Streams consumer groups (`XADD`/`XREADGROUP`/
//! `XACK`) because `tasks.pending` and `tasks.results` need ack/nak and
//! redelivery, which a plain list cannot express. `workers.heartbeat`
//! keeps the teacher's fire-and-forget feel via plain pub/sub.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, OrchestratorError, Result};

pub const TASKS_PENDING_STREAM: &str = "tasks.pending";
pub const TASKS_RESULTS_STREAM: &str = "tasks.results";
pub const WORKERS_HEARTBEAT_CHANNEL: &str = "workers.heartbeat";

/// Published to `tasks.pending` by the per-run loop (§4.10.1) for a ready task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_instance_id: Uuid,
    pub task_id: String,
    pub dag_run_id: Uuid,
    pub dag_id: String,
    pub task_type: String,
    pub command: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub retries: u32,
}

/// Published to `tasks.results` by a worker once a task attempt finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultMessage {
    pub task_instance_id: Uuid,
    pub worker_id: String,
    pub state: String,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hostname: String,
}

/// Published to `workers.heartbeat` every 10s by a live worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub hostname: String,
    pub active_tasks: usize,
    pub timestamp: DateTime<Utc>,
}

/// A message delivered from a consumer-group stream, carrying the delivery
/// id a caller must pass back to [`MessageBus::ack_task`]/`ack_result` once
/// it has been durably handled.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub id: String,
    pub payload: T,
}

/// The bus contract spec.md §6 names: `tasks.pending` (work queue,
/// ack-required), `tasks.results` (durable stream, ack-required by the
/// executor), `workers.heartbeat` (best-effort pub/sub).
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish_task(&self, message: &TaskMessage) -> Result<()>;
    async fn consume_tasks(&self, consumer_group: &str, consumer_name: &str, block: Duration) -> Result<Vec<Delivery<TaskMessage>>>;
    async fn ack_task(&self, consumer_group: &str, delivery_id: &str) -> Result<()>;
    /// Claims pending `tasks.pending` entries idle for at least `min_idle`
    /// (a crashed worker's ack-wait has elapsed) so another consumer can
    /// retry them — the ack-wait-driven redelivery spec.md §4.10.3 requires.
    async fn reclaim_stale_tasks(&self, consumer_group: &str, consumer_name: &str, min_idle: Duration) -> Result<Vec<Delivery<TaskMessage>>>;

    async fn publish_result(&self, message: &TaskResultMessage) -> Result<()>;
    async fn consume_results(&self, consumer_group: &str, consumer_name: &str, block: Duration) -> Result<Vec<Delivery<TaskResultMessage>>>;
    async fn ack_result(&self, consumer_group: &str, delivery_id: &str) -> Result<()>;

    async fn publish_heartbeat(&self, heartbeat: &WorkerHeartbeat) -> Result<()>;
    /// Subscribes to `workers.heartbeat`; the returned receiver yields one
    /// item per published heartbeat until the bus drops the subscription.
    async fn subscribe_heartbeats(&self) -> Result<mpsc::Receiver<WorkerHeartbeat>>;
}

/// Practical bound standing in for the 24h retention cap spec.md §6 asks
/// for on `tasks.pending`: Redis Streams trim on approximate length rather
/// than wall-clock age, so this is sized generously for a busy orchestrator
/// rather than computed from a time window.
const PENDING_STREAM_MAXLEN: usize = 200_000;
const RESULTS_STREAM_MAXLEN: usize = 200_000;

pub struct RedisMessageBus {
    client: redis::Client,
}

impl RedisMessageBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::MessageBusUnavailable, "failed to connect to message bus", e.to_string()))
    }

    /// Idempotently creates a consumer group at the stream's tail, creating
    /// the stream itself if absent. A `BUSYGROUP` reply means the group
    /// already exists, which is the expected steady-state case.
    async fn ensure_group(&self, conn: &mut redis::aio::MultiplexedConnection, stream: &str, group: &str) -> Result<()> {
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(OrchestratorError::with_internal(ErrorCode::MessageBusUnavailable, "failed to create consumer group", e.to_string())),
        }
    }

    async fn publish_to_stream<T: Serialize>(&self, stream: &str, maxlen: usize, payload: &T) -> Result<()> {
        let serialized = serde_json::to_string(payload)?;
        let mut conn = self.get_conn().await?;
        redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(maxlen)
            .arg("*")
            .arg("payload")
            .arg(&serialized)
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::PublishFailed, format!("failed to publish to {stream}"), e.to_string()))?;
        Ok(())
    }

    async fn consume_from_stream<T: for<'de> Deserialize<'de>>(
        &self,
        stream: &str,
        consumer_group: &str,
        consumer_name: &str,
        block: Duration,
    ) -> Result<Vec<Delivery<T>>> {
        let mut conn = self.get_conn().await?;
        self.ensure_group(&mut conn, stream, consumer_group).await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(16_usize)
            .arg("BLOCK")
            .arg(block.as_millis() as usize)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::SubscribeFailed, format!("failed to read from {stream}"), e.to_string()))?;

        let mut deliveries = Vec::new();
        for key in reply.keys {
            for stream_id in key.ids {
                let Some(raw) = stream_id.map.get("payload") else {
                    warn!(stream, id = %stream_id.id, "stream entry missing payload field, skipping");
                    continue;
                };
                let raw = match raw {
                    redis::Value::Data(bytes) => bytes.clone(),
                    other => {
                        warn!(stream, id = %stream_id.id, ?other, "unexpected payload value type, skipping");
                        continue;
                    }
                };
                match serde_json::from_slice::<T>(&raw) {
                    Ok(payload) => deliveries.push(Delivery { id: stream_id.id, payload }),
                    Err(e) => warn!(stream, id = %stream_id.id, error = %e, "failed to deserialize stream entry, skipping"),
                }
            }
        }
        debug!(stream, count = deliveries.len(), "consumed deliveries");
        Ok(deliveries)
    }

    async fn ack(&self, stream: &str, consumer_group: &str, delivery_id: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("XACK")
            .arg(stream)
            .arg(consumer_group)
            .arg(delivery_id)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::MessageBusUnavailable, format!("failed to ack {stream} delivery {delivery_id}"), e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish_task(&self, message: &TaskMessage) -> Result<()> {
        self.publish_to_stream(TASKS_PENDING_STREAM, PENDING_STREAM_MAXLEN, message).await
    }

    async fn consume_tasks(&self, consumer_group: &str, consumer_name: &str, block: Duration) -> Result<Vec<Delivery<TaskMessage>>> {
        self.consume_from_stream(TASKS_PENDING_STREAM, consumer_group, consumer_name, block).await
    }

    async fn ack_task(&self, consumer_group: &str, delivery_id: &str) -> Result<()> {
        self.ack(TASKS_PENDING_STREAM, consumer_group, delivery_id).await
    }

    async fn reclaim_stale_tasks(&self, consumer_group: &str, consumer_name: &str, min_idle: Duration) -> Result<Vec<Delivery<TaskMessage>>> {
        let mut conn = self.get_conn().await?;
        self.ensure_group(&mut conn, TASKS_PENDING_STREAM, consumer_group).await?;

        // XAUTOCLAIM key group consumer min-idle-time start: "0" claims from
        // the beginning of the pending-entries list each sweep, which is
        // fine since a PEL is typically small relative to 24h of traffic.
        let reply: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(TASKS_PENDING_STREAM)
            .arg(consumer_group)
            .arg(consumer_name)
            .arg(min_idle.as_millis() as usize)
            .arg("0")
            .query_async(&mut conn)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::MessageBusUnavailable, "failed to reclaim stale tasks.pending entries", e.to_string()))?;

        let mut deliveries = Vec::new();
        for stream_id in reply.claimed {
            let Some(raw) = stream_id.map.get("payload") else { continue };
            let raw = match raw {
                redis::Value::Data(bytes) => bytes.clone(),
                _ => continue,
            };
            match serde_json::from_slice::<TaskMessage>(&raw) {
                Ok(payload) => deliveries.push(Delivery { id: stream_id.id, payload }),
                Err(e) => warn!(id = %stream_id.id, error = %e, "failed to deserialize reclaimed stream entry, skipping"),
            }
        }
        Ok(deliveries)
    }

    async fn publish_result(&self, message: &TaskResultMessage) -> Result<()> {
        self.publish_to_stream(TASKS_RESULTS_STREAM, RESULTS_STREAM_MAXLEN, message).await
    }

    async fn consume_results(&self, consumer_group: &str, consumer_name: &str, block: Duration) -> Result<Vec<Delivery<TaskResultMessage>>> {
        self.consume_from_stream(TASKS_RESULTS_STREAM, consumer_group, consumer_name, block).await
    }

    async fn ack_result(&self, consumer_group: &str, delivery_id: &str) -> Result<()> {
        self.ack(TASKS_RESULTS_STREAM, consumer_group, delivery_id).await
    }

    async fn publish_heartbeat(&self, heartbeat: &WorkerHeartbeat) -> Result<()> {
        let serialized = serde_json::to_string(heartbeat)?;
        let mut conn = self.get_conn().await?;
        redis::cmd("PUBLISH")
            .arg(WORKERS_HEARTBEAT_CHANNEL)
            .arg(&serialized)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::PublishFailed, "failed to publish heartbeat", e.to_string()))?;
        Ok(())
    }

    async fn subscribe_heartbeats(&self) -> Result<mpsc::Receiver<WorkerHeartbeat>> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::SubscribeFailed, "failed to open heartbeat subscription", e.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(WORKERS_HEARTBEAT_CHANNEL)
            .await
            .map_err(|e| OrchestratorError::with_internal(ErrorCode::SubscribeFailed, "failed to subscribe to heartbeat channel", e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: Vec<u8> = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "failed to read heartbeat payload");
                        continue;
                    }
                };
                match serde_json::from_slice::<WorkerHeartbeat>(&payload) {
                    Ok(heartbeat) => {
                        if tx.send(heartbeat).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to deserialize heartbeat"),
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_message_round_trips_through_json() {
        let msg = TaskMessage {
            task_instance_id: Uuid::new_v4(),
            task_id: "t1".to_string(),
            dag_run_id: Uuid::new_v4(),
            dag_id: "d1".to_string(),
            task_type: "bash".to_string(),
            command: "echo hi".to_string(),
            timeout: Duration::from_secs(30),
            retries: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: TaskMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, "t1");
        assert_eq!(back.timeout, Duration::from_secs(30));
    }

    #[test]
    fn worker_heartbeat_round_trips_through_json() {
        let hb = WorkerHeartbeat { worker_id: "w1".to_string(), hostname: "host-1".to_string(), active_tasks: 3, timestamp: Utc::now() };
        let json = serde_json::to_string(&hb).unwrap();
        let back: WorkerHeartbeat = serde_json::from_str(&json).unwrap();
        assert_eq!(back.worker_id, "w1");
        assert_eq!(back.active_tasks, 3);
    }
}
