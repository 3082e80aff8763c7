use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use workq_core::errors::{Result, WorkqError};
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;

/// 进程内内存队列
///
/// 结构与 Redis 驱动保持一致：每个队列一个就绪列表、一个按可见时间
/// 排序的延迟集合和一个 ID 到信封的映射。适用于嵌入式部署和测试，
/// 不跨进程共享。
pub struct MemoryQueue {
    state: Mutex<HashMap<String, QueueState>>,
    default_queue: String,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Entry>,
    delayed: Vec<DelayedEntry>,
    jobs: HashMap<String, String>,
}

struct Entry {
    id: String,
    envelope: String,
}

struct DelayedEntry {
    id: String,
    available_at: DateTime<Utc>,
    envelope: String,
}

impl MemoryQueue {
    pub fn new(default_queue: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            default_queue: default_queue.into(),
        }
    }

    fn queue_name<'a>(&'a self, queue: &'a str) -> &'a str {
        if queue.is_empty() {
            &self.default_queue
        } else {
            queue
        }
    }

    /// 把到期的延迟作业搬到就绪列表
    fn promote_due(state: &mut QueueState, now: DateTime<Utc>) {
        let mut remaining = Vec::with_capacity(state.delayed.len());
        for entry in state.delayed.drain(..) {
            if entry.available_at <= now {
                state.ready.push_back(Entry {
                    id: entry.id,
                    envelope: entry.envelope,
                });
            } else {
                remaining.push(entry);
            }
        }
        state.delayed = remaining;
    }

    async fn store(&self, mut job: Job, available_at: DateTime<Utc>) -> Result<String> {
        if job.id.is_empty() {
            job.id = Uuid::new_v4().to_string();
        }
        job.available_at = available_at;
        job.touch();

        let queue = self.queue_name(&job.queue).to_string();
        let id = job.id.clone();
        let envelope = serde_json::to_string(&job)?;

        let mut state = self.state.lock().await;
        let entry = state.entry(queue).or_default();
        entry.jobs.insert(id.clone(), envelope.clone());
        if available_at <= Utc::now() {
            entry.ready.push_back(Entry { id: id.clone(), envelope });
        } else {
            entry.delayed.push(DelayedEntry {
                id: id.clone(),
                available_at,
                envelope,
            });
            entry.delayed.sort_by_key(|e| e.available_at);
        }

        Ok(id)
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn push(&self, job: Job) -> Result<String> {
        let available_at = if job.delay > Duration::ZERO {
            Utc::now() + chrono::Duration::from_std(job.delay).unwrap_or_else(|_| chrono::Duration::zero())
        } else {
            Utc::now()
        };
        self.store(job, available_at).await
    }

    async fn push_raw(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<String> {
        let job = Job::new(self.queue_name(queue), job_type, payload, options);
        self.push(job).await
    }

    async fn later(&self, job: Job, delay: Duration) -> Result<String> {
        let available_at =
            Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.store(job, available_at).await
    }

    async fn pop(&self, queue: &str) -> Result<Job> {
        let queue = self.queue_name(queue);
        let now = Utc::now();

        let mut state = self.state.lock().await;
        let entry = state
            .get_mut(queue)
            .ok_or(WorkqError::QueueEmpty)?;

        Self::promote_due(entry, now);

        let popped = entry.ready.pop_front().ok_or(WorkqError::QueueEmpty)?;
        let mut job: Job = serde_json::from_str(&popped.envelope)?;
        job.mark_reserved(now);
        Ok(job)
    }

    async fn size(&self, queue: &str) -> Result<i64> {
        let queue = self.queue_name(queue);
        let state = self.state.lock().await;
        Ok(state
            .get(queue)
            .map(|s| (s.ready.len() + s.delayed.len()) as i64)
            .unwrap_or(0))
    }

    async fn delete(&self, queue: &str, job: &Job) -> Result<()> {
        let queue = self.queue_name(queue);
        let mut state = self.state.lock().await;
        if let Some(entry) = state.get_mut(queue) {
            entry.jobs.remove(&job.id);
            // 作业引用可能还留在就绪或延迟结构中，两处都清
            entry.ready.retain(|e| e.id != job.id);
            entry.delayed.retain(|e| e.id != job.id);
        }
        Ok(())
    }

    async fn release(&self, queue: &str, job: &mut Job, delay: Option<Duration>) -> Result<()> {
        job.attempts += 1;

        if job.is_exhausted() {
            warn!(
                "作业 {} 达到最大尝试次数 {}，删除",
                job.id, job.max_attempts
            );
            return self.delete(queue, job).await;
        }

        let next_delay = delay.unwrap_or_else(|| job.retry_delay(job.attempts as usize - 1));
        let available_at = Utc::now()
            + chrono::Duration::from_std(next_delay).unwrap_or_else(|_| chrono::Duration::zero());

        job.clear_reservation();
        job.available_at = available_at;

        let queue = self.queue_name(queue).to_string();
        let envelope = serde_json::to_string(&job)?;

        let mut state = self.state.lock().await;
        let entry = state.entry(queue).or_default();
        entry.jobs.insert(job.id.clone(), envelope.clone());
        entry.delayed.push(DelayedEntry {
            id: job.id.clone(),
            available_at,
            envelope,
        });
        entry.delayed.sort_by_key(|e| e.available_at);

        debug!("作业 {} 释放回队列，{:?} 后可见", job.id, next_delay);
        Ok(())
    }

    async fn clear(&self, queue: &str) -> Result<()> {
        let queue = self.queue_name(queue);
        let mut state = self.state.lock().await;
        state.remove(queue);
        Ok(())
    }
}
