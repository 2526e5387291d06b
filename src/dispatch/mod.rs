use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::audit::{AuditAction, AuditRecorder, NewAuditEntry, Severity};
use crate::config::DispatchConfig;

mod notification;
mod queue;
mod retry;
pub mod sinks;

pub use notification::{Delivery, Notification};
pub use queue::{DispatchQueue, PushOutcome};
pub use retry::RetryPolicy;
pub use sinks::{ChatChannelSink, ConsoleSink, Sink, SinkError, SinkKind, StoreSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans notifications out to sinks off the sampling path.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    queue: DispatchQueue,
    sinks: Vec<Arc<dyn Sink>>,
    policy: RetryPolicy,
    recorder: Arc<AuditRecorder>,
    worker: Mutex<Option<JoinHandle<()>>>,
    in_flight: Mutex<Option<Notification>>,
    console_fallbacks: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        config: &DispatchConfig,
        sinks: Vec<Arc<dyn Sink>>,
        recorder: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                queue: DispatchQueue::new(config.queue_capacity),
                sinks,
                policy: RetryPolicy::from_config(config),
                recorder,
                worker: Mutex::new(None),
                in_flight: Mutex::new(None),
                console_fallbacks: AtomicUsize::new(0),
            }),
        }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.inner.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub async fn queued(&self) -> usize {
        self.inner.queue.len().await
    }

    /// Notifications written straight to the console because the queue
    /// could not take or finish them.
    pub fn console_fallbacks(&self) -> usize {
        self.inner.console_fallbacks.load(Ordering::Relaxed)
    }

    fn emit_fallback(&self, notification: &Notification) {
        self.inner.console_fallbacks.fetch_add(1, Ordering::Relaxed);
        ConsoleSink::emit(notification);
    }

    /// Queues a notification for delivery. Returns whether it was queued.
    pub async fn dispatch(&self, notification: Notification) -> bool {
        match self.inner.queue.push(notification).await {
            PushOutcome::Queued => true,
            PushOutcome::DroppedOldest(dropped) => {
                log::warn!(
                    "dispatch_queue_overflow dropped_id={} dropped_action={} capacity={}",
                    dropped.entry().id,
                    dropped.entry().action,
                    self.inner.queue.capacity()
                );
                true
            }
            PushOutcome::Rejected(rejected) => {
                if rejected.is_critical() {
                    log::error!(
                        "dispatch_queue_full_critical_fallback id={} action={}",
                        rejected.entry().id,
                        rejected.entry().action
                    );
                    self.emit_fallback(&rejected);
                } else {
                    log::warn!(
                        "dispatch_queue_full_dropped_incoming id={} action={}",
                        rejected.entry().id,
                        rejected.entry().action
                    );
                }
                false
            }
            PushOutcome::Closed(late) => {
                log::warn!(
                    "dispatch_queue_closed id={} action={} fallback=console",
                    late.entry().id,
                    late.entry().action
                );
                self.emit_fallback(&late);
                false
            }
        }
    }

    /// Starts the single worker draining the queue. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let dispatcher = self.clone();
        *worker = Some(tokio::spawn(async move {
            while let Some(notification) = dispatcher.inner.queue.pop().await {
                *dispatcher.inner.in_flight.lock().await = Some(notification.clone());
                dispatcher.deliver(notification).await;
                *dispatcher.inner.in_flight.lock().await = None;
            }
            log::info!("dispatch_worker_stopped");
        }));
    }

    /// Closes the queue and gives in-flight deliveries `grace` to finish.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.queue.close().await;

        let Some(mut worker) = self.inner.worker.lock().await.take() else {
            return;
        };

        if timeout(grace, &mut worker).await.is_err() {
            worker.abort();
            let mut abandoned = self.inner.queue.drain_remaining().await;
            if let Some(interrupted) = self.inner.in_flight.lock().await.take() {
                abandoned.insert(0, interrupted);
            }
            log::warn!(
                "dispatch_shutdown_grace_elapsed grace_ms={} abandoned={}",
                grace.as_millis(),
                abandoned.len()
            );
            for notification in abandoned.iter().filter(|item| item.is_critical()) {
                self.emit_fallback(notification);
            }
        }
    }

    /// Delivers one notification to every interested sink concurrently.
    pub async fn deliver(&self, notification: Notification) -> DeliveryReport {
        let notification = Arc::new(notification);
        let targets: Vec<Arc<dyn Sink>> = self
            .inner
            .sinks
            .iter()
            .filter(|sink| sink.accepts(&notification))
            .cloned()
            .collect();

        let mut tasks = JoinSet::new();
        for sink in targets {
            let notification = notification.clone();
            let policy = self.inner.policy;
            tasks.spawn(async move {
                let result = policy.deliver(sink.as_ref(), &notification).await;
                (sink, result)
            });
        }

        let mut report = DeliveryReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.delivered += 1,
                Ok((sink, Err((attempts, error)))) => {
                    report.failed += 1;
                    self.report_failure(sink.as_ref(), &notification, attempts, &error)
                        .await;
                }
                Err(error) => {
                    report.failed += 1;
                    log::error!("sink_task_failed error={}", error);
                }
            }
        }

        report
    }

    async fn report_failure(
        &self,
        sink: &dyn Sink,
        notification: &Notification,
        attempts: u32,
        error: &SinkError,
    ) {
        let failed_entry = notification.entry();
        log::error!(
            "sink_delivery_failed sink={} entry_id={} attempts={} error={}",
            sink.name(),
            failed_entry.id,
            attempts,
            error
        );

        // A failure report that itself fails is only logged.
        if failed_entry.action == AuditAction::DispatchFailed {
            return;
        }

        let entry = self
            .inner
            .recorder
            .record(
                NewAuditEntry::new(
                    AuditAction::DispatchFailed,
                    Severity::Error,
                    format!(
                        "delivery of audit entry {} to {} failed after {} attempts",
                        failed_entry.id,
                        sink.name(),
                        attempts
                    ),
                )
                .with_subject(sink.name())
                .with_metadata(json!({
                    "entry_id": failed_entry.id,
                    "action": failed_entry.action.as_str(),
                    "sink": sink.name(),
                    "attempts": attempts,
                    "error": error.to_string(),
                })),
            )
            .await;

        let report = Notification::audit(entry).with_delivery(Delivery::LocalOnly);
        let consoles: Vec<Arc<dyn Sink>> = self
            .inner
            .sinks
            .iter()
            .filter(|sink| sink.kind() == SinkKind::Console)
            .cloned()
            .collect();
        if consoles.is_empty() {
            self.emit_fallback(&report);
            return;
        }
        for console in consoles {
            if let Err(error) = console.notify(&report).await {
                log::error!("dispatch_failed_report_lost sink={} error={}", console.name(), error);
            }
        }
    }
}
