//! Coordinating loop: poll on one interval, report on another, stop on
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use metrix_core::MetricStore;

use crate::sampler::Sampler;
use crate::transmitter::{updates_from_snapshot, ReportSummary, Transmitter};

pub struct Agent {
    store: Arc<MetricStore>,
    sampler: Sampler,
    transmitter: Transmitter,
    poll_interval: Duration,
    report_interval: Duration,
}

impl Agent {
    pub fn new(
        store: Arc<MetricStore>,
        sampler: Sampler,
        transmitter: Transmitter,
        poll_interval: Duration,
        report_interval: Duration,
    ) -> Self {
        Self {
            store,
            sampler,
            transmitter,
            poll_interval,
            report_interval,
        }
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Send the current store contents once.
    pub async fn report(&self, cancel: &CancellationToken) -> ReportSummary {
        let updates = updates_from_snapshot(&self.store.snapshot());
        if updates.is_empty() {
            return ReportSummary::default();
        }
        let outcomes = self.transmitter.transmit(updates, cancel).await;
        let summary = ReportSummary::from_outcomes(&outcomes);
        tracing::info!(sent = summary.sent, failed = summary.failed, "report cycle done");
        summary
    }

    /// Run until `cancel` fires. In-flight sends observe the same token.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = tokio::time::interval(self.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Nothing to report before the first poll.
        report.tick().await;

        tracing::info!(
            poll_secs = self.poll_interval.as_secs(),
            report_secs = self.report_interval.as_secs(),
            "agent running"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = poll.tick() => {
                    if let Err(e) = self.sampler.sample(&self.store) {
                        tracing::warn!(error = %e, "sample failed");
                    }
                }
                _ = report.tick() => {
                    self.report(&cancel).await;
                }
            }
        }
        tracing::info!("agent stopped");
    }
}
