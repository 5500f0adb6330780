//! Publish loop
//!
//! 固定频率运行，直到收到关闭信号。每个 tick：
//! 1. 用同一个时间戳重新广播所有静态坐标变换
//! 2. 依次调用每个 publisher
//!
//! 当前 session 未运行时 tick 为空闲。没有跳帧或背压逻辑，sink 队列满时由
//! sink 自己丢弃。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use contracts::{ContractError, Publication, MAX_TICK_RATE_HZ};
use observability::{LoopStatsAggregator, LoopSummary, TickReport};
use sim_client::SimClient;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::session::SessionSlot;
use crate::sinks::SinkSet;

/// Fixed-rate loop publishing the current session
pub struct PublishLoop<C: SimClient> {
    client: Arc<C>,
    slot: Arc<SessionSlot>,
    sinks: SinkSet,
    period: Duration,
}

impl<C: SimClient> PublishLoop<C> {
    pub fn new(
        client: Arc<C>,
        slot: Arc<SessionSlot>,
        sinks: SinkSet,
        tick_rate_hz: f64,
    ) -> Result<Self> {
        let in_range = tick_rate_hz > 0.0 && tick_rate_hz <= MAX_TICK_RATE_HZ;
        if !in_range {
            return Err(ContractError::config_validation(
                "tick_rate_hz",
                format!("must be in (0, {MAX_TICK_RATE_HZ}], got {tick_rate_hz}"),
            )
            .into());
        }
        Ok(Self {
            client,
            slot,
            sinks,
            period: Duration::from_secs_f64(1.0 / tick_rate_hz),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one tick against the current session
    pub async fn tick(&self) -> TickReport {
        let session = self.slot.current();
        if !session.is_running() {
            return TickReport {
                idle: true,
                ..TickReport::default()
            };
        }

        let started = Instant::now();
        let stamp = Utc::now();
        let mut report = TickReport::default();

        for transform in session.static_transforms() {
            self.emit(Publication::StaticTransform(transform.stamped(stamp)), &mut report);
        }

        for publisher in session.publishers() {
            match publisher.publish(self.client.as_ref(), stamp).await {
                Ok(Some(publication)) => self.emit(publication, &mut report),
                Ok(None) => {}
                Err(e) => {
                    report.publisher_errors += 1;
                    warn!(topic = %publisher.topic(), error = %e, "Publisher failed");
                }
            }
        }

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_secs_f64() * 1000.0;
        report.overrun = elapsed > self.period;
        if report.overrun {
            debug!(duration_ms = report.duration_ms, "Tick overran its period");
        }
        report
    }

    fn emit(&self, publication: Publication, report: &mut TickReport) {
        report.publications.push(publication.kind());
        self.sinks.dispatch(&publication);
    }

    /// Tick until `shutdown` turns true, then drain the sinks
    #[instrument(name = "publish_loop_run", skip_all, fields(period_ms = self.period.as_millis() as u64))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> LoopSummary {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut aggregator = LoopStatsAggregator::new();
        info!(sinks = self.sinks.len(), "Publish loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    observability::record_tick(&report);
                    aggregator.update(&report);
                }
            }
        }

        let summary = aggregator.summary();
        info!(
            ticks = summary.total_ticks,
            active = summary.active_ticks,
            overruns = summary.overruns,
            "Publish loop stopped"
        );
        self.sinks.shutdown().await;
        summary
    }
}
