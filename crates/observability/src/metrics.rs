//! Bridge 指标收集模块
//!
//! 发布循环、step action 和服务端点的运行指标，以及发布循环的内存聚合统计。

use std::collections::HashMap;

use contracts::PublicationKind;
use metrics::{counter, gauge, histogram};

/// 单个 tick 的结果
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// tick 耗时 (毫秒)
    pub duration_ms: f64,
    /// 耗时超过 tick 周期
    pub overrun: bool,
    /// 场景未运行，tick 被跳过
    pub idle: bool,
    /// 本次 tick 发布的消息
    pub publications: Vec<PublicationKind>,
    /// publisher 失败次数
    pub publisher_errors: u64,
}

/// 记录一次 tick
pub fn record_tick(report: &TickReport) {
    counter!("sim_bridge_ticks_total").increment(1);

    if report.idle {
        counter!("sim_bridge_ticks_idle_total").increment(1);
        return;
    }

    histogram!("sim_bridge_tick_duration_ms").record(report.duration_ms);
    if report.overrun {
        counter!("sim_bridge_tick_overruns_total").increment(1);
    }
    for kind in &report.publications {
        record_publication(*kind);
    }
    if report.publisher_errors > 0 {
        counter!("sim_bridge_publisher_errors_total").increment(report.publisher_errors);
    }
}

/// 记录一条发布
pub fn record_publication(kind: PublicationKind) {
    counter!(
        "sim_bridge_publications_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// 记录 step action 的一个 chunk
pub fn record_step_chunk(steps: u32) {
    counter!("sim_bridge_step_chunks_total").increment(1);
    counter!("sim_bridge_steps_total").increment(u64::from(steps));
}

/// 记录服务调用
///
/// status: "ok" / "failed" (success=false) / "error" (错误回复)
pub fn record_service_call(service: &'static str, status: &'static str) {
    counter!(
        "sim_bridge_service_calls_total",
        "service" => service,
        "status" => status
    )
    .increment(1);
}

/// 当前 session 的 publisher 数量
pub fn set_active_publishers(count: usize) {
    gauge!("sim_bridge_active_publishers").set(count as f64);
}

/// 记录 sink 写入
pub fn record_sink_write(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "sim_bridge_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 发布循环聚合器
///
/// 在内存中聚合 tick 统计，关闭时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct LoopStatsAggregator {
    /// 总 tick 数
    pub total_ticks: u64,

    /// 场景未运行的 tick 数
    pub idle_ticks: u64,

    /// 超时 tick 数
    pub overruns: u64,

    /// publisher 失败总数
    pub publisher_errors: u64,

    /// tick 耗时统计
    pub tick_stats: RunningStats,

    /// 各类发布计数
    pub publication_counts: HashMap<&'static str, u64>,
}

impl LoopStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &TickReport) {
        self.total_ticks += 1;
        if report.idle {
            self.idle_ticks += 1;
            return;
        }

        if report.overrun {
            self.overruns += 1;
        }
        self.publisher_errors += report.publisher_errors;
        self.tick_stats.push(report.duration_ms);
        for kind in &report.publications {
            *self.publication_counts.entry(kind.as_str()).or_insert(0) += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> LoopSummary {
        let active = self.total_ticks - self.idle_ticks;
        LoopSummary {
            total_ticks: self.total_ticks,
            active_ticks: active,
            overruns: self.overruns,
            overrun_rate: if active > 0 {
                self.overruns as f64 / active as f64 * 100.0
            } else {
                0.0
            },
            publisher_errors: self.publisher_errors,
            tick_duration_ms: StatsSummary::from(&self.tick_stats),
            publication_counts: self.publication_counts.clone(),
        }
    }
}

/// 发布循环摘要
#[derive(Debug, Clone, Default)]
pub struct LoopSummary {
    pub total_ticks: u64,
    pub active_ticks: u64,
    pub overruns: u64,
    pub overrun_rate: f64,
    pub publisher_errors: u64,
    pub tick_duration_ms: StatsSummary,
    pub publication_counts: HashMap<&'static str, u64>,
}

impl std::fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Publish Loop Summary ===")?;
        writeln!(
            f,
            "Ticks: {} ({} active)",
            self.total_ticks, self.active_ticks
        )?;
        writeln!(
            f,
            "Overruns: {} ({:.2}%)",
            self.overruns, self.overrun_rate
        )?;
        writeln!(f, "Publisher errors: {}", self.publisher_errors)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;

        if !self.publication_counts.is_empty() {
            let mut kinds: Vec<_> = self.publication_counts.iter().collect();
            kinds.sort();
            writeln!(f, "Publications:")?;
            for (kind, count) in kinds {
                writeln!(f, "  {kind}: {count}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
