//! Metrics Collector (spec §4.6): per-tool execution history, cache
//! hit/miss accounting, system-wide rollups, time-bucketed trends, and
//! multi-format export.
//!
//! Supersedes the teacher's `monitoring.rs`; unlike that module this one
//! is not feature-gated, since `tracing` and friends are now hard
//! dependencies rather than opt-in extras.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One completed execution, as fed to [`MetricsCollector::record_execution`]
/// (spec §4.6 "recordExecution(exec)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_id: String,
    pub success: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub error_kind: Option<String>,
}

#[derive(Default)]
struct CacheCounters {
    hits: u64,
    misses: u64,
    time_saved_ms: u64,
}

/// Bucketing granularity for [`MetricsCollector::get_performance_trends`]
/// (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendInterval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TrendInterval {
    fn duration(self) -> chrono::Duration {
        match self {
            TrendInterval::Minute => chrono::Duration::minutes(1),
            TrendInterval::Hour => chrono::Duration::hours(1),
            TrendInterval::Day => chrono::Duration::days(1),
            TrendInterval::Week => chrono::Duration::weeks(1),
            TrendInterval::Month => chrono::Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Prometheus,
    OpenTelemetry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetricsReport {
    pub tool_id: String,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub success_rate: f64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
    pub cache_hit_rate: f64,
    pub average_time_saved_ms: f64,
    pub error_distribution: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetricsReport {
    pub total_executions: u64,
    pub unique_tools: usize,
    pub unique_users: usize,
    pub most_used: Vec<(String, u64)>,
    pub slowest: Vec<(String, u64)>,
    pub least_reliable: Vec<(String, f64)>,
    /// Hour-of-day (0-23) -> execution count, across the whole retained
    /// history (or the requested time range).
    pub peak_usage_histogram: HashMap<u32, u64>,
    pub overall_cache_hit_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBucket {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
    pub average_duration_ms: f64,
    pub success_rate: f64,
}

const TOP_K: usize = 10;

/// Bounded per-tool history plus cache accounting (spec §4.6). Each
/// tool's ring buffer holds at most `max_metrics_per_tool` records —
/// the oldest is evicted on overflow, same as the execution cache's own
/// eviction story but scoped to raw history rather than cached results.
pub struct MetricsCollector {
    max_metrics_per_tool: usize,
    records: DashMap<String, Mutex<VecDeque<ExecutionRecord>>>,
    cache_counters: DashMap<String, Mutex<CacheCounters>>,
}

impl MetricsCollector {
    pub fn new(max_metrics_per_tool: usize) -> Self {
        Self {
            max_metrics_per_tool,
            records: DashMap::new(),
            cache_counters: DashMap::new(),
        }
    }

    pub fn record_execution(&self, record: ExecutionRecord) {
        let entry = self.records.entry(record.tool_id.clone()).or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut buf = entry.lock();
        if buf.len() >= self.max_metrics_per_tool {
            buf.pop_front();
        }
        buf.push_back(record);
    }

    pub fn record_cache_hit(&self, tool_id: &str, time_saved_ms: u64) {
        let entry = self.cache_counters.entry(tool_id.to_string()).or_insert_with(|| Mutex::new(CacheCounters::default()));
        let mut counters = entry.lock();
        counters.hits += 1;
        counters.time_saved_ms += time_saved_ms;
    }

    pub fn record_cache_miss(&self, tool_id: &str) {
        let entry = self.cache_counters.entry(tool_id.to_string()).or_insert_with(|| Mutex::new(CacheCounters::default()));
        entry.lock().misses += 1;
    }

    fn records_in_range(&self, tool_id: &str, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Vec<ExecutionRecord> {
        self.records
            .get(tool_id)
            .map(|buf| {
                buf.lock()
                    .iter()
                    .filter(|r| range.map(|(start, end)| r.timestamp >= start && r.timestamp <= end).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_tool_metrics(&self, tool_id: &str, time_range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Option<ToolMetricsReport> {
        let records = self.records_in_range(tool_id, time_range);
        if records.is_empty() {
            return None;
        }

        let total = records.len() as u64;
        let successful = records.iter().filter(|r| r.success).count() as u64;
        let failed = total - successful;

        let mut durations_ms: Vec<u64> = records.iter().map(|r| r.duration.as_millis() as u64).collect();
        durations_ms.sort_unstable();

        let mut error_distribution: HashMap<String, u64> = HashMap::new();
        for record in &records {
            if let Some(kind) = &record.error_kind {
                *error_distribution.entry(kind.clone()).or_insert(0) += 1;
            }
        }

        let (hit_rate, avg_saved) = self
            .cache_counters
            .get(tool_id)
            .map(|c| {
                let c = c.lock();
                let total_lookups = c.hits + c.misses;
                let rate = if total_lookups == 0 { 0.0 } else { c.hits as f64 / total_lookups as f64 };
                let avg = if c.hits == 0 { 0.0 } else { c.time_saved_ms as f64 / c.hits as f64 };
                (rate, avg)
            })
            .unwrap_or((0.0, 0.0));

        Some(ToolMetricsReport {
            tool_id: tool_id.to_string(),
            total_executions: total,
            successful_executions: successful,
            failed_executions: failed,
            success_rate: successful as f64 / total as f64,
            p50_ms: percentile(&durations_ms, 0.50),
            p90_ms: percentile(&durations_ms, 0.90),
            p99_ms: percentile(&durations_ms, 0.99),
            cache_hit_rate: hit_rate,
            average_time_saved_ms: avg_saved,
            error_distribution,
        })
    }

    pub fn get_system_metrics(&self, time_range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> SystemMetricsReport {
        let mut all_records: Vec<ExecutionRecord> = Vec::new();
        for tool_id in self.records.iter().map(|e| e.key().clone()).collect::<Vec<_>>() {
            all_records.extend(self.records_in_range(&tool_id, time_range));
        }

        let total_executions = all_records.len() as u64;
        let unique_tools = self.records.len();
        let unique_users: std::collections::HashSet<&str> =
            all_records.iter().filter_map(|r| r.user_id.as_deref()).collect();

        let mut per_tool_counts: HashMap<String, u64> = HashMap::new();
        let mut per_tool_durations: HashMap<String, Vec<u64>> = HashMap::new();
        let mut per_tool_failures: HashMap<String, (u64, u64)> = HashMap::new();
        let mut histogram: HashMap<u32, u64> = HashMap::new();

        for record in &all_records {
            *per_tool_counts.entry(record.tool_id.clone()).or_insert(0) += 1;
            per_tool_durations
                .entry(record.tool_id.clone())
                .or_default()
                .push(record.duration.as_millis() as u64);
            let entry = per_tool_failures.entry(record.tool_id.clone()).or_insert((0, 0));
            entry.0 += 1;
            if !record.success {
                entry.1 += 1;
            }
            *histogram.entry(record.timestamp.hour()).or_insert(0) += 1;
        }

        let mut most_used: Vec<(String, u64)> = per_tool_counts.into_iter().collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_used.truncate(TOP_K);

        let mut slowest: Vec<(String, u64)> = per_tool_durations
            .iter()
            .map(|(tool, durations)| {
                let avg = durations.iter().sum::<u64>() / durations.len().max(1) as u64;
                (tool.clone(), avg)
            })
            .collect();
        slowest.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        slowest.truncate(TOP_K);

        let mut least_reliable: Vec<(String, f64)> = per_tool_failures
            .iter()
            .map(|(tool, (total, failed))| (tool.clone(), *failed as f64 / *total as f64))
            .collect();
        least_reliable.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        least_reliable.truncate(TOP_K);

        let (total_hits, total_lookups) = self
            .cache_counters
            .iter()
            .fold((0u64, 0u64), |(hits, lookups), entry| {
                let c = entry.value().lock();
                (hits + c.hits, lookups + c.hits + c.misses)
            });
        let overall_cache_hit_rate = if total_lookups == 0 { 0.0 } else { total_hits as f64 / total_lookups as f64 };

        SystemMetricsReport {
            total_executions,
            unique_tools,
            unique_users: unique_users.len(),
            most_used,
            slowest,
            least_reliable,
            peak_usage_histogram: histogram,
            overall_cache_hit_rate,
        }
    }

    pub fn get_performance_trends(
        &self,
        tool_id: Option<&str>,
        interval: TrendInterval,
        range: (DateTime<Utc>, DateTime<Utc>),
    ) -> Vec<TrendBucket> {
        let records: Vec<ExecutionRecord> = match tool_id {
            Some(id) => self.records_in_range(id, Some(range)),
            None => self
                .records
                .iter()
                .map(|e| e.key().clone())
                .collect::<Vec<_>>()
                .into_iter()
                .flat_map(|id| self.records_in_range(&id, Some(range)))
                .collect(),
        };

        let step = interval.duration();
        let mut buckets: Vec<TrendBucket> = Vec::new();
        let mut cursor = range.0;
        while cursor < range.1 {
            let bucket_end = cursor + step;
            let bucket_records: Vec<&ExecutionRecord> = records
                .iter()
                .filter(|r| r.timestamp >= cursor && r.timestamp < bucket_end)
                .collect();

            let count = bucket_records.len() as u64;
            let average_duration_ms = if count == 0 {
                0.0
            } else {
                bucket_records.iter().map(|r| r.duration.as_millis() as f64).sum::<f64>() / count as f64
            };
            let success_rate = if count == 0 {
                0.0
            } else {
                bucket_records.iter().filter(|r| r.success).count() as f64 / count as f64
            };

            buckets.push(TrendBucket {
                bucket_start: cursor,
                count,
                average_duration_ms,
                success_rate,
            });
            cursor = bucket_end;
        }

        buckets
    }

    pub fn export_metrics(&self, format: ExportFormat, time_range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> String {
        let system = self.get_system_metrics(time_range);
        let tool_reports: Vec<ToolMetricsReport> = self
            .records
            .iter()
            .map(|e| e.key().clone())
            .filter_map(|tool_id| self.get_tool_metrics(&tool_id, time_range))
            .collect();

        match format {
            ExportFormat::Json => serde_json::json!({
                "system": system,
                "tools": tool_reports,
            })
            .to_string(),
            ExportFormat::Csv => {
                let mut out = String::from("tool_id,total,successful,failed,p50_ms,p90_ms,p99_ms,cache_hit_rate\n");
                for report in &tool_reports {
                    out.push_str(&format!(
                        "{},{},{},{},{},{},{},{:.4}\n",
                        report.tool_id,
                        report.total_executions,
                        report.successful_executions,
                        report.failed_executions,
                        report.p50_ms,
                        report.p90_ms,
                        report.p99_ms,
                        report.cache_hit_rate
                    ));
                }
                out
            }
            ExportFormat::Prometheus => {
                let mut out = String::new();
                out.push_str("# HELP toolforge_tool_executions_total Total executions per tool\n");
                out.push_str("# TYPE toolforge_tool_executions_total counter\n");
                for report in &tool_reports {
                    out.push_str(&format!(
                        "toolforge_tool_executions_total{{tool_id=\"{}\"}} {}\n",
                        report.tool_id, report.total_executions
                    ));
                }
                out.push_str("# HELP toolforge_tool_duration_p99_ms p99 execution duration in milliseconds\n");
                out.push_str("# TYPE toolforge_tool_duration_p99_ms gauge\n");
                for report in &tool_reports {
                    out.push_str(&format!(
                        "toolforge_tool_duration_p99_ms{{tool_id=\"{}\"}} {}\n",
                        report.tool_id, report.p99_ms
                    ));
                }
                out
            }
            ExportFormat::OpenTelemetry => serde_json::json!({
                "resourceMetrics": [{
                    "scopeMetrics": [{
                        "scope": { "name": "toolforge.metrics" },
                        "metrics": tool_reports.iter().map(|r| serde_json::json!({
                            "name": "tool.executions.total",
                            "attributes": [{"key": "tool_id", "value": r.tool_id}],
                            "value": r.total_executions,
                        })).collect::<Vec<_>>(),
                    }],
                }],
            })
            .to_string(),
        }
    }

    /// Drops history older than `older_than` from every tool's ring
    /// buffer, returning how many records were removed (spec §4.6
    /// "clearOldMetrics(olderThan) -> int").
    pub fn clear_old_metrics(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut removed = 0usize;
        for entry in self.records.iter() {
            let mut buf = entry.value().lock();
            let before = buf.len();
            buf.retain(|r| r.timestamp >= cutoff);
            removed += before - buf.len();
        }
        removed
    }
}

fn percentile(sorted_ms: &[u64], p: f64) -> u64 {
    if sorted_ms.is_empty() {
        return 0;
    }
    let rank = (p * (sorted_ms.len() as f64 - 1.0)).round() as usize;
    sorted_ms[rank.min(sorted_ms.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tool: &str, ms: u64, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            tool_id: tool.to_string(),
            success,
            duration: Duration::from_millis(ms),
            timestamp: Utc::now(),
            user_id: Some("u1".to_string()),
            error_kind: if success { None } else { Some("ExecutionFailed".to_string()) },
        }
    }

    #[test]
    fn computes_exact_percentiles() {
        let collector = MetricsCollector::new(1000);
        for ms in [10, 20, 30, 40, 50] {
            collector.record_execution(record("t", ms, true));
        }
        let report = collector.get_tool_metrics("t", None).unwrap();
        assert_eq!(report.p50_ms, 30);
        assert_eq!(report.total_executions, 5);
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let collector = MetricsCollector::new(3);
        for i in 0..5u64 {
            collector.record_execution(record("t", i, true));
        }
        let report = collector.get_tool_metrics("t", None).unwrap();
        assert_eq!(report.total_executions, 3);
    }

    #[test]
    fn cache_hit_rate_tracks_hits_and_misses() {
        let collector = MetricsCollector::new(100);
        collector.record_cache_hit("t", 5);
        collector.record_cache_hit("t", 15);
        collector.record_cache_miss("t");
        collector.record_execution(record("t", 1, true));
        let report = collector.get_tool_metrics("t", None).unwrap();
        assert!((report.cache_hit_rate - (2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(report.average_time_saved_ms, 10.0);
    }

    #[test]
    fn clear_old_metrics_drops_stale_records() {
        let collector = MetricsCollector::new(100);
        collector.record_execution(ExecutionRecord {
            tool_id: "t".to_string(),
            success: true,
            duration: Duration::from_millis(1),
            timestamp: Utc::now() - chrono::Duration::days(2),
            user_id: None,
            error_kind: None,
        });
        collector.record_execution(record("t", 1, true));
        let removed = collector.clear_old_metrics(Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert_eq!(collector.get_tool_metrics("t", None).unwrap().total_executions, 1);
    }

    #[test]
    fn export_formats_are_well_formed() {
        let collector = MetricsCollector::new(100);
        collector.record_execution(record("t", 5, true));
        assert!(collector.export_metrics(ExportFormat::Json, None).contains("\"tools\""));
        assert!(collector.export_metrics(ExportFormat::Csv, None).starts_with("tool_id,"));
        assert!(collector.export_metrics(ExportFormat::Prometheus, None).contains("toolforge_tool_executions_total"));
        assert!(collector.export_metrics(ExportFormat::OpenTelemetry, None).contains("resourceMetrics"));
    }
}
