use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub query_log_path: Option<PathBuf>,
    pub enable_audit: bool,
    pub current_db: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("EVENTREPO_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(500);
        Self {
            slow_query_ms: slow,
            query_log_path: None,
            enable_audit: false,
            current_db: None,
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub cursor_hops_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub conflicts_total: AtomicU64,
    pub retries_exhausted_total: AtomicU64,
    pub audits_total: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub cursor_hops_total: u64,
    pub writes_total: u64,
    pub conflicts_total: u64,
    pub retries_exhausted_total: u64,
    pub audits_total: u64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_db_name(db: &str) {
    TELEMETRY.cfg.write().current_db = Some(db.to_string());
}
/// Appends one JSON line per content query (and per audited write) to `path`.
pub fn set_query_log(path: PathBuf, slow_query_ms: Option<u64>) {
    let mut w = TELEMETRY.cfg.write();
    w.query_log_path = Some(path);
    if let Some(ms) = slow_query_ms {
        w.slow_query_ms = ms;
    }
}
pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}
pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn write_line(path: &PathBuf, line: &str) {
    if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        use std::io::Write;
        let _ = writeln!(f, "{line}");
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

pub fn record_hop() {
    TELEMETRY.metrics.cursor_hops_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_conflict() {
    TELEMETRY.metrics.conflicts_total.fetch_add(1, Ordering::Relaxed);
}

pub fn record_exhausted() {
    TELEMETRY.metrics.retries_exhausted_total.fetch_add(1, Ordering::Relaxed);
}

/// Records one content query. The filter is logged only as a digest.
pub fn log_query(
    collection: &str,
    filter_dbg: &str,
    duration_ms: u128,
    page_size: Option<usize>,
    page_number: Option<usize>,
) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let cfg = TELEMETRY.cfg.read().clone();
    let slow = u64::try_from(duration_ms).map_or(true, |ms| ms >= cfg.slow_query_ms);
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!(target: crate::logger::METRICS_TARGET, "slow query on {collection}: {duration_ms} ms");
    }
    let Some(path) = cfg.query_log_path.as_ref() else {
        return;
    };
    let filter_hash = sha256_hex(filter_dbg);
    let line = serde_json::json!({
        "ts": now_ts(),
        "db": cfg.current_db.as_deref().unwrap_or("default"),
        "collection": collection,
        "filter_hash": filter_hash,
        "duration_ms": u64::try_from(duration_ms).unwrap_or(u64::MAX),
        "page_size": page_size,
        "page_number": page_number,
        "slow": slow
    })
    .to_string();
    write_line(path, &line);
}

pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    TELEMETRY.metrics.audits_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(),
        "db": TELEMETRY.cfg.read().current_db.clone().unwrap_or_else(|| "default".into()),
        "op": op, "collection": collection, "doc_id": doc_id
    })
    .to_string();
    log::info!(target: crate::logger::AUDIT_TARGET, "{line}");
    let audit_clone = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = audit_clone {
        sink.write().push(line.clone());
    }
    let log_path = TELEMETRY.cfg.read().query_log_path.clone();
    if let Some(path) = log_path.as_ref() {
        write_line(path, &line);
    }
}

#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        queries_total: m.queries_total.load(Ordering::Relaxed),
        queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
        cursor_hops_total: m.cursor_hops_total.load(Ordering::Relaxed),
        writes_total: m.writes_total.load(Ordering::Relaxed),
        conflicts_total: m.conflicts_total.load(Ordering::Relaxed),
        retries_exhausted_total: m.retries_exhausted_total.load(Ordering::Relaxed),
        audits_total: m.audits_total.load(Ordering::Relaxed),
    }
}

#[must_use]
pub fn metrics_text() -> String {
    // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
    let m = snapshot();
    format!(
        "eventrepo_queries_total {}\n\
         eventrepo_queries_slow_total {}\n\
         eventrepo_cursor_hops_total {}\n\
         eventrepo_writes_total {}\n\
         eventrepo_conflicts_total {}\n\
         eventrepo_retries_exhausted_total {}\n\
         eventrepo_audits_total {}\n",
        m.queries_total,
        m.queries_slow_total,
        m.cursor_hops_total,
        m.writes_total,
        m.conflicts_total,
        m.retries_exhausted_total,
        m.audits_total,
    )
}
