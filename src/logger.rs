use crate::config::LoggingConfig;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

pub const AUDIT_TARGET: &str = "eventrepo::audit";
pub const METRICS_TARGET: &str = "eventrepo::metrics";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

type LogResult = Result<(), Box<dyn std::error::Error>>;

/// `{dir}/{stem}.log`, rolled into `{dir}/{stem}.{n}.log` past 10 MiB.
fn rolling(dir: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

fn build_config(dir: &Path, prefix: &str, level: LevelFilter, keep: u32) -> Result<Config, Box<dyn std::error::Error>> {
    let app = rolling(dir, prefix, keep)?;
    let audit = rolling(dir, &format!("{prefix}_audit"), keep)?;
    let metrics = rolling(dir, &format!("{prefix}_metrics"), keep)?;
    Ok(Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .appender(Appender::builder().build("metrics", Box::new(metrics)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, level))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, level))
        .build(Root::builder().appender("app").build(level))?)
}

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Configures process-wide logging into `dir` (current directory when `None`).
///
/// - level: off|error|warn|info|debug|trace
/// - retention: rolled files kept per log (default 7)
///
/// A second call fails because the global logger can only be installed once.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.map_or(DEFAULT_RETENTION, |n| u32::try_from(n).unwrap_or(u32::MAX));
    let config = build_config(&base, "app", parse_level(level), keep)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from the `[logging]` table; environment variables win.
pub fn init_from_config(cfg: &LoggingConfig) -> LogResult {
    let dir = std::env::var("EVENTREPO_LOG_DIR").ok().map(PathBuf::from).or_else(|| cfg.dir.clone());
    let level = std::env::var("EVENTREPO_LOG_LEVEL").ok().or_else(|| cfg.level.clone());
    let retention = std::env::var("EVENTREPO_LOG_RETENTION")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .or(cfg.retention);
    if let Some(path) = &cfg.query_log {
        crate::telemetry::set_query_log(path.clone(), cfg.slow_query_ms);
    }
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
