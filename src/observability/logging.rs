use env_logger::Env;
use std::io::Write;

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the process logger. `RUST_LOG` wins over the default filter;
/// `filter` (usually from config) is applied on top of both.
pub fn init_logging(filter: Option<&str>) -> Result<(), log::SetLoggerError> {
    let env = Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    builder.format_timestamp_secs();
    builder.format(|buf, record| {
        let ts = buf.timestamp();
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            ts,
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.try_init()
}

/// Flushes whatever logger is installed. Called on the way out of the
/// process, after which nothing more should be logged.
pub fn close_all_handlers() {
    log::logger().flush();
}
