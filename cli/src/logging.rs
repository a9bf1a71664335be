use log::LevelFilter;

/// Maps a configured level name to a filter, defaulting to `warn`
pub fn level_from_config(level: Option<&str>, verbose: bool) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    match level.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("error") => LevelFilter::Error,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// Initializes env_logger; `RUST_LOG` still wins over the configured level
pub fn init(level: LevelFilter) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()))
        .format_timestamp(None)
        .init();
}
