use log::LevelFilter;

/// Install the process logger. Call once at the start of `main()`.
///
/// Lines are written to stderr as `<rfc3339 timestamp>  <LEVEL> <message>`.
/// A second call is a no-op: the first installed dispatcher stays active.
pub fn init_logger(level: LevelFilter) {
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if result.is_err() {
        log::debug!("Logger already initialized; keeping existing dispatcher");
    }
}
