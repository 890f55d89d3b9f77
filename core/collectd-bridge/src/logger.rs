//! Forwarding of the `log` crate to the daemon's log.

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record};

use crate::host::{Host, Severity};
use crate::string::log_message;

/// A [`log::Log`] implementation that sends every record to `plugin_log`.
///
/// Install it with [`Bridge::install_logger`](crate::Bridge::install_logger). Records are
/// prefixed with their target, which is the module path by default, so that the daemon's log
/// tells which plugin emitted them.
pub struct DaemonLogger {
    host: Arc<dyn Host>,
    level: LevelFilter,
}

impl DaemonLogger {
    pub fn new(host: Arc<dyn Host>, level: LevelFilter) -> Self {
        Self { host, level }
    }
}

impl Log for DaemonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("{}: {}", record.target(), record.args());
        self.host.log(Severity::from(record.level()), &log_message(&message));
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use log::{Level, LevelFilter, Log, Record};

    use super::DaemonLogger;
    use crate::host::Severity;
    use crate::test::MockHost;

    fn record(logger: &DaemonLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("my_plugin")
                .args(format_args!("{message}"))
                .build(),
        );
    }

    #[test]
    fn levels_map_to_severities() {
        let host = Arc::new(MockHost::new());
        let logger = DaemonLogger::new(host.clone(), LevelFilter::Trace);
        record(&logger, Level::Error, "e");
        record(&logger, Level::Warn, "w");
        record(&logger, Level::Info, "i");
        record(&logger, Level::Debug, "d");
        record(&logger, Level::Trace, "t");
        assert_eq!(
            vec![
                (Severity::Error, String::from("my_plugin: e")),
                (Severity::Warning, String::from("my_plugin: w")),
                (Severity::Info, String::from("my_plugin: i")),
                (Severity::Debug, String::from("my_plugin: d")),
                (Severity::Debug, String::from("my_plugin: t")),
            ],
            host.logs()
        );
    }

    #[test]
    fn filtered_by_level() {
        let host = Arc::new(MockHost::new());
        let logger = DaemonLogger::new(host.clone(), LevelFilter::Warn);
        record(&logger, Level::Info, "hidden");
        record(&logger, Level::Warn, "shown");
        assert_eq!(vec![(Severity::Warning, String::from("my_plugin: shown"))], host.logs());
    }

    #[test]
    fn percent_signs_are_kept() {
        let host = Arc::new(MockHost::new());
        let logger = DaemonLogger::new(host.clone(), LevelFilter::Info);
        record(&logger, Level::Info, "100%s");
        assert!(host.logged(Severity::Info, "100%s"));
    }
}
