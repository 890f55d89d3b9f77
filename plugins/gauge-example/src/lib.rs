//! A collectd plugin that reports a constant gauge.
//!
//! Build it as a shared library, copy it to collectd's plugin directory and load it with:
//! ```text
//! LoadPlugin gauge_example
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use collectd_bridge::{Bridge, ComplexReadConfig, Identifier, OnShutdown, ReadHandler, Sample, ValueList};

pub const PLUGIN_NAME: &str = "gauge_example";
pub const READ_GROUP: &str = "example";
pub const READ_INTERVAL: Duration = Duration::from_secs(10);
pub const GAUGE_VALUE: f64 = 42.0;

/// Dispatches [`GAUGE_VALUE`] on every read.
pub struct GaugeReader {
    bridge: Bridge,
    reads: Arc<AtomicU64>,
}

impl ReadHandler for GaugeReader {
    fn read(&self) -> anyhow::Result<()> {
        let count = self.reads.fetch_add(1, Ordering::Relaxed) + 1;
        // an empty host is replaced by the daemon's hostname
        let values = ValueList::new(Identifier::new("", PLUGIN_NAME, "gauge"))
            .with_interval(READ_INTERVAL)
            .with_value(Sample::Gauge(GAUGE_VALUE))
            .with_metadata("reads", count);
        self.bridge.write(&values).context("failed to dispatch the gauge")?;
        Ok(())
    }
}

/// Registers the plugin's callbacks on `bridge`.
pub fn register(bridge: &Bridge) -> anyhow::Result<()> {
    let reads = Arc::new(AtomicU64::new(0));
    let reader = GaugeReader {
        bridge: bridge.clone(),
        reads: reads.clone(),
    };
    bridge
        .register_complex_read(PLUGIN_NAME, reader, ComplexReadConfig::new(READ_GROUP, READ_INTERVAL))
        .context("failed to register the read callback")?;
    bridge
        .register_shutdown(
            PLUGIN_NAME,
            OnShutdown(move || -> anyhow::Result<()> {
                log::info!("stopping after {} reads", reads.load(Ordering::Relaxed));
                Ok(())
            }),
        )
        .context("failed to register the shutdown callback")?;
    Ok(())
}

fn init() -> anyhow::Result<()> {
    let bridge = collectd_bridge::bridge::global()?;
    bridge.install_logger(log::LevelFilter::Info)?;
    register(bridge)
}

collectd_bridge::collectd_plugin!(init);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use collectd_bridge::test::MockHost;
    use collectd_bridge::{Bridge, Error, HandlerKind, MetaValue};

    use super::{GAUGE_VALUE, PLUGIN_NAME, READ_GROUP, register};

    #[test]
    fn reads_dispatch_the_gauge() {
        let host = Arc::new(MockHost::new());
        let bridge = Bridge::new(host.clone());
        register(&bridge).unwrap();

        let read = host.last_read(PLUGIN_NAME).unwrap();
        assert_eq!(READ_GROUP, read.group);
        assert_eq!(10 << 30, read.interval);
        assert_eq!(0, read.invoke());
        assert_eq!(0, read.invoke());

        let dispatched = host.take_dispatched();
        assert_eq!(2, dispatched.len());
        assert_eq!(GAUGE_VALUE, dispatched[1].gauge(0));
        assert_eq!(PLUGIN_NAME, dispatched[1].identifier.plugin);
        assert_eq!(
            Some(vec![(String::from("reads"), MetaValue::Unsigned(2))]),
            dispatched[1].meta
        );
        assert_eq!(0, host.live_meta());

        assert_eq!(0, host.shutdown_registrations()[0].invoke());
    }

    #[test]
    fn dispatch_failure_fails_the_read() {
        let host = Arc::new(MockHost::new());
        let bridge = Bridge::new(host.clone());
        register(&bridge).unwrap();
        host.set_dispatch_status(-1);
        assert_eq!(-1, host.last_read(PLUGIN_NAME).unwrap().invoke());
        assert!(host.logged(
            collectd_bridge::Severity::Error,
            "gauge_example plugin: read failed: failed to dispatch the gauge: dispatch_values failed with status -1"
        ));
    }

    #[test]
    fn registration_failure() {
        let host = Arc::new(MockHost::new());
        host.set_register_status(1);
        let err = register(&Bridge::new(host.clone())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::RegistrationFailed { kind: HandlerKind::Read, status: 1, .. })
        ));
    }
}
