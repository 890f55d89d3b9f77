//! A plugin driven through the process-wide bridge, from `module_register` to shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use collectd_bridge::test::{MockHost, OwnedRecord};
use collectd_bridge::{
    Bridge, BridgeConfig, ComplexReadConfig, Identifier, OnShutdown, Sample, Severity, ValueList, bridge,
};
use pretty_assertions::assert_eq;
use serial_test::serial;

/// The fake daemon behind the process-wide bridge.
fn host() -> &'static Arc<MockHost> {
    static HOST: OnceLock<Arc<MockHost>> = OnceLock::new();
    HOST.get_or_init(|| {
        let host = Arc::new(MockHost::new());
        let config = BridgeConfig {
            default_read_group: String::from("lifecycle"),
            ..Default::default()
        };
        assert!(bridge::install(Bridge::with_config(host.clone(), config)).is_ok());
        host
    })
}

fn init() -> anyhow::Result<()> {
    collectd_bridge::register_read("from_init", || -> anyhow::Result<()> { Ok(()) })?;
    Ok(())
}

fn failing_init() -> anyhow::Result<()> {
    anyhow::bail!("missing configuration")
}

fn panicking_init() -> anyhow::Result<()> {
    panic!("unexpected")
}

collectd_bridge::collectd_plugin!(init);

#[test]
#[serial]
fn read_write_shutdown() -> anyhow::Result<()> {
    let host = host();
    host.take_dispatched();

    collectd_bridge::register_complex_read(
        "golang_example",
        || -> anyhow::Result<()> {
            let values = ValueList::new(Identifier::new("localhost", "golang", "gauge"))
                .with_interval(Duration::from_secs(10))
                .with_value(Sample::Gauge(42.0))
                .with_metadata("unit", "count");
            collectd_bridge::write(&values)?;
            Ok(())
        },
        ComplexReadConfig::new("golang", Duration::from_secs(10)),
    )?;

    let received = Arc::new(Mutex::new(Vec::new()));
    {
        let received = received.clone();
        collectd_bridge::register_write("sink", move |vl: &ValueList| -> anyhow::Result<()> {
            received.lock().unwrap().push(vl.clone());
            Ok(())
        })?;
    }

    let stopped = Arc::new(AtomicBool::new(false));
    {
        let stopped = stopped.clone();
        collectd_bridge::register_shutdown(
            "golang_example",
            OnShutdown(move || -> anyhow::Result<()> {
                stopped.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )?;
    }

    // the daemon reads
    let read = host.last_read("golang_example").unwrap();
    assert_eq!("golang", read.group);
    assert_eq!(10 << 30, read.interval);
    assert_eq!(0, read.invoke());

    let dispatched = host.take_dispatched();
    assert_eq!(1, dispatched.len());
    let d = &dispatched[0];
    assert_eq!(42.0, d.gauge(0));
    assert_eq!(1, d.meta.as_ref().map(Vec::len).unwrap_or(0));
    assert_eq!(0, host.live_meta());

    // then hands the value list to the write callbacks
    let record = OwnedRecord::new(d.identifier.clone())
        .with_time(1 << 30, d.interval)
        .with_value("value", Sample::Gauge(d.gauge(0)));
    assert_eq!(0, host.last_write("sink").unwrap().invoke(&record));
    {
        let received = received.lock().unwrap();
        assert_eq!(1, received.len());
        assert_eq!("localhost/golang/gauge", received[0].identifier.to_string());
        assert_eq!(vec![Sample::Gauge(42.0)], received[0].values);
    }

    // and finally stops
    let shutdowns = host.shutdown_registrations();
    assert_eq!(1, shutdowns.len());
    assert_eq!(0, shutdowns[0].invoke());
    assert!(stopped.load(Ordering::SeqCst));
    Ok(())
}

#[test]
#[serial]
fn module_register_runs_init() {
    let host = host();
    module_register();
    let read = host.last_read("from_init").unwrap();
    assert_eq!("lifecycle", read.group);
    assert_eq!(0, read.invoke());
}

#[test]
#[serial]
fn broken_context_is_reported_to_the_daemon() {
    let host = host();
    collectd_bridge::register_read("no_context", || -> anyhow::Result<()> { Ok(()) }).unwrap();
    let read = host.last_read("no_context").unwrap();
    assert_eq!(-1, read.invoke_without_context());
    assert!(host.logged(Severity::Error, "BUG: read callback invoked without its context"));
}

#[test]
#[serial]
fn init_errors_are_logged() {
    let host = host();
    collectd_bridge::bridge::run_plugin_init(failing_init);
    assert!(host.logged(
        Severity::Error,
        "plugin initialization failed: missing configuration"
    ));
    collectd_bridge::bridge::run_plugin_init(panicking_init);
    assert!(host.logged(Severity::Error, "plugin initialization panicked"));
}

#[test]
#[serial]
fn log_records_reach_the_daemon() {
    let host = host();
    bridge::global()
        .unwrap()
        .install_logger(log::LevelFilter::Info)
        .unwrap();
    log::info!("hello from {}", "rust");
    log::debug!("filtered out");
    assert!(host.logged(Severity::Info, "hello from rust"));
    assert!(!host.logged(Severity::Debug, "filtered out"));
}
