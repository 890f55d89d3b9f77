//! Registration of handlers and dispatch of values.

use std::ffi::CString;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

use crate::config::{BridgeConfig, ComplexReadConfig};
use crate::error::{Error, HandlerKind};
use crate::handler::{ReadHandler, ShutdownHandler, WriteHandler};
use crate::host::{CollectdHost, Host, Severity};
use crate::logger::DaemonLogger;
use crate::registry::Registries;
use crate::string::log_message;
use crate::time::CdTime;
use crate::trampoline::{
    CallbackContext, add_shutdown_target, read_trampoline, remove_shutdown_target, shutdown_trampoline,
    write_trampoline,
};
use crate::values::{NativeValueList, ValueList};

/// State shared by a [`Bridge`], its clones and the contexts given to the daemon.
pub(crate) struct Shared {
    pub(crate) host: Arc<dyn Host>,
    pub(crate) config: BridgeConfig,
    pub(crate) registries: Registries,
    /// Set when the shutdown handlers have run.
    pub(crate) shutdown_done: AtomicBool,
}

impl Shared {
    pub(crate) fn log(&self, severity: Severity, message: &str) {
        self.host.log(severity, &log_message(message));
    }
}

/// Connects Rust handlers to the daemon.
///
/// A plugin usually relies on the process-wide bridge, through the free functions of the crate root
/// ([`register_read`](crate::register_read), [`write`](crate::write)...).
/// A `Bridge` can also be built explicitly on top of any [`Host`], which is how the tests
/// drive a fake daemon.
///
/// Cloning a `Bridge` is cheap and gives another handle to the same registries.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self::with_config(host, BridgeConfig::default())
    }

    pub fn with_config(host: Arc<dyn Host>, config: BridgeConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                host,
                config,
                registries: Registries::default(),
                shutdown_done: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn registries(&self) -> &Registries {
        &self.shared.registries
    }

    pub fn host(&self) -> &dyn Host {
        self.shared.host.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Registers `handler` as a read callback in the default group, with the daemon's interval.
    pub fn register_read<H: ReadHandler + 'static>(&self, name: &str, handler: H) -> Result<(), Error> {
        self.register_complex_read(name, handler, ComplexReadConfig::default())
    }

    /// Registers `handler` as a read callback, with an explicit group and interval.
    ///
    /// On success, the daemon calls `handler` every `config.interval` (or at its global
    /// interval if it is zero). On failure, `handler` is dropped and nothing is registered.
    pub fn register_complex_read<H: ReadHandler + 'static>(
        &self,
        name: &str,
        handler: H,
        config: ComplexReadConfig,
    ) -> Result<(), Error> {
        let c_name = callback_name(name)?;
        let group = if config.group.is_empty() {
            &self.shared.config.default_read_group
        } else {
            &config.group
        };
        let c_group = callback_name(group)?;
        let interval = CdTime::from(config.interval);

        let handler: Arc<dyn ReadHandler> = Arc::new(handler);
        self.shared.registries.read.insert_with(name, handler, |_| {
            let ud = CallbackContext::new(name, &self.shared).into_user_data();
            let status = self
                .shared
                .host
                .register_read(&c_group, &c_name, read_trampoline, interval.0, &ud);
            if status != 0 {
                // the daemon did not keep the context
                unsafe { CallbackContext::reclaim(ud) };
                return Err(Error::RegistrationFailed {
                    kind: HandlerKind::Read,
                    name: name.to_owned(),
                    status,
                });
            }
            log::debug!("read callback {name:?} registered in group {group:?}, interval {:?}", config.interval);
            Ok(())
        })
    }

    /// Registers `handler` as a write callback: it receives every value list that the daemon dispatches.
    pub fn register_write<H: WriteHandler + 'static>(&self, name: &str, handler: H) -> Result<(), Error> {
        let c_name = callback_name(name)?;
        let handler: Arc<dyn WriteHandler> = Arc::new(handler);
        self.shared.registries.write.insert_with(name, handler, |_| {
            let ud = CallbackContext::new(name, &self.shared).into_user_data();
            let status = self.shared.host.register_write(&c_name, write_trampoline, &ud);
            if status != 0 {
                unsafe { CallbackContext::reclaim(ud) };
                return Err(Error::RegistrationFailed {
                    kind: HandlerKind::Write,
                    name: name.to_owned(),
                    status,
                });
            }
            log::debug!("write callback {name:?} registered");
            Ok(())
        })
    }

    /// Registers `handler` to be called when the daemon shuts down.
    ///
    /// The daemon's shutdown callback takes no context, so the bridge registers a single native
    /// callback, under the name of the first handler, and runs every shutdown handler from it.
    /// Later registrations only add the handler to the registry.
    ///
    /// When several bridges have shutdown handlers, the first native shutdown call runs the
    /// handlers of all of them, and each handler runs once.
    pub fn register_shutdown<H: ShutdownHandler + 'static>(&self, name: &str, handler: H) -> Result<(), Error> {
        let c_name = callback_name(name)?;
        let handler: Arc<dyn ShutdownHandler> = Arc::new(handler);
        self.shared.registries.shutdown.insert_with(name, handler, |first| {
            if !first {
                return Ok(());
            }
            add_shutdown_target(&self.shared);
            let status = self.shared.host.register_shutdown(&c_name, shutdown_trampoline);
            if status != 0 {
                remove_shutdown_target(&self.shared);
                return Err(Error::RegistrationFailed {
                    kind: HandlerKind::Shutdown,
                    name: name.to_owned(),
                    status,
                });
            }
            log::debug!("shutdown callback registered as {name:?}");
            Ok(())
        })
    }

    /// Dispatches a value list to the daemon.
    ///
    /// The native copy of `values` and its metadata are freed before returning, whatever the outcome.
    pub fn write(&self, values: &ValueList) -> Result<(), Error> {
        let native = NativeValueList::encode(self.shared.host.as_ref(), values, self.shared.config.field_overflow)?;
        let status = self.shared.host.dispatch_values(native.as_raw());
        if status != 0 {
            return Err(Error::DispatchFailed { status });
        }
        Ok(())
    }

    /// Returns a [`WriteHandler`] that forwards everything to [`Bridge::write`].
    pub fn writer(&self) -> DaemonWriter {
        DaemonWriter { bridge: self.clone() }
    }

    /// Sends a message to the daemon's log.
    pub fn log(&self, severity: Severity, message: &str) {
        self.shared.log(severity, message);
    }

    /// Sends the records of the `log` crate to the daemon's log, see [`DaemonLogger`].
    pub fn install_logger(&self, level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(DaemonLogger::new(Arc::clone(&self.shared.host), level)))?;
        log::set_max_level(level);
        Ok(())
    }
}

fn callback_name(name: &str) -> Result<CString, Error> {
    CString::new(name).map_err(|_| Error::InvalidName(name.to_owned()))
}

/// A [`WriteHandler`] that dispatches the value lists it receives to the daemon.
///
/// Useful to feed values produced elsewhere (say, received from another process) into the
/// daemon. Do not register it as a write callback of the same daemon: every value list would
/// be dispatched again, forever.
#[derive(Clone)]
pub struct DaemonWriter {
    bridge: Bridge,
}

impl WriteHandler for DaemonWriter {
    fn write(&self, values: &ValueList) -> anyhow::Result<()> {
        self.bridge.write(values)?;
        Ok(())
    }
}

static GLOBAL: OnceLock<Bridge> = OnceLock::new();

/// Returns the process-wide bridge, connected to the collectd daemon on first use.
pub fn global() -> Result<&'static Bridge, Error> {
    if let Some(bridge) = GLOBAL.get() {
        return Ok(bridge);
    }
    let host = CollectdHost::load()?;
    Ok(GLOBAL.get_or_init(|| Bridge::new(Arc::new(host))))
}

/// Sets the process-wide bridge, for instance to use a custom [`BridgeConfig`].
///
/// Must be called before the first registration. Returns `bridge` back if the process-wide
/// bridge already exists.
pub fn install(bridge: Bridge) -> Result<(), Bridge> {
    GLOBAL.set(bridge)
}

/// Runs the initialization function of a plugin, see [`collectd_plugin!`](crate::collectd_plugin).
#[doc(hidden)]
pub fn run_plugin_init(init: fn() -> anyhow::Result<()>) {
    let message = match std::panic::catch_unwind(init) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => format!("plugin initialization failed: {err:#}"),
        Err(_) => String::from("plugin initialization panicked"),
    };
    report_error(&message);
}

/// Logs an error that no bridge is responsible for, through the process-wide bridge.
pub(crate) fn report_error(message: &str) {
    match global() {
        Ok(bridge) => bridge.log(Severity::Error, message),
        Err(err) => log::error!("{message} ({err})"),
    }
}
