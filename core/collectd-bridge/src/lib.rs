//! Write collectd plugins in Rust.
//!
//! collectd loads plugins as shared libraries and talks to them through C callbacks.
//! This crate provides the glue:
//! - [`register_read`], [`register_complex_read`], [`register_write`] and [`register_shutdown`]
//!   hook Rust handlers into the daemon,
//! - [`write`] dispatches a [`ValueList`] to the daemon,
//! - [`collectd_plugin!`] exports the `module_register` entry point that the daemon looks for.
//!
//! # Example
//! ```ignore
//! use collectd_bridge::{Identifier, Sample, ValueList};
//!
//! fn init() -> anyhow::Result<()> {
//!     collectd_bridge::register_read("my_plugin", || {
//!         let values = ValueList::new(Identifier::new("", "my_plugin", "gauge")).with_value(Sample::Gauge(42.0));
//!         collectd_bridge::write(&values)?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//!
//! collectd_bridge::collectd_plugin!(init);
//! ```
//!
//! # Threads
//!
//! The daemon calls read and write callbacks from its own threads, several of them at the same time.
//! Handlers are therefore `Send + Sync`, and registration can happen from any thread.
//! Nothing ever unwinds into the daemon: errors and panics of handlers are logged and reported
//! to the daemon as failures.
//!
//! # Testing plugins
//!
//! With the `test` feature, the [`test`] module provides a fake daemon,
//! [`MockHost`](test::MockHost), that records registrations and dispatched values.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod host;
pub mod logger;
pub mod meta;
pub mod registry;
mod string;
pub mod sys;
pub mod time;
mod trampoline;
pub mod values;


pub use bridge::{Bridge, DaemonWriter};
pub use config::{BridgeConfig, ComplexReadConfig, FieldOverflow};
pub use error::{CodecError, Error, HandlerKind};
pub use handler::{OnShutdown, ReadHandler, ShutdownHandler, WriteHandler};
pub use host::{CollectdHost, Host, Severity};
pub use meta::{MetaValue, Metadata};
pub use time::CdTime;
pub use values::{DsType, Identifier, Sample, ValueList};

/// Registers a read callback on the process-wide bridge, see [`Bridge::register_read`].
pub fn register_read<H: ReadHandler + 'static>(name: &str, handler: H) -> Result<(), Error> {
    bridge::global()?.register_read(name, handler)
}

/// See [`Bridge::register_complex_read`].
pub fn register_complex_read<H: ReadHandler + 'static>(
    name: &str,
    handler: H,
    config: ComplexReadConfig,
) -> Result<(), Error> {
    bridge::global()?.register_complex_read(name, handler, config)
}

/// See [`Bridge::register_write`].
pub fn register_write<H: WriteHandler + 'static>(name: &str, handler: H) -> Result<(), Error> {
    bridge::global()?.register_write(name, handler)
}

/// See [`Bridge::register_shutdown`].
pub fn register_shutdown<H: ShutdownHandler + 'static>(name: &str, handler: H) -> Result<(), Error> {
    bridge::global()?.register_shutdown(name, handler)
}

/// Dispatches a value list to the daemon through the process-wide bridge, see [`Bridge::write`].
pub fn write(values: &ValueList) -> Result<(), Error> {
    bridge::global()?.write(values)
}

/// Defines `module_register`, the function that the daemon calls after loading the plugin.
///
/// With an argument, `module_register` runs the given function, of type
/// `fn() -> anyhow::Result<()>`, which usually registers the plugin's callbacks.
/// Its errors and panics are sent to the daemon's log.
///
/// ```ignore
/// fn init() -> anyhow::Result<()> {
///     collectd_bridge::register_read("my_plugin", MyReader::default())?;
///     Ok(())
/// }
///
/// collectd_bridge::collectd_plugin!(init);
/// ```
#[macro_export]
macro_rules! collectd_plugin {
    () => {
        #[unsafe(no_mangle)]
        pub extern "C" fn module_register() {}
    };
    ($init:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn module_register() {
            $crate::bridge::run_plugin_init($init);
        }
    };
}
