//! Callbacks implemented by plugins.
//!
//! The daemon calls read and write callbacks from its own thread pools, possibly several at the
//! same time: handlers take `&self` and must synchronize their internal state themselves.
//! Closures implement the traits, which is handy for small plugins:
//! ```
//! use collectd_bridge::handler::ReadHandler;
//!
//! fn takes_reader(_r: impl ReadHandler) {}
//! takes_reader(|| {
//!     // collect something and dispatch it with collectd_bridge::write
//!     Ok(())
//! });
//! ```

use crate::values::ValueList;

/// Called periodically by the daemon to collect values.
pub trait ReadHandler: Send + Sync {
    fn read(&self) -> anyhow::Result<()>;
}

/// Called by the daemon for every value list that it dispatches.
pub trait WriteHandler: Send + Sync {
    fn write(&self, values: &ValueList) -> anyhow::Result<()>;
}

/// Called once when the daemon shuts down.
pub trait ShutdownHandler: Send + Sync {
    fn shutdown(&self) -> anyhow::Result<()>;
}

impl<F> ReadHandler for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn read(&self) -> anyhow::Result<()> {
        self()
    }
}

impl<F> WriteHandler for F
where
    F: Fn(&ValueList) -> anyhow::Result<()> + Send + Sync,
{
    fn write(&self, values: &ValueList) -> anyhow::Result<()> {
        self(values)
    }
}

/// Wraps a closure into a [`ShutdownHandler`].
///
/// Closures cannot implement both `ReadHandler` and `ShutdownHandler`, this picks the latter.
pub struct OnShutdown<F>(pub F);

impl<F> ShutdownHandler for OnShutdown<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn shutdown(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}
