//! Access to the primitives of the daemon that hosts the plugin.
//!
//! The bridge never calls the daemon directly: it goes through the [`Host`] trait.
//! In production, [`CollectdHost`] resolves the primitives from the running daemon.
//! Tests use the fake host of the [`test`](crate::test) module.

use std::ffi::CStr;

use libc::{c_char, c_int};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::sys::{
    self, cdtime_t, meta_data_t, plugin_read_cb, plugin_shutdown_cb, plugin_write_cb, user_data_t, value_list_t,
};

/// Severity of a message sent to the daemon's log, same values as syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Severity {
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl From<log::Level> for Severity {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug | log::Level::Trace => Severity::Debug,
        }
    }
}

/// The native primitives of the daemon.
///
/// All the methods return the daemon's status code unchanged: 0 means success.
/// Implementations must be callable from any thread.
pub trait Host: Send + Sync {
    fn register_read(
        &self,
        group: &CStr,
        name: &CStr,
        callback: plugin_read_cb,
        interval: cdtime_t,
        user_data: &user_data_t,
    ) -> c_int;

    fn register_write(&self, name: &CStr, callback: plugin_write_cb, user_data: &user_data_t) -> c_int;

    fn register_shutdown(&self, name: &CStr, callback: plugin_shutdown_cb) -> c_int;

    /// Hands a value list to the daemon. The daemon copies what it needs before returning.
    fn dispatch_values(&self, vl: &value_list_t) -> c_int;

    fn log(&self, severity: Severity, message: &CStr);

    /// Allocates an empty metadata container, or returns NULL.
    fn meta_data_create(&self) -> *mut meta_data_t;

    /// # Safety
    /// `md` must come from [`Host::meta_data_create`] and must not be used afterwards.
    unsafe fn meta_data_destroy(&self, md: *mut meta_data_t);

    /// # Safety
    /// `md` must be a live container returned by [`Host::meta_data_create`].
    unsafe fn meta_data_add_string(&self, md: *mut meta_data_t, key: &CStr, value: &CStr) -> c_int;
    /// # Safety
    /// See [`Host::meta_data_add_string`].
    unsafe fn meta_data_add_signed_int(&self, md: *mut meta_data_t, key: &CStr, value: i64) -> c_int;
    /// # Safety
    /// See [`Host::meta_data_add_string`].
    unsafe fn meta_data_add_unsigned_int(&self, md: *mut meta_data_t, key: &CStr, value: u64) -> c_int;
    /// # Safety
    /// See [`Host::meta_data_add_string`].
    unsafe fn meta_data_add_double(&self, md: *mut meta_data_t, key: &CStr, value: f64) -> c_int;
    /// # Safety
    /// See [`Host::meta_data_add_string`].
    unsafe fn meta_data_add_boolean(&self, md: *mut meta_data_t, key: &CStr, value: bool) -> c_int;
}

/// Error while looking up the daemon's primitives.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("symbol {symbol} not found, is the plugin loaded by collectd?")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// The primitives of the collectd daemon that loaded this plugin.
///
/// The daemon exports its plugin API from its own executable. `CollectdHost` looks the symbols
/// up in the current process once, and keeps the function pointers.
pub struct CollectdHost {
    register_read: sys::plugin_register_complex_read_fn,
    register_write: sys::plugin_register_write_fn,
    register_shutdown: sys::plugin_register_shutdown_fn,
    dispatch_values: sys::plugin_dispatch_values_fn,
    log: sys::plugin_log_fn,
    md_create: sys::meta_data_create_fn,
    md_destroy: sys::meta_data_destroy_fn,
    md_add_string: sys::meta_data_add_string_fn,
    md_add_signed_int: sys::meta_data_add_signed_int_fn,
    md_add_unsigned_int: sys::meta_data_add_unsigned_int_fn,
    md_add_double: sys::meta_data_add_double_fn,
    md_add_boolean: sys::meta_data_add_boolean_fn,
    // the handle must stay open for the symbols to be valid
    _process: libloading::os::unix::Library,
}

impl CollectdHost {
    /// Resolves every primitive from the current process.
    pub fn load() -> Result<CollectdHost, HostError> {
        let process = libloading::os::unix::Library::this();
        log::debug!("resolving collectd symbols");

        // BEWARE: the symbol type must be the function pointer type itself.
        fn sym<T: Copy>(lib: &libloading::os::unix::Library, symbol: &'static str) -> Result<T, HostError> {
            let mut name = Vec::with_capacity(symbol.len() + 1);
            name.extend_from_slice(symbol.as_bytes());
            name.push(0);
            let s: libloading::os::unix::Symbol<T> =
                unsafe { lib.get(&name) }.map_err(|source| HostError::MissingSymbol { symbol, source })?;
            Ok(*s)
        }

        let host = CollectdHost {
            register_read: sym(&process, "plugin_register_complex_read")?,
            register_write: sym(&process, "plugin_register_write")?,
            register_shutdown: sym(&process, "plugin_register_shutdown")?,
            dispatch_values: sym(&process, "plugin_dispatch_values")?,
            log: sym(&process, "plugin_log")?,
            md_create: sym(&process, "meta_data_create")?,
            md_destroy: sym(&process, "meta_data_destroy")?,
            md_add_string: sym(&process, "meta_data_add_string")?,
            md_add_signed_int: sym(&process, "meta_data_add_signed_int")?,
            md_add_unsigned_int: sym(&process, "meta_data_add_unsigned_int")?,
            md_add_double: sym(&process, "meta_data_add_double")?,
            md_add_boolean: sym(&process, "meta_data_add_boolean")?,
            _process: process,
        };
        log::debug!("collectd symbols resolved");
        Ok(host)
    }
}

impl Host for CollectdHost {
    fn register_read(
        &self,
        group: &CStr,
        name: &CStr,
        callback: plugin_read_cb,
        interval: cdtime_t,
        user_data: &user_data_t,
    ) -> c_int {
        unsafe { (self.register_read)(group.as_ptr(), name.as_ptr(), callback, interval, user_data) }
    }

    fn register_write(&self, name: &CStr, callback: plugin_write_cb, user_data: &user_data_t) -> c_int {
        unsafe { (self.register_write)(name.as_ptr(), callback, user_data) }
    }

    fn register_shutdown(&self, name: &CStr, callback: plugin_shutdown_cb) -> c_int {
        unsafe { (self.register_shutdown)(name.as_ptr(), callback) }
    }

    fn dispatch_values(&self, vl: &value_list_t) -> c_int {
        unsafe { (self.dispatch_values)(vl) }
    }

    fn log(&self, severity: Severity, message: &CStr) {
        // never pass the message as the format: it may contain '%'
        const FORMAT: &[u8] = b"%s\0";
        unsafe { (self.log)(severity.into(), FORMAT.as_ptr().cast::<c_char>(), message.as_ptr()) }
    }

    fn meta_data_create(&self) -> *mut meta_data_t {
        unsafe { (self.md_create)() }
    }

    unsafe fn meta_data_destroy(&self, md: *mut meta_data_t) {
        unsafe { (self.md_destroy)(md) }
    }

    unsafe fn meta_data_add_string(&self, md: *mut meta_data_t, key: &CStr, value: &CStr) -> c_int {
        unsafe { (self.md_add_string)(md, key.as_ptr(), value.as_ptr()) }
    }

    unsafe fn meta_data_add_signed_int(&self, md: *mut meta_data_t, key: &CStr, value: i64) -> c_int {
        unsafe { (self.md_add_signed_int)(md, key.as_ptr(), value) }
    }

    unsafe fn meta_data_add_unsigned_int(&self, md: *mut meta_data_t, key: &CStr, value: u64) -> c_int {
        unsafe { (self.md_add_unsigned_int)(md, key.as_ptr(), value) }
    }

    unsafe fn meta_data_add_double(&self, md: *mut meta_data_t, key: &CStr, value: f64) -> c_int {
        unsafe { (self.md_add_double)(md, key.as_ptr(), value) }
    }

    unsafe fn meta_data_add_boolean(&self, md: *mut meta_data_t, key: &CStr, value: bool) -> c_int {
        unsafe { (self.md_add_boolean)(md, key.as_ptr(), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::Severity;

    #[test]
    fn severities() {
        assert_eq!(3, i32::from(Severity::Error));
        assert_eq!(7, i32::from(Severity::Debug));
        assert_eq!(Severity::Warning, Severity::from(log::Level::Warn));
        assert_eq!(Severity::Debug, Severity::from(log::Level::Trace));
        assert_eq!(Severity::Notice, Severity::try_from(5).unwrap());
        assert!(Severity::try_from(0).is_err());
    }

    #[test]
    fn missing_symbols() {
        // the test binary does not export the daemon's API
        assert!(super::CollectdHost::load().is_err());
    }
}
