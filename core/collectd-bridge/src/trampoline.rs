//! The functions that the daemon actually calls.
//!
//! Each trampoline has the exact signature of a daemon callback, finds the handler to run from
//! the context pointer and turns the outcome into a status code. Nothing may unwind through
//! them: handler errors and panics are logged and reported as [`FAILURE`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use libc::c_int;

use crate::bridge::{Shared, report_error};
use crate::error::{Error, HandlerKind};
use crate::host::Severity;
use crate::sys::{data_set_t, user_data_t, value_list_t};
use crate::values::decode;

pub(crate) const SUCCESS: c_int = 0;
pub(crate) const FAILURE: c_int = -1;

/// What the daemon keeps as `user_data_t.data` for read and write callbacks.
///
/// Allocated once per successful registration and never freed, since the daemon may call the
/// callback until the process exits.
pub(crate) struct CallbackContext {
    name: String,
    shared: Arc<Shared>,
}

impl CallbackContext {
    pub(crate) fn new(name: &str, shared: &Arc<Shared>) -> Self {
        Self {
            name: name.to_owned(),
            shared: Arc::clone(shared),
        }
    }

    /// Leaks the context into a `user_data_t`. The daemon must not free it: `free_func` is NULL.
    pub(crate) fn into_user_data(self) -> user_data_t {
        user_data_t {
            data: Box::into_raw(Box::new(self)).cast(),
            free_func: None,
        }
    }

    /// Frees a context that the daemon refused.
    ///
    /// # Safety
    /// `ud` must come from [`CallbackContext::into_user_data`], and the daemon must not have kept it.
    pub(crate) unsafe fn reclaim(ud: user_data_t) {
        drop(unsafe { Box::from_raw(ud.data.cast::<CallbackContext>()) });
    }

    /// # Safety
    /// `ud` must be NULL or point to a `user_data_t` made by [`CallbackContext::into_user_data`].
    unsafe fn from_user_data<'a>(ud: *const user_data_t) -> Option<&'a CallbackContext> {
        let ud = unsafe { ud.as_ref() }?;
        unsafe { ud.data.cast::<CallbackContext>().as_ref() }
    }
}

/// Bridges that have at least one shutdown handler.
///
/// The shutdown callback receives no context pointer, and each bridge registers it once with its
/// host. Whichever registration the daemon calls, every bridge of this list runs its handlers,
/// each bridge only once.
static SHUTDOWN_TARGETS: Mutex<Vec<Weak<Shared>>> = Mutex::new(Vec::new());

pub(crate) fn add_shutdown_target(shared: &Arc<Shared>) {
    let mut targets = SHUTDOWN_TARGETS.lock().unwrap_or_else(PoisonError::into_inner);
    targets.retain(|t| t.strong_count() > 0 && !std::ptr::eq(t.as_ptr(), Arc::as_ptr(shared)));
    targets.push(Arc::downgrade(shared));
}

pub(crate) fn remove_shutdown_target(shared: &Arc<Shared>) {
    let mut targets = SHUTDOWN_TARGETS.lock().unwrap_or_else(PoisonError::into_inner);
    targets.retain(|t| !std::ptr::eq(t.as_ptr(), Arc::as_ptr(shared)));
}

fn live_shutdown_targets() -> Vec<Arc<Shared>> {
    let targets = SHUTDOWN_TARGETS.lock().unwrap_or_else(PoisonError::into_inner);
    targets.iter().filter_map(Weak::upgrade).collect()
}

pub(crate) unsafe extern "C" fn read_trampoline(ud: *mut user_data_t) -> c_int {
    let Some(ctx) = (unsafe { CallbackContext::from_user_data(ud) }) else {
        report_error("BUG: read callback invoked without its context");
        return FAILURE;
    };
    guard(Some(ctx.shared.as_ref()), &ctx.name, "read", || ctx.shared.run_read(&ctx.name))
}

pub(crate) unsafe extern "C" fn write_trampoline(
    ds: *const data_set_t,
    vl: *const value_list_t,
    ud: *mut user_data_t,
) -> c_int {
    let Some(ctx) = (unsafe { CallbackContext::from_user_data(ud) }) else {
        report_error("BUG: write callback invoked without its context");
        return FAILURE;
    };
    guard(Some(ctx.shared.as_ref()), &ctx.name, "write", || unsafe {
        ctx.shared.run_write(&ctx.name, ds, vl)
    })
}

pub(crate) unsafe extern "C" fn shutdown_trampoline() -> c_int {
    guard(None, "rust", "shutdown", || {
        let targets = live_shutdown_targets();
        if targets.is_empty() {
            report_error("BUG: shutdown callback invoked, but no shutdown handler is registered");
            return FAILURE;
        }
        let mut status = SUCCESS;
        for shared in targets {
            if shared.shutdown_done.swap(true, Ordering::SeqCst) {
                continue;
            }
            if shared.run_shutdown() != SUCCESS {
                status = FAILURE;
            }
        }
        status
    })
}

/// Last line of defense: a panic must never reach the daemon.
///
/// The panic is logged through `shared` if there is one, through the process-wide bridge otherwise.
fn guard(shared: Option<&Shared>, name: &str, op: &str, f: impl FnOnce() -> c_int) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            let message = format!("{name} plugin: {op} callback panicked: {}", panic_message(payload.as_ref()));
            match shared {
                Some(shared) => shared.log(Severity::Error, &message),
                None => report_error(&message),
            }
            FAILURE
        }
    }
}

/// Runs a handler, turning a panic into an error.
fn call_handler(f: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

impl Shared {
    fn not_found(&self, kind: HandlerKind, name: &str) -> c_int {
        // the context pointer and the registry disagree: the bridge itself is broken
        let err = Error::HandlerNotFound {
            kind,
            name: name.to_owned(),
        };
        self.log(Severity::Error, &format!("BUG: {err}"));
        FAILURE
    }

    pub(crate) fn run_read(&self, name: &str) -> c_int {
        let Some(handler) = self.registries.read.get(name) else {
            return self.not_found(HandlerKind::Read, name);
        };
        match call_handler(|| handler.read()) {
            Ok(()) => SUCCESS,
            Err(err) => {
                self.log(Severity::Error, &format!("{name} plugin: read failed: {err:#}"));
                FAILURE
            }
        }
    }

    /// # Safety
    /// `ds` and `vl` must be NULL or valid for the duration of the call.
    pub(crate) unsafe fn run_write(&self, name: &str, ds: *const data_set_t, vl: *const value_list_t) -> c_int {
        let Some(handler) = self.registries.write.get(name) else {
            return self.not_found(HandlerKind::Write, name);
        };
        let values = match unsafe { decode(vl, ds) } {
            Ok(values) => values,
            Err(err) => {
                self.log(Severity::Error, &format!("{name} plugin: cannot read value list: {err}"));
                return FAILURE;
            }
        };
        match call_handler(|| handler.write(&values)) {
            Ok(()) => SUCCESS,
            Err(err) => {
                self.log(Severity::Error, &format!("{name} plugin: write failed: {err:#}"));
                FAILURE
            }
        }
    }

    /// Runs every shutdown handler, even if some of them fail.
    pub(crate) fn run_shutdown(&self) -> c_int {
        let mut status = SUCCESS;
        for (name, handler) in self.registries.shutdown.snapshot() {
            if let Err(err) = call_handler(|| handler.shutdown()) {
                self.log(Severity::Error, &format!("{name} plugin: shutdown failed: {err:#}"));
                status = FAILURE;
            }
        }
        status
    }
}
