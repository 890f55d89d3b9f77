//! Mirror of the daemon's plugin ABI (`plugin.h`, `meta_data.h`).
//!
//! Every struct here must have exactly the layout of its C counterpart:
//! the daemon owns these values and hands them to us by pointer, a single
//! misplaced field corrupts its memory.
#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void};

/// Width of every fixed-size name buffer, including the terminating NUL.
pub const DATA_MAX_NAME_LEN: usize = 128;

pub const DS_TYPE_COUNTER: c_int = 0;
pub const DS_TYPE_GAUGE: c_int = 1;
pub const DS_TYPE_DERIVE: c_int = 2;
pub const DS_TYPE_ABSOLUTE: c_int = 3;

/// Fixed-point time, in units of 2^-30 seconds.
pub type cdtime_t = u64;

pub type counter_t = u64;
pub type gauge_t = f64;
pub type derive_t = i64;
pub type absolute_t = u64;

/// One sample. Which field is valid is given by the matching `data_source_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union value_t {
    pub counter: counter_t,
    pub gauge: gauge_t,
    pub derive: derive_t,
    pub absolute: absolute_t,
}

#[repr(C)]
pub struct value_list_t {
    pub values: *mut value_t,
    pub values_len: usize,
    pub time: cdtime_t,
    pub interval: cdtime_t,
    pub host: [c_char; DATA_MAX_NAME_LEN],
    pub plugin: [c_char; DATA_MAX_NAME_LEN],
    pub plugin_instance: [c_char; DATA_MAX_NAME_LEN],
    pub type_: [c_char; DATA_MAX_NAME_LEN],
    pub type_instance: [c_char; DATA_MAX_NAME_LEN],
    pub meta: *mut meta_data_t,
}

impl Default for value_list_t {
    fn default() -> Self {
        Self {
            values: std::ptr::null_mut(),
            values_len: 0,
            time: 0,
            interval: 0,
            host: [0; DATA_MAX_NAME_LEN],
            plugin: [0; DATA_MAX_NAME_LEN],
            plugin_instance: [0; DATA_MAX_NAME_LEN],
            type_: [0; DATA_MAX_NAME_LEN],
            type_instance: [0; DATA_MAX_NAME_LEN],
            meta: std::ptr::null_mut(),
        }
    }
}

#[repr(C)]
pub struct data_source_t {
    pub name: [c_char; DATA_MAX_NAME_LEN],
    pub type_: c_int,
    pub min: f64,
    pub max: f64,
}

#[repr(C)]
pub struct data_set_t {
    pub type_: [c_char; DATA_MAX_NAME_LEN],
    pub ds_num: usize,
    pub ds: *mut data_source_t,
}

#[repr(C)]
pub struct user_data_t {
    pub data: *mut c_void,
    pub free_func: Option<unsafe extern "C" fn(*mut c_void)>,
}

/// Opaque metadata container, only manipulated through `meta_data_*`.
#[repr(C)]
pub struct meta_data_t {
    _private: [u8; 0],
}

// ====== Callback types ======
pub type plugin_read_cb = unsafe extern "C" fn(ud: *mut user_data_t) -> c_int;
pub type plugin_write_cb =
    unsafe extern "C" fn(ds: *const data_set_t, vl: *const value_list_t, ud: *mut user_data_t) -> c_int;
pub type plugin_shutdown_cb = unsafe extern "C" fn() -> c_int;

// ====== Daemon primitives ======
pub type plugin_register_complex_read_fn = unsafe extern "C" fn(
    group: *const c_char,
    name: *const c_char,
    callback: plugin_read_cb,
    interval: cdtime_t,
    user_data: *const user_data_t,
) -> c_int;
pub type plugin_register_write_fn =
    unsafe extern "C" fn(name: *const c_char, callback: plugin_write_cb, user_data: *const user_data_t) -> c_int;
pub type plugin_register_shutdown_fn = unsafe extern "C" fn(name: *const c_char, callback: plugin_shutdown_cb) -> c_int;
pub type plugin_dispatch_values_fn = unsafe extern "C" fn(vl: *const value_list_t) -> c_int;
pub type plugin_log_fn = unsafe extern "C" fn(level: c_int, format: *const c_char, ...);

pub type meta_data_create_fn = unsafe extern "C" fn() -> *mut meta_data_t;
pub type meta_data_destroy_fn = unsafe extern "C" fn(md: *mut meta_data_t);
pub type meta_data_add_string_fn =
    unsafe extern "C" fn(md: *mut meta_data_t, key: *const c_char, value: *const c_char) -> c_int;
pub type meta_data_add_signed_int_fn = unsafe extern "C" fn(md: *mut meta_data_t, key: *const c_char, value: i64) -> c_int;
pub type meta_data_add_unsigned_int_fn =
    unsafe extern "C" fn(md: *mut meta_data_t, key: *const c_char, value: u64) -> c_int;
pub type meta_data_add_double_fn = unsafe extern "C" fn(md: *mut meta_data_t, key: *const c_char, value: f64) -> c_int;
pub type meta_data_add_boolean_fn = unsafe extern "C" fn(md: *mut meta_data_t, key: *const c_char, value: bool) -> c_int;
