//! Value lists: the metric batches exchanged with the daemon.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use libc::c_int;
use num_enum::TryFromPrimitive;

use crate::config::FieldOverflow;
use crate::error::CodecError;
use crate::host::Host;
use crate::meta::{MetaValue, Metadata, NativeMeta};
use crate::string::{copy_to_buffer, read_buffer};
use crate::sys::{self, data_set_t, value_list_t, value_t};
use crate::time::CdTime;

/// Identifies a series of values: `host/plugin-plugin_instance/type-type_instance`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    /// Name of the data set (in `types.db`) that describes the values.
    pub type_: String,
    pub type_instance: String,
}

impl Identifier {
    pub fn new(host: impl Into<String>, plugin: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            plugin: plugin.into(),
            type_: type_.into(),
            ..Default::default()
        }
    }

    pub fn with_plugin_instance(mut self, instance: impl Into<String>) -> Self {
        self.plugin_instance = instance.into();
        self
    }

    pub fn with_type_instance(mut self, instance: impl Into<String>) -> Self {
        self.type_instance = instance.into();
        self
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.plugin)?;
        if !self.plugin_instance.is_empty() {
            write!(f, "-{}", self.plugin_instance)?;
        }
        write!(f, "/{}", self.type_)?;
        if !self.type_instance.is_empty() {
            write!(f, "-{}", self.type_instance)?;
        }
        Ok(())
    }
}

/// Kind of a data source, as declared in `types.db`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(i32)]
pub enum DsType {
    Counter = 0,
    Gauge = 1,
    Derive = 2,
}

impl DsType {
    /// Converts the native tag of a data source.
    pub fn from_native(tag: c_int) -> Result<DsType, CodecError> {
        DsType::try_from(tag).map_err(|_| CodecError::UnsupportedDataSourceType(tag))
    }
}

impl FromStr for DsType {
    type Err = CodecError;

    /// Parses a data source kind as written in `types.db`, case-insensitively.
    ///
    /// `ABSOLUTE` and unknown kinds fail with [`CodecError::UnsupportedSampleKind`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COUNTER" => Ok(DsType::Counter),
            "GAUGE" => Ok(DsType::Gauge),
            "DERIVE" => Ok(DsType::Derive),
            _ => Err(CodecError::UnsupportedSampleKind(s.to_owned())),
        }
    }
}

/// A single value of a value list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Monotonically increasing counter. The daemon handles wrap-arounds.
    Counter(u64),
    /// Signed counter, the daemon computes its rate and tolerates resets.
    Derive(i64),
    /// Instantaneous value.
    Gauge(f64),
}

impl Sample {
    pub fn ds_type(&self) -> DsType {
        match self {
            Sample::Counter(_) => DsType::Counter,
            Sample::Derive(_) => DsType::Derive,
            Sample::Gauge(_) => DsType::Gauge,
        }
    }

    fn to_native(self) -> value_t {
        match self {
            Sample::Counter(v) => value_t { counter: v },
            Sample::Derive(v) => value_t { derive: v },
            Sample::Gauge(v) => value_t { gauge: v },
        }
    }

    /// Reads `value` as a sample of kind `ds_type`.
    fn from_native(value: &value_t, ds_type: DsType) -> Sample {
        // every field of the union is a plain 64-bit number, any bit pattern is valid
        unsafe {
            match ds_type {
                DsType::Counter => Sample::Counter(value.counter),
                DsType::Derive => Sample::Derive(value.derive),
                DsType::Gauge => Sample::Gauge(value.gauge),
            }
        }
    }
}

/// A batch of values, with the identifier and the time they refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList {
    pub identifier: Identifier,
    /// When the values have been measured. The epoch means "now", the daemon fills it.
    pub time: SystemTime,
    /// Interval between two measurements. Zero means the daemon's interval.
    pub interval: Duration,
    pub values: Vec<Sample>,
    pub metadata: Metadata,
    /// Names of the data sources, in the same order as `values`.
    /// Only filled for the value lists received by write callbacks.
    pub ds_names: Vec<String>,
}

impl ValueList {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            time: UNIX_EPOCH,
            interval: Duration::ZERO,
            values: Vec::new(),
            metadata: Metadata::new(),
            ds_names: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: SystemTime) -> Self {
        self.time = time;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_value(mut self, value: Sample) -> Self {
        self.values.push(value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A native value list built from a [`ValueList`].
///
/// The record points to memory owned by this struct (the value array and the metadata container),
/// which is released when it is dropped. It must therefore outlive every use of [`as_raw`](Self::as_raw).
pub struct NativeValueList<'h> {
    raw: value_list_t,
    values: Vec<value_t>,
    meta: Option<NativeMeta<'h>>,
}

impl<'h> NativeValueList<'h> {
    /// Converts `vl` to its native counterpart.
    ///
    /// Metadata is only attached when `vl.metadata` is not empty.
    pub fn encode(host: &'h dyn Host, vl: &ValueList, overflow: FieldOverflow) -> Result<Self, CodecError> {
        let mut raw = value_list_t::default();
        let id = &vl.identifier;
        copy_to_buffer("host", &id.host, &mut raw.host, overflow)?;
        copy_to_buffer("plugin", &id.plugin, &mut raw.plugin, overflow)?;
        copy_to_buffer("plugin_instance", &id.plugin_instance, &mut raw.plugin_instance, overflow)?;
        copy_to_buffer("type", &id.type_, &mut raw.type_, overflow)?;
        copy_to_buffer("type_instance", &id.type_instance, &mut raw.type_instance, overflow)?;
        raw.time = CdTime::from(vl.time).0;
        raw.interval = CdTime::from(vl.interval).0;

        let meta = if vl.metadata.is_empty() {
            None
        } else {
            Some(NativeMeta::encode(host, &vl.metadata)?)
        };

        let mut values: Vec<value_t> = vl.values.iter().map(|v| v.to_native()).collect();
        // the heap buffer of the Vec does not move when the struct moves
        raw.values = if values.is_empty() {
            std::ptr::null_mut()
        } else {
            values.as_mut_ptr()
        };
        raw.values_len = values.len();
        raw.meta = meta.as_ref().map_or(std::ptr::null_mut(), NativeMeta::as_ptr);

        Ok(NativeValueList { raw, values, meta })
    }

    pub fn as_raw(&self) -> &value_list_t {
        &self.raw
    }

    pub fn has_metadata(&self) -> bool {
        self.meta.is_some()
    }
}

/// Reads a value list delivered by the daemon, using the data set `ds` to interpret its values.
///
/// No value list is returned if one data source has an unsupported type:
/// callers must not act on a partial batch. Metadata is not decoded.
///
/// # Safety
/// `vl` and `ds` must be NULL or point to valid records, as they are during a write callback.
pub unsafe fn decode(vl: *const value_list_t, ds: *const data_set_t) -> Result<ValueList, CodecError> {
    let (vl, ds) = match unsafe { (vl.as_ref(), ds.as_ref()) } {
        (Some(vl), Some(ds)) => (vl, ds),
        _ => return Err(CodecError::NullRecord),
    };
    if vl.values_len < ds.ds_num {
        return Err(CodecError::ValueCountMismatch {
            expected: ds.ds_num,
            actual: vl.values_len,
        });
    }

    let identifier = Identifier {
        host: read_buffer(&vl.host),
        plugin: read_buffer(&vl.plugin),
        plugin_instance: read_buffer(&vl.plugin_instance),
        type_: read_buffer(&vl.type_),
        type_instance: read_buffer(&vl.type_instance),
    };
    let mut batch = ValueList::new(identifier)
        .with_time(CdTime(vl.time).as_system_time())
        .with_interval(CdTime(vl.interval).as_duration());
    if ds.ds_num == 0 {
        return Ok(batch);
    }
    if ds.ds.is_null() || vl.values.is_null() {
        return Err(CodecError::NullRecord);
    }

    let sources = unsafe { std::slice::from_raw_parts(ds.ds, ds.ds_num) };
    let values = unsafe { std::slice::from_raw_parts(vl.values, ds.ds_num) };
    batch.values.reserve(sources.len());
    batch.ds_names.reserve(sources.len());
    for (source, value) in sources.iter().zip(values) {
        let ds_type = DsType::from_native(source.type_)?;
        batch.values.push(Sample::from_native(value, ds_type));
        batch.ds_names.push(read_buffer(&source.name));
    }
    Ok(batch)
}
