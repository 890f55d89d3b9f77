//! Metadata attached to value lists.

use std::collections::HashMap;
use std::ptr::NonNull;

use crate::error::CodecError;
use crate::host::Host;
use crate::string::to_cstring;
use crate::sys::meta_data_t;

/// Metadata of a value list: an unordered mapping from keys to [`MetaValue`]s.
pub type Metadata = HashMap<String, MetaValue>;

/// A metadata value, one of the kinds that the daemon supports.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Signed(i64),
    Unsigned(u64),
    Double(f64),
    String(String),
    Bool(bool),
}

impl MetaValue {
    pub fn kind(&self) -> &'static str {
        match self {
            MetaValue::Signed(_) => "signed_int",
            MetaValue::Unsigned(_) => "unsigned_int",
            MetaValue::Double(_) => "double",
            MetaValue::String(_) => "string",
            MetaValue::Bool(_) => "boolean",
        }
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Signed(value)
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        MetaValue::Unsigned(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Double(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::String(value.to_owned())
    }
}

impl TryFrom<toml::Value> for MetaValue {
    type Error = CodecError;

    /// Converts a scalar TOML value. Datetimes, arrays and tables have no native equivalent.
    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::String(s) => Ok(MetaValue::String(s)),
            toml::Value::Integer(i) => Ok(MetaValue::Signed(i)),
            toml::Value::Float(f) => Ok(MetaValue::Double(f)),
            toml::Value::Boolean(b) => Ok(MetaValue::Bool(b)),
            other => Err(CodecError::UnsupportedValueKind(other.type_str().to_owned())),
        }
    }
}

/// Builds [`Metadata`] from a TOML table, for instance a section of the plugin's configuration.
pub fn from_toml_table(table: &toml::Table) -> Result<Metadata, CodecError> {
    table
        .iter()
        .map(|(k, v)| Ok((k.clone(), MetaValue::try_from(v.clone())?)))
        .collect()
}

/// A native metadata container, owned by the bridge.
///
/// The container is destroyed when `NativeMeta` is dropped, hence on every path:
/// after a successful dispatch, after a rejected dispatch, or in the middle of [`NativeMeta::encode`].
pub struct NativeMeta<'h> {
    host: &'h dyn Host,
    ptr: NonNull<meta_data_t>,
}

impl<'h> NativeMeta<'h> {
    /// Allocates a native container and fills it with `meta`.
    ///
    /// The daemon copies the keys and the string values, the temporary C strings are freed
    /// as soon as each entry is added.
    pub fn encode(host: &'h dyn Host, meta: &Metadata) -> Result<NativeMeta<'h>, CodecError> {
        let ptr = NonNull::new(host.meta_data_create()).ok_or(CodecError::MetadataAllocation)?;
        let native = NativeMeta { host, ptr };
        for (key, value) in meta {
            native.add(key, value)?;
        }
        Ok(native)
    }

    fn add(&self, key: &str, value: &MetaValue) -> Result<(), CodecError> {
        let c_key = to_cstring("metadata key", key)?;
        let md = self.ptr.as_ptr();
        let status = unsafe {
            match value {
                MetaValue::Signed(v) => self.host.meta_data_add_signed_int(md, &c_key, *v),
                MetaValue::Unsigned(v) => self.host.meta_data_add_unsigned_int(md, &c_key, *v),
                MetaValue::Double(v) => self.host.meta_data_add_double(md, &c_key, *v),
                MetaValue::Bool(v) => self.host.meta_data_add_boolean(md, &c_key, *v),
                MetaValue::String(v) => {
                    let c_value = to_cstring(&format!("metadata {key:?}"), v)?;
                    self.host.meta_data_add_string(md, &c_key, &c_value)
                }
            }
        };
        if status != 0 {
            return Err(CodecError::MetadataRejected {
                key: key.to_owned(),
                status,
            });
        }
        Ok(())
    }

    pub fn as_ptr(&self) -> *mut meta_data_t {
        self.ptr.as_ptr()
    }
}

impl Drop for NativeMeta<'_> {
    fn drop(&mut self) {
        unsafe { self.host.meta_data_destroy(self.ptr.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{MetaValue, Metadata, NativeMeta, from_toml_table};
    use crate::{error::CodecError, test::MockHost};

    #[test]
    fn encode_every_kind() {
        let host = MockHost::new();
        let meta = Metadata::from([
            ("s".to_owned(), MetaValue::from(-3i64)),
            ("u".to_owned(), MetaValue::from(7u64)),
            ("d".to_owned(), MetaValue::from(0.5)),
            ("str".to_owned(), MetaValue::from("count")),
            ("b".to_owned(), MetaValue::from(true)),
        ]);
        let native = NativeMeta::encode(&host, &meta).unwrap();
        let mut entries = unsafe { MockHost::meta_entries(native.as_ptr()) };
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            vec![
                ("b".to_owned(), MetaValue::Bool(true)),
                ("d".to_owned(), MetaValue::Double(0.5)),
                ("s".to_owned(), MetaValue::Signed(-3)),
                ("str".to_owned(), MetaValue::String("count".to_owned())),
                ("u".to_owned(), MetaValue::Unsigned(7)),
            ],
            entries
        );
        assert_eq!(1, host.live_meta());
        drop(native);
        assert_eq!(0, host.live_meta());
    }

    #[test]
    fn rejected_entry_destroys_container() {
        let host = MockHost::new();
        host.set_meta_add_status(-1);
        let meta = Metadata::from([("unit".to_owned(), MetaValue::from("count"))]);
        let err = NativeMeta::encode(&host, &meta).err().unwrap();
        assert!(matches!(err, CodecError::MetadataRejected { ref key, status: -1 } if key == "unit"));
        assert_eq!(1, host.created_meta());
        assert_eq!(0, host.live_meta());
    }

    #[test]
    fn nul_in_key_destroys_container() {
        let host = MockHost::new();
        let meta = Metadata::from([("a\0b".to_owned(), MetaValue::from(1i64))]);
        let err = NativeMeta::encode(&host, &meta).err().unwrap();
        assert!(matches!(err, CodecError::InteriorNul { .. }));
        assert_eq!(0, host.live_meta());
    }

    #[test]
    fn allocation_failure() {
        let host = MockHost::new();
        host.fail_meta_allocation(true);
        let err = NativeMeta::encode(&host, &Metadata::new()).err().unwrap();
        assert!(matches!(err, CodecError::MetadataAllocation));
    }

    #[test]
    fn toml_values() {
        let table: toml::Table = toml::from_str(
            r#"
            unit = "count"
            scale = 2
            ratio = 0.25
            enabled = false
            "#,
        )
        .unwrap();
        let meta = from_toml_table(&table).unwrap();
        assert_eq!(Some(&MetaValue::from("count")), meta.get("unit"));
        assert_eq!(Some(&MetaValue::Signed(2)), meta.get("scale"));
        assert_eq!(Some(&MetaValue::Double(0.25)), meta.get("ratio"));
        assert_eq!(Some(&MetaValue::Bool(false)), meta.get("enabled"));
    }

    #[test]
    fn toml_unsupported_kinds() {
        for (input, kind) in [("v = [1, 2]", "array"), ("v = { a = 1 }", "table"), ("v = 1979-05-27", "datetime")] {
            let table: toml::Table = toml::from_str(input).unwrap();
            let err = from_toml_table(&table).unwrap_err();
            assert!(
                matches!(err, CodecError::UnsupportedValueKind(ref k) if k == kind),
                "{input}: unexpected {err:?}"
            );
        }
    }
}
