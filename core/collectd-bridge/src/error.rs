use std::fmt;

use libc::c_int;
use thiserror::Error;

use crate::host::HostError;

/// An error that can occur when converting values to or from their native representation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("metadata values of kind {0} are not supported")]
    UnsupportedValueKind(String),
    /// Only returned when parsing a [`DsType`](crate::DsType) from its `types.db` name.
    #[error("samples of kind {0} are not supported")]
    UnsupportedSampleKind(String),
    #[error("data source type {0} is not supported")]
    UnsupportedDataSourceType(c_int),
    #[error("{field} is {len} bytes long, but at most {max} bytes fit")]
    FieldTooLong { field: String, len: usize, max: usize },
    #[error("{field} contains a NUL byte")]
    InteriorNul { field: String },
    #[error("meta_data_create returned NULL")]
    MetadataAllocation,
    #[error("metadata {key:?} rejected with status {status}")]
    MetadataRejected { key: String, status: c_int },
    #[error("value list holds {actual} values, but its data set describes {expected}")]
    ValueCountMismatch { expected: usize, actual: usize },
    #[error("received a NULL value list or data set")]
    NullRecord,
}

/// An error returned by the registration API and by [`write`](crate::write).
#[derive(Debug, Error)]
pub enum Error {
    #[error("registration of {kind} callback {name:?} failed with status {status}")]
    RegistrationFailed {
        kind: HandlerKind,
        name: String,
        status: c_int,
    },
    #[error("dispatch_values failed with status {status}")]
    DispatchFailed { status: c_int },
    #[error("failed to build the native value list")]
    EncodeFailed(#[from] CodecError),
    #[error("no {kind} handler registered under {name:?}")]
    HandlerNotFound { kind: HandlerKind, name: String },
    #[error("invalid callback name {0:?}: it contains a NUL byte")]
    InvalidName(String),
    #[error("the collectd daemon is not available")]
    HostUnavailable(#[from] HostError),
}

/// The three kinds of callbacks that a plugin can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Read,
    Write,
    Shutdown,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlerKind::Read => "read",
            HandlerKind::Write => "write",
            HandlerKind::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecError, Error, HandlerKind};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn typing() {
        assert_send_sync::<Error>();
        assert_send_sync::<CodecError>();
    }

    #[test]
    fn messages() {
        let err = Error::RegistrationFailed {
            kind: HandlerKind::Read,
            name: String::from("golang_example"),
            status: 1,
        };
        assert_eq!(
            "registration of read callback \"golang_example\" failed with status 1",
            err.to_string()
        );
        let err = Error::from(CodecError::UnsupportedDataSourceType(3));
        assert!(matches!(err, Error::EncodeFailed(CodecError::UnsupportedDataSourceType(3))));
    }
}
