//! Conversions between Rust strings and the daemon's C strings.

use std::ffi::CString;

use libc::c_char;

use crate::config::FieldOverflow;
use crate::error::CodecError;

/// Copies `value` into the fixed-size buffer `dst`, which is always left NUL-terminated.
///
/// At most `dst.len() - 1` bytes fit. Longer values are rejected or truncated on a
/// character boundary, depending on `overflow`. Values containing a NUL byte are always rejected,
/// the daemon would silently cut them.
pub(crate) fn copy_to_buffer(
    field: &str,
    value: &str,
    dst: &mut [c_char],
    overflow: FieldOverflow,
) -> Result<(), CodecError> {
    if value.as_bytes().contains(&0) {
        return Err(CodecError::InteriorNul { field: field.to_owned() });
    }
    let max = dst.len().saturating_sub(1);
    let bytes = if value.len() <= max {
        value.as_bytes()
    } else {
        match overflow {
            FieldOverflow::Reject => {
                return Err(CodecError::FieldTooLong {
                    field: field.to_owned(),
                    len: value.len(),
                    max,
                });
            }
            FieldOverflow::Truncate => {
                let mut end = max;
                while !value.is_char_boundary(end) {
                    end -= 1;
                }
                log::debug!("truncating {field} to {end} bytes");
                &value.as_bytes()[..end]
            }
        }
    };
    dst.fill(0);
    for (d, b) in dst.iter_mut().zip(bytes) {
        *d = *b as c_char;
    }
    Ok(())
}

/// Reads a fixed-size buffer filled by the daemon.
///
/// The buffer is not trusted to contain a NUL byte: reading stops at the first NUL or at the end
/// of the buffer. Invalid UTF-8 is replaced.
pub(crate) fn read_buffer(src: &[c_char]) -> String {
    // c_char and u8 have the same size and alignment
    let bytes: &[u8] = unsafe { std::slice::from_raw_parts(src.as_ptr().cast::<u8>(), src.len()) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Builds an owned C string, for values that are passed by pointer (names, metadata).
pub(crate) fn to_cstring(field: &str, value: &str) -> Result<CString, CodecError> {
    CString::new(value).map_err(|_| CodecError::InteriorNul { field: field.to_owned() })
}

/// Builds a message for the daemon's log. NUL bytes are replaced so that nothing is lost.
pub(crate) fn log_message(message: &str) -> CString {
    if message.as_bytes().contains(&0) {
        CString::new(message.replace('\0', "\\0")).unwrap_or_default()
    } else {
        CString::new(message).unwrap_or_default()
    }
}
