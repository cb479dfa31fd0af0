use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::variant::DataType;

/// Errors reported by nixbind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NixError {
    #[error("{field} was null")]
    NullArgument { field: &'static str },

    #[error("variant holds {actual:?}, not {expected:?}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("optional value is not present")]
    Absent,

    /// A handle passed where the none sentinel was required.
    #[error("handle is not the none sentinel")]
    NotNoneHandle,

    #[error("panic while {context}")]
    Panic { context: &'static str },

    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidLogFilter { filter: String, reason: String },

    #[error("logging already initialized by another logger")]
    LoggerConflict,
}

/// Opaque error type for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_error_t {
    _private: [u8; 0],
}

struct ErrorHandle {
    message: CString,
}

pub(crate) fn cstring_from_str_lossy(value: &str) -> CString {
    let sanitized = value.replace('\0', " ");
    // Interior NULs were replaced above, so this cannot fail.
    CString::new(sanitized).unwrap_or_default()
}

pub(crate) fn clear_error(out_error: *mut *mut nix_error_t) {
    if !out_error.is_null() {
        // Safety: caller provided a valid out_error pointer.
        unsafe {
            *out_error = ptr::null_mut();
        }
    }
}

pub(crate) fn write_error(out_error: *mut *mut nix_error_t, error: NixError) {
    if out_error.is_null() {
        return;
    }
    let handle = Box::new(ErrorHandle {
        message: cstring_from_str_lossy(&error.to_string()),
    });
    // Safety: out_error is non-null and points to writable memory.
    unsafe {
        *out_error = Box::into_raw(handle) as *mut nix_error_t;
    }
}

/// Returns the message for an error allocated by nixbind.
///
/// The returned pointer is valid as long as the error handle is alive.
#[unsafe(no_mangle)]
pub extern "C" fn nix_error_message(error: *const nix_error_t) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    // Safety: error must be a valid handle allocated by nixbind.
    let handle = unsafe { &*(error as *const ErrorHandle) };
    handle.message.as_ptr()
}

/// Frees an error returned by nixbind.
#[unsafe(no_mangle)]
pub extern "C" fn nix_error_free(error: *mut nix_error_t) {
    if error.is_null() {
        return;
    }
    // Safety: error must be a valid handle allocated by nixbind.
    unsafe {
        drop(Box::from_raw(error as *mut ErrorHandle));
    }
}

/// Frees a string allocated by nixbind.
#[unsafe(no_mangle)]
pub extern "C" fn nix_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    // Safety: value must be a string returned by a nixbind getter.
    unsafe {
        drop(CString::from_raw(value));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::ffi::CStr;

    use super::*;

    /// Reads and frees an error written by a nixbind call.
    pub(crate) fn take_message(error: *mut nix_error_t) -> String {
        assert!(!error.is_null(), "expected an error to be written");
        let message = unsafe { CStr::from_ptr(nix_error_message(error)) }
            .to_string_lossy()
            .into_owned();
        nix_error_free(error);
        message
    }

    #[test]
    fn write_and_read_error() {
        let mut error = ptr::null_mut();
        write_error(&mut error, NixError::NullArgument { field: "value" });
        assert_eq!(take_message(error), "value was null");
    }

    #[test]
    fn clear_resets_pointer() {
        let mut error = ptr::null_mut();
        write_error(&mut error, NixError::Absent);
        let written = error;
        clear_error(&mut error);
        assert!(error.is_null());
        nix_error_free(written);
    }

    #[test]
    fn null_out_error_is_ignored() {
        write_error(ptr::null_mut(), NixError::Absent);
        clear_error(ptr::null_mut());
        assert!(nix_error_message(ptr::null()).is_null());
        nix_error_free(ptr::null_mut());
        nix_string_free(ptr::null_mut());
    }

    #[test]
    fn interior_nul_is_sanitized() {
        let value = cstring_from_str_lossy("a\0b");
        assert_eq!(value.to_str().unwrap(), "a b");
    }

    #[test]
    fn type_mismatch_message() {
        let error = NixError::TypeMismatch {
            expected: DataType::Int32,
            actual: DataType::Bool,
        };
        assert_eq!(error.to_string(), "variant holds Bool, not Int32");
    }
}
