//! Shared utilities for nixbind's C FFI bindings.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{NixError, nix_error_t, write_error};

pub(crate) fn read_cstr(value: *const c_char, field: &'static str) -> Result<String, NixError> {
    if value.is_null() {
        return Err(NixError::NullArgument { field });
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Ok(cstr.to_string_lossy().into_owned())
}

/// Runs `f`, reporting its error or a caught panic through `out_error`.
pub(crate) fn guard<T>(
    context: &'static str,
    out_error: *mut *mut nix_error_t,
    f: impl FnOnce() -> Result<T, NixError>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            log::debug!(target: "nixbind", "{context} failed: {err}");
            write_error(out_error, err);
            None
        }
        Err(_) => {
            write_error(out_error, NixError::Panic { context });
            None
        }
    }
}
