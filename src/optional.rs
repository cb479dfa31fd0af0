//! Optional scalars for fields such as units, definitions and extents.
//!
//! The wrapper layer reads these with `is_present`/`get` and clears them by
//! assigning the `none` sentinel.

use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::error::{NixError, clear_error, cstring_from_str_lossy, nix_error_t};
use crate::ffi::{guard, read_cstr};
use crate::none::NoneHandle;

/// Clears `slot` if `none` is the sentinel handle.
pub fn assign_none<T>(slot: &mut Option<T>, none: NoneHandle) -> Result<(), NixError> {
    if !none.is_none() {
        return Err(NixError::NotNoneHandle);
    }
    *slot = None;
    Ok(())
}

/// Opaque optional double handle for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_optional_double_t {
    _private: [u8; 0],
}

/// Opaque optional string handle for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_optional_string_t {
    _private: [u8; 0],
}

fn slot_ref<'a, H, T>(handle: *const H) -> Result<&'a Option<T>, NixError> {
    // Safety: handle must be null or a live handle of the matching kind.
    unsafe { (handle as *const Option<T>).as_ref() }
        .ok_or(NixError::NullArgument { field: "optional" })
}

fn slot_mut<'a, H, T>(handle: *mut H) -> Result<&'a mut Option<T>, NixError> {
    // Safety: handle must be null or a live handle of the matching kind, not
    // used concurrently from another thread.
    unsafe { (handle as *mut Option<T>).as_mut() }
        .ok_or(NixError::NullArgument { field: "optional" })
}

fn into_handle<H, T>(value: Option<T>) -> *mut H {
    Box::into_raw(Box::new(value)) as *mut H
}

fn free_handle<H, T>(handle: *mut H) {
    if handle.is_null() {
        return;
    }
    // Safety: handle must be a valid handle of the matching kind.
    unsafe {
        drop(Box::from_raw(handle as *mut Option<T>));
    }
}

fn assign_none_handle<H, T>(
    handle: *mut H,
    none: *const c_void,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("clearing optional", out_error, || {
        let result = assign_none(slot_mut::<H, T>(handle)?, NoneHandle::from_ptr(none));
        if result.is_err() {
            log::warn!(target: "nixbind", "rejected non-sentinel handle {none:p} for optional");
        }
        result
    })
    .is_some()
}

/// Creates an empty optional double.
///
/// The returned handle must be released with `nix_optional_double_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_create_empty() -> *mut nix_optional_double_t {
    into_handle::<_, f64>(None)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_from(value: f64) -> *mut nix_optional_double_t {
    into_handle(Some(value))
}

/// Returns false for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_is_present(optional: *const nix_optional_double_t) -> bool {
    slot_ref::<_, f64>(optional).is_ok_and(Option::is_some)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_get(
    optional: *const nix_optional_double_t,
    out_value: *mut f64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("reading optional", out_error, || {
        if out_value.is_null() {
            return Err(NixError::NullArgument { field: "out_value" });
        }
        let value = slot_ref::<_, f64>(optional)?.ok_or(NixError::Absent)?;
        // Safety: out_value is non-null and points to writable memory.
        unsafe { out_value.write(value) };
        Ok(())
    })
    .is_some()
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_assign(
    optional: *mut nix_optional_double_t,
    value: f64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("assigning optional", out_error, || {
        *slot_mut::<_, f64>(optional)? = Some(value);
        Ok(())
    })
    .is_some()
}

/// Clears the value. `none` must be the pointer returned by `nix_none_pointer`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_assign_none(
    optional: *mut nix_optional_double_t,
    none: *const c_void,
    out_error: *mut *mut nix_error_t,
) -> bool {
    assign_none_handle::<_, f64>(optional, none, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_double_free(optional: *mut nix_optional_double_t) {
    free_handle::<_, f64>(optional);
}

/// Creates an empty optional string.
///
/// The returned handle must be released with `nix_optional_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_create_empty() -> *mut nix_optional_string_t {
    into_handle::<_, String>(None)
}

/// Creates an optional string holding a copy of `value`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_from(
    value: *const c_char,
    out_error: *mut *mut nix_error_t,
) -> *mut nix_optional_string_t {
    clear_error(out_error);
    match guard("creating optional", out_error, || read_cstr(value, "value")) {
        Some(value) => into_handle(Some(value)),
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_is_present(optional: *const nix_optional_string_t) -> bool {
    slot_ref::<_, String>(optional).is_ok_and(Option::is_some)
}

/// Returns a copy of the stored string, or null with an error if absent.
///
/// The returned string is heap-allocated and must be freed with `nix_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_get(
    optional: *const nix_optional_string_t,
    out_error: *mut *mut nix_error_t,
) -> *mut c_char {
    clear_error(out_error);
    let value = guard("reading optional", out_error, || {
        slot_ref::<_, String>(optional)?
            .as_deref()
            .map(cstring_from_str_lossy)
            .ok_or(NixError::Absent)
    });
    value.map_or(ptr::null_mut(), |value| value.into_raw())
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_assign(
    optional: *mut nix_optional_string_t,
    value: *const c_char,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("assigning optional", out_error, || {
        let slot = slot_mut::<_, String>(optional)?;
        *slot = Some(read_cstr(value, "value")?);
        Ok(())
    })
    .is_some()
}

/// Clears the value. `none` must be the pointer returned by `nix_none_pointer`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_assign_none(
    optional: *mut nix_optional_string_t,
    none: *const c_void,
    out_error: *mut *mut nix_error_t,
) -> bool {
    assign_none_handle::<_, String>(optional, none, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_optional_string_free(optional: *mut nix_optional_string_t) {
    free_handle::<_, String>(optional);
}
