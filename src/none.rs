//! The process-wide `none` sentinel.
//!
//! NIX represents "no value" for optional fields and variants with a single
//! global `none` object. Wrapper layers in other languages cannot construct
//! it themselves; they ask for its address once and compare incoming handles
//! against that address.
//!
//! The sentinel lives in a const-initialized `static`, so it exists before any
//! caller can reach [`nix_none_pointer`] and is never moved or dropped. Its
//! address is stable for the lifetime of the process but not across runs.

use std::os::raw::c_void;

/// The absence marker.
///
/// Has a non-zero size: zero-sized statics are allowed to share an address
/// with other objects, which would make identity comparison meaningless.
#[derive(Debug)]
#[repr(C)]
pub struct NoneT {
    _private: u8,
}

/// C name of [`NoneT`].
#[allow(non_camel_case_types)]
pub type nix_none_t = NoneT;

static NONE: NoneT = NoneT { _private: 0 };

/// Returns the sentinel.
pub fn none() -> &'static NoneT {
    &NONE
}

/// Returns the handle identifying the sentinel.
pub fn handle() -> NoneHandle {
    NoneHandle::from_ptr(none() as *const NoneT as *const c_void)
}

/// Opaque address-sized token, comparable for equality only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoneHandle(usize);

impl NoneHandle {
    pub fn from_ptr(ptr: *const c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }

    /// Whether this handle is the sentinel.
    pub fn is_none(self) -> bool {
        self == handle()
    }
}

impl NoneT {
    pub fn handle(&'static self) -> NoneHandle {
        NoneHandle::from_ptr(self as *const NoneT as *const c_void)
    }
}

/// Returns the address of the `none` sentinel.
///
/// Every call returns the same pointer. The pointer must only be compared,
/// never dereferenced or freed.
#[unsafe(no_mangle)]
pub extern "C" fn nix_none_pointer() -> *const nix_none_t {
    none()
}

/// Returns true when `handle` is the `none` sentinel. Null is not.
#[unsafe(no_mangle)]
pub extern "C" fn nix_is_none(handle: *const c_void) -> bool {
    NoneHandle::from_ptr(handle).is_none()
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;

    #[test]
    fn pointer_is_stable() {
        let a = nix_none_pointer();
        let b = nix_none_pointer();
        assert_eq!(a, b);
        assert_eq!(handle(), NoneHandle::from_ptr(a as *const c_void));
        assert_eq!(none().handle(), handle());
    }

    #[test]
    fn sentinel_is_recognized() {
        assert!(nix_is_none(nix_none_pointer() as *const c_void));
        assert!(handle().is_none());
    }

    #[test]
    fn null_is_not_none() {
        assert!(!nix_is_none(ptr::null()));
        assert_ne!(handle().as_ptr(), ptr::null());
    }

    #[test]
    fn other_objects_are_not_none() {
        let local = NoneT { _private: 0 };
        let boxed = Box::new(0u8);
        assert!(!NoneHandle::from_ptr(&local as *const NoneT as *const c_void).is_none());
        assert!(!nix_is_none(&*boxed as *const u8 as *const c_void));
    }
}
