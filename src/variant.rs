//! Tagged values with an explicit "nothing" state.

use std::mem;
use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::error::{NixError, clear_error, cstring_from_str_lossy, nix_error_t};
use crate::ffi::{guard, read_cstr};
use crate::none::NoneHandle;

/// NIX data type codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(C)]
pub enum DataType {
    Nothing = -1,
    Bool = 0,
    Char = 1,
    Float = 2,
    Double = 3,
    Int8 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    UInt8 = 8,
    UInt16 = 9,
    UInt32 = 10,
    UInt64 = 11,
    String = 12,
    Date = 13,
    DateTime = 14,
    Opaque = 15,
}

/// C name of [`DataType`].
#[allow(non_camel_case_types)]
pub type nix_data_type_t = DataType;

/// A single value of one of the types a NIX property can hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variant {
    #[default]
    Nothing,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
}

/// Types that can be stored in and read back out of a [`Variant`].
pub trait VariantValue: Sized {
    const DATA_TYPE: DataType;

    fn into_variant(self) -> Variant;

    fn from_variant(variant: &Variant) -> Option<Self>;
}

macro_rules! variant_value {
    ($ty:ty, $case:ident) => {
        impl VariantValue for $ty {
            const DATA_TYPE: DataType = DataType::$case;

            fn into_variant(self) -> Variant {
                Variant::$case(self)
            }

            fn from_variant(variant: &Variant) -> Option<Self> {
                match variant {
                    Variant::$case(value) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    };
}

variant_value!(bool, Bool);
variant_value!(i32, Int32);
variant_value!(u32, UInt32);
variant_value!(i64, Int64);
variant_value!(u64, UInt64);
variant_value!(f64, Double);
variant_value!(String, String);

impl Variant {
    pub fn new<T: VariantValue>(value: T) -> Self {
        value.into_variant()
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Nothing => DataType::Nothing,
            Variant::Bool(_) => DataType::Bool,
            Variant::Int32(_) => DataType::Int32,
            Variant::UInt32(_) => DataType::UInt32,
            Variant::Int64(_) => DataType::Int64,
            Variant::UInt64(_) => DataType::UInt64,
            Variant::Double(_) => DataType::Double,
            Variant::String(_) => DataType::String,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Variant::Nothing)
    }

    pub fn set<T: VariantValue>(&mut self, value: T) {
        *self = value.into_variant();
    }

    /// Resets to `Nothing` if `none` is the sentinel handle.
    pub fn set_none(&mut self, none: NoneHandle) -> Result<(), NixError> {
        if !none.is_none() {
            return Err(NixError::NotNoneHandle);
        }
        *self = Variant::Nothing;
        Ok(())
    }

    /// Reads the stored value. No conversion between types is attempted.
    pub fn get<T: VariantValue>(&self) -> Result<T, NixError> {
        T::from_variant(self).ok_or(NixError::TypeMismatch {
            expected: T::DATA_TYPE,
            actual: self.data_type(),
        })
    }

    pub fn swap(&mut self, other: &mut Variant) {
        mem::swap(self, other);
    }

    pub fn supports_type(dtype: DataType) -> bool {
        matches!(
            dtype,
            DataType::Nothing
                | DataType::Bool
                | DataType::Int32
                | DataType::UInt32
                | DataType::Int64
                | DataType::UInt64
                | DataType::Double
                | DataType::String
        )
    }
}

/// Opaque variant handle for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct nix_variant_t {
    _private: [u8; 0],
}

fn into_handle(variant: Variant) -> *mut nix_variant_t {
    log::trace!(target: "nixbind", "allocating {:?} variant", variant.data_type());
    Box::into_raw(Box::new(variant)) as *mut nix_variant_t
}

fn variant_ref<'a>(variant: *const nix_variant_t) -> Result<&'a Variant, NixError> {
    // Safety: variant must be null or a live handle allocated by nixbind.
    unsafe { (variant as *const Variant).as_ref() }
        .ok_or(NixError::NullArgument { field: "variant" })
}

fn variant_mut<'a>(variant: *mut nix_variant_t) -> Result<&'a mut Variant, NixError> {
    // Safety: variant must be null or a live handle allocated by nixbind, not
    // used concurrently from another thread.
    unsafe { (variant as *mut Variant).as_mut() }
        .ok_or(NixError::NullArgument { field: "variant" })
}

fn get_into<T: VariantValue>(
    variant: *const nix_variant_t,
    out_value: *mut T,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("reading variant", out_error, || {
        if out_value.is_null() {
            return Err(NixError::NullArgument { field: "out_value" });
        }
        let value = variant_ref(variant)?.get::<T>()?;
        // Safety: out_value is non-null and points to writable memory.
        unsafe { out_value.write(value) };
        Ok(())
    })
    .is_some()
}

fn set_from<T: VariantValue>(
    variant: *mut nix_variant_t,
    value: T,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("setting variant", out_error, || {
        variant_mut(variant)?.set(value);
        Ok(())
    })
    .is_some()
}

/// Creates a variant holding nothing.
///
/// The returned handle must be released with `nix_variant_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_create() -> *mut nix_variant_t {
    into_handle(Variant::Nothing)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_bool(value: bool) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_int32(value: i32) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_uint32(value: u32) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_int64(value: i64) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_uint64(value: u64) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_double(value: f64) -> *mut nix_variant_t {
    into_handle(Variant::new(value))
}

/// Creates a variant holding a copy of `value`.
///
/// Returns null and writes an error when `value` is null.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_from_string(
    value: *const c_char,
    out_error: *mut *mut nix_error_t,
) -> *mut nix_variant_t {
    clear_error(out_error);
    match guard("creating variant", out_error, || read_cstr(value, "value")) {
        Some(value) => into_handle(Variant::new(value)),
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_bool(
    variant: *mut nix_variant_t,
    value: bool,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_int32(
    variant: *mut nix_variant_t,
    value: i32,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_uint32(
    variant: *mut nix_variant_t,
    value: u32,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_int64(
    variant: *mut nix_variant_t,
    value: i64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_uint64(
    variant: *mut nix_variant_t,
    value: u64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_double(
    variant: *mut nix_variant_t,
    value: f64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    set_from(variant, value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_string(
    variant: *mut nix_variant_t,
    value: *const c_char,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("setting variant", out_error, || {
        let variant = variant_mut(variant)?;
        variant.set(read_cstr(value, "value")?);
        Ok(())
    })
    .is_some()
}

/// Resets the variant to nothing.
///
/// `none` must be the pointer returned by `nix_none_pointer`; any other
/// pointer is rejected and the variant keeps its value.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_set_none(
    variant: *mut nix_variant_t,
    none: *const c_void,
    out_error: *mut *mut nix_error_t,
) -> bool {
    clear_error(out_error);
    guard("clearing variant", out_error, || {
        let result = variant_mut(variant)?.set_none(NoneHandle::from_ptr(none));
        if result.is_err() {
            log::warn!(target: "nixbind", "rejected non-sentinel handle {none:p} for variant");
        }
        result
    })
    .is_some()
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_bool(
    variant: *const nix_variant_t,
    out_value: *mut bool,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_int32(
    variant: *const nix_variant_t,
    out_value: *mut i32,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_uint32(
    variant: *const nix_variant_t,
    out_value: *mut u32,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_int64(
    variant: *const nix_variant_t,
    out_value: *mut i64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_uint64(
    variant: *const nix_variant_t,
    out_value: *mut u64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_double(
    variant: *const nix_variant_t,
    out_value: *mut f64,
    out_error: *mut *mut nix_error_t,
) -> bool {
    get_into(variant, out_value, out_error)
}

/// Returns a copy of the stored string.
///
/// The returned string is heap-allocated and must be freed with `nix_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_get_string(
    variant: *const nix_variant_t,
    out_error: *mut *mut nix_error_t,
) -> *mut c_char {
    clear_error(out_error);
    match guard("reading variant", out_error, || variant_ref(variant)?.get::<String>()) {
        Some(value) => cstring_from_str_lossy(&value).into_raw(),
        None => ptr::null_mut(),
    }
}

/// Returns the stored type, or `Nothing` for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_type(variant: *const nix_variant_t) -> nix_data_type_t {
    variant_ref(variant).map_or(DataType::Nothing, Variant::data_type)
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_is_none(variant: *const nix_variant_t) -> bool {
    variant_ref(variant).map_or(true, Variant::is_none)
}

/// Exchanges the values of two variants. Does nothing if either is null or
/// both are the same handle.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_swap(a: *mut nix_variant_t, b: *mut nix_variant_t) {
    if a == b {
        return;
    }
    if let (Ok(a), Ok(b)) = (variant_mut(a), variant_mut(b)) {
        a.swap(b);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_supports_type(dtype: nix_data_type_t) -> bool {
    Variant::supports_type(dtype)
}

/// Frees a variant handle.
#[unsafe(no_mangle)]
pub extern "C" fn nix_variant_free(variant: *mut nix_variant_t) {
    if variant.is_null() {
        return;
    }
    // Safety: variant must be a valid handle allocated by nixbind.
    let variant = unsafe { Box::from_raw(variant as *mut Variant) };
    log::trace!(target: "nixbind", "freeing {:?} variant", variant.data_type());
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;
    use crate::error::nix_string_free;
    use crate::error::tests::take_message;
    use crate::none::{self, nix_none_pointer};

    #[test]
    fn typed_access() {
        let value = Variant::new(true);
        assert_eq!(value.get::<bool>(), Ok(true));
        assert_eq!(
            value.get::<i32>(),
            Err(NixError::TypeMismatch {
                expected: DataType::Int32,
                actual: DataType::Bool,
            })
        );

        assert_eq!(Variant::new(42i32).get::<i32>(), Ok(42));
        assert!(Variant::new(42i32).get::<i64>().is_err());
        assert_eq!(Variant::new(42i64).get::<i64>(), Ok(42));
        assert_eq!(Variant::new(2.71828).get::<f64>(), Ok(2.71828));

        let text = Variant::new("When shall we three meet again".to_string());
        assert_eq!(text.get::<String>().unwrap(), "When shall we three meet again");
        assert!(text.get::<bool>().is_err());
    }

    #[test]
    fn default_is_nothing() {
        let value = Variant::default();
        assert!(value.is_none());
        assert_eq!(value.data_type(), DataType::Nothing);
    }

    #[test]
    fn swap_exchanges_values() {
        let mut a = Variant::new("Hallo".to_string());
        let mut b = Variant::new(7u64);
        a.swap(&mut b);
        assert_eq!(a, Variant::UInt64(7));
        assert_eq!(b.get::<String>().unwrap(), "Hallo");
    }

    #[test]
    fn set_none_requires_sentinel() {
        let mut value = Variant::new(3u32);
        let other = Box::new(0u8);
        let bogus = NoneHandle::from_ptr(&*other as *const u8 as *const c_void);
        assert_eq!(value.set_none(bogus), Err(NixError::NotNoneHandle));
        assert_eq!(value, Variant::UInt32(3));

        value.set_none(none::handle()).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn supported_types() {
        assert!(Variant::supports_type(DataType::Nothing));
        assert!(Variant::supports_type(DataType::String));
        assert!(!Variant::supports_type(DataType::Opaque));
        assert!(!Variant::supports_type(DataType::Int8));
        assert!(nix_variant_supports_type(DataType::Double));
    }

    #[test]
    fn c_roundtrip_and_mismatch() {
        let variant = nix_variant_from_int32(42);
        assert_eq!(nix_variant_type(variant), DataType::Int32);

        let mut out = 0i32;
        let mut error = ptr::null_mut();
        assert!(nix_variant_get_int32(variant, &mut out, &mut error));
        assert!(error.is_null());
        assert_eq!(out, 42);

        let mut flag = false;
        assert!(!nix_variant_get_bool(variant, &mut flag, &mut error));
        assert!(!flag);
        assert_eq!(take_message(error), "variant holds Int32, not Bool");

        assert!(nix_variant_set_double(variant, 0.5, &mut error));
        assert!(error.is_null());
        let mut real = 0.0;
        assert!(nix_variant_get_double(variant, &mut real, ptr::null_mut()));
        assert_eq!(real, 0.5);

        nix_variant_free(variant);
    }

    #[test]
    fn c_strings() {
        let input = CString::new("mV").unwrap();
        let mut error = ptr::null_mut();
        let variant = nix_variant_from_string(input.as_ptr(), &mut error);
        assert!(error.is_null());

        let copy = nix_variant_get_string(variant, &mut error);
        assert_eq!(unsafe { CStr::from_ptr(copy) }.to_str().unwrap(), "mV");
        nix_string_free(copy);

        assert!(!nix_variant_set_string(variant, ptr::null(), &mut error));
        assert_eq!(take_message(error), "value was null");

        nix_variant_free(variant);

        assert!(nix_variant_from_string(ptr::null(), &mut error).is_null());
        assert_eq!(take_message(error), "value was null");
    }

    #[test]
    fn c_set_none() {
        let variant = nix_variant_from_bool(true);
        let mut error = ptr::null_mut();

        assert!(!nix_variant_set_none(variant, variant as *const c_void, &mut error));
        assert_eq!(take_message(error), "handle is not the none sentinel");
        assert!(!nix_variant_is_none(variant));

        assert!(nix_variant_set_none(variant, nix_none_pointer() as *const c_void, &mut error));
        assert!(error.is_null());
        assert!(nix_variant_is_none(variant));
        assert_eq!(nix_variant_type(variant), DataType::Nothing);

        nix_variant_free(variant);
    }

    #[test]
    fn c_swap() {
        let a = nix_variant_create();
        let b = nix_variant_from_uint64(9);
        nix_variant_swap(a, b);
        assert_eq!(nix_variant_type(a), DataType::UInt64);
        assert!(nix_variant_is_none(b));
        nix_variant_swap(a, a);
        assert_eq!(nix_variant_type(a), DataType::UInt64);
        nix_variant_free(a);
        nix_variant_free(b);
    }

    #[test]
    fn c_unsigned_values() {
        let mut error = ptr::null_mut();
        let variant = nix_variant_from_uint32(u32::MAX);
        assert_eq!(nix_variant_type(variant), DataType::UInt32);

        let mut narrow = 0u32;
        assert!(nix_variant_get_uint32(variant, &mut narrow, &mut error));
        assert_eq!(narrow, u32::MAX);

        let mut wide = 0u64;
        assert!(!nix_variant_get_uint64(variant, &mut wide, &mut error));
        assert_eq!(take_message(error), "variant holds UInt32, not UInt64");

        assert!(nix_variant_set_uint64(variant, u64::MAX, &mut error));
        assert!(nix_variant_get_uint64(variant, &mut wide, &mut error));
        assert!(error.is_null());
        assert_eq!(wide, u64::MAX);
        nix_variant_free(variant);

        let variant = nix_variant_from_uint64(7);
        assert!(nix_variant_get_uint64(variant, &mut wide, &mut error));
        assert_eq!(wide, 7);
        nix_variant_free(variant);
    }

    #[test]
    fn null_handles() {
        let mut error = ptr::null_mut();
        let mut out = 0i64;
        assert!(!nix_variant_get_int64(ptr::null(), &mut out, &mut error));
        assert_eq!(take_message(error), "variant was null");
        assert_eq!(nix_variant_type(ptr::null()), DataType::Nothing);
        assert!(nix_variant_is_none(ptr::null()));
        assert!(!nix_variant_set_int64(ptr::null_mut(), 1, &mut error));
        assert_eq!(take_message(error), "variant was null");
        assert!(!nix_variant_set_bool(ptr::null_mut(), true, &mut error));
        assert_eq!(take_message(error), "variant was null");
        assert!(!nix_variant_set_uint32(ptr::null_mut(), 1, ptr::null_mut()));
        nix_variant_free(ptr::null_mut());
    }

    #[test]
    fn variant_handle_is_not_sentinel() {
        let variant = nix_variant_create();
        assert!(!none::nix_is_none(variant as *const c_void));
        nix_variant_free(variant);
    }
}
