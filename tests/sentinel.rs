use std::os::raw::c_void;
use std::ptr;
use std::thread;

use nixbind::none::{self, nix_is_none, nix_none_pointer};
use nixbind::optional::{nix_optional_double_free, nix_optional_double_from};
use nixbind::variant::{nix_variant_free, nix_variant_from_int64};

#[test]
fn repeated_calls_return_the_same_handle() {
    let a = nix_none_pointer();
    let b = nix_none_pointer();
    assert_eq!(a, b);
    assert!(!a.is_null());
    assert_eq!(none::handle().as_ptr(), a as *const c_void);
}

#[test]
fn concurrent_callers_agree() {
    let expected = nix_none_pointer() as usize;
    let handles: Vec<usize> = thread::scope(|scope| {
        let workers: Vec<_> = (0..100)
            .map(|_| scope.spawn(|| nix_none_pointer() as usize))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });
    assert_eq!(handles.len(), 100);
    assert!(handles.iter().all(|&handle| handle == expected));
}

#[test]
fn values_never_alias_the_sentinel() {
    let sentinel = nix_none_pointer() as *const c_void;
    let variant = nix_variant_from_int64(-1);
    let optional = nix_optional_double_from(1.0);

    assert_ne!(variant as *const c_void, sentinel);
    assert_ne!(optional as *const c_void, sentinel);
    assert!(!nix_is_none(variant as *const c_void));
    assert!(!nix_is_none(optional as *const c_void));
    assert!(!nix_is_none(ptr::null()));
    assert!(nix_is_none(sentinel));

    nix_variant_free(variant);
    nix_optional_double_free(optional);
}
