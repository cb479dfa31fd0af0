//! C FFI entry points for nixbind.
//!
//! The library exposes the NIX `none` sentinel together with the value types
//! that use it as their empty state: [`Variant`] and the optional scalar
//! handles in [`optional`].

pub mod error;
mod ffi;
pub mod logging;
pub mod none;
pub mod optional;
pub mod variant;

pub use error::NixError;
pub use none::{NoneHandle, NoneT};
pub use variant::{DataType, Variant};
