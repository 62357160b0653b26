//! Backend API envelope types and form-error binding
//!
//! The library backend wraps every response as
//! `{ isSuccess, data?, message?, fieldErrors? }`. This module turns that
//! envelope into a typed [`ActionOutcome`] and binds field errors onto typed
//! form fields instead of looking them up by string.

pub mod binder;
pub mod types;

pub use binder::{FormErrors, FormErrorsView};
pub use types::{ActionOutcome, ApiEnvelope, ErrorKind, FieldErrors, FormField, NoField};
