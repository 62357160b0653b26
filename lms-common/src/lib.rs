//! # LMS Common Library
//!
//! Shared code for the library management system services including:
//! - Error and result types
//! - Bootstrap configuration loading
//! - Event types (LmsEvent enum) and the EventBus
//! - Backend API envelope types and the form-error binder
//! - The injected session context
//! - Time and SSE utilities

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, LmsEvent, PaymentStatus, ResolutionSource};
pub use session::SessionContext;
