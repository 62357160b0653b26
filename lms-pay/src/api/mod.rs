//! HTTP API handlers for lms-pay

pub mod dialogs;
pub mod error;
pub mod health;
pub mod payment_methods;
pub mod returns;
pub mod session;
pub mod sse;

pub use dialogs::dialog_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use payment_methods::payment_method_routes;
pub use returns::return_routes;
pub use session::session_routes;
pub use sse::event_stream;
