//! Payment countdown and status reconciliation

mod driver;
mod state;

pub use driver::{Countdown, CountdownExit, CountdownHandle};
pub use state::{CountdownEvent, PaymentStates, Transition};
