//! Payment methods and transaction initiation

mod methods;
mod transaction;

pub use methods::{PaymentMethod, PaymentMethodSelector};
pub use transaction::{
    BorrowDigitalRequest, ExtendBorrowRequest, InitiatorOutcome, PaymentData, PaymentField,
    TransactionData, TransactionInitiator, TransactionKind,
};
