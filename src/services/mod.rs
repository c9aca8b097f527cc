//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, provider calls, and order bookkeeping.

pub mod callback_service;
pub mod order_service;
pub mod payment_service;
