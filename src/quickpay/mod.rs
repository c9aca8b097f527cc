//! QuickPay v10 API integration.
//!
//! Everything that talks to (or verifies traffic from) the payment provider
//! lives here:
//!
//! - `client`: thin HTTP client for `https://api.quickpay.net/`
//! - `types`: the provider's payment JSON objects
//! - `checksum`: parameter flattening and HMAC-SHA256 signing
//! - `window`: hosted payment-window field building

pub mod checksum;
pub mod client;
pub mod types;
pub mod window;
