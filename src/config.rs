//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `QUICKPAY_MERCHANT_ID` (required): Merchant account id from the QuickPay admin
/// - `QUICKPAY_AGREEMENT_ID` (required): Payment Window agreement id. The
///   payment-window checksum must be signed with the window API key
///   belonging to this agreement.
/// - `QUICKPAY_API_KEY` (required): API user key, authenticates REST calls
/// - `QUICKPAY_WINDOW_API_KEY` (required): Payment Window API key belonging
///   to the agreement; signs outgoing payment-window parameters
/// - `QUICKPAY_PRIVATE_KEY` (required): Merchant private key (verifies the
///   `QuickPay-Checksum-Sha256` header on callbacks)
/// - `QUICKPAY_API_URL` (optional): API base, defaults to `https://api.quickpay.net/`
/// - `ORDER_ID_PREFIX` (optional): Prefix for provider order ids. Order ids must
///   be unique when sent to QuickPay; use this to resolve clashes between shops.
/// - `CONTINUE_URL` / `CANCEL_URL` / `CALLBACK_URL` (required): Absolute URLs the
///   payment window redirects (or POSTs the callback) to
/// - `LANGUAGE` (optional): Payment window language, defaults to "en"
/// - `CURRENCY` (optional): Default order currency, defaults to "DKK"
/// - `AUTOCAPTURE` (optional): Capture immediately after authorize, defaults to false
/// - `TEST_MODE` (optional): Run transactions in test mode, defaults to false.
///   Provider order ids get a `T` appended to the prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub quickpay_merchant_id: String,
    pub quickpay_agreement_id: String,
    pub quickpay_api_key: String,
    pub quickpay_window_api_key: String,
    pub quickpay_private_key: String,

    #[serde(default = "default_api_url")]
    pub quickpay_api_url: String,

    #[serde(default)]
    pub order_id_prefix: String,

    pub continue_url: String,
    pub cancel_url: String,
    pub callback_url: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub autocapture: bool,

    #[serde(default)]
    pub test_mode: bool,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// QuickPay API v10 base URL.
fn default_api_url() -> String {
    "https://api.quickpay.net/".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_currency() -> String {
    "DKK".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - QuickPay keys contain characters outside `[a-zA-Z0-9_]`
    /// - Any redirect/callback URL is not an absolute http(s) URL
    pub fn from_env() -> Result<Self, AppError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        let config =
            envy::from_env::<Config>().map_err(|e| AppError::Configuration(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate QuickPay credentials and redirect URLs.
    ///
    /// Mirrors the checks the merchant admin form performs: keys must match
    /// `^[a-zA-Z0-9_]+$`, and the continue/cancel/callback URLs must be
    /// absolute http(s) URLs (the payment window rejects anything else).
    fn validate(&self) -> Result<(), AppError> {
        for (name, key) in [
            ("QUICKPAY_MERCHANT_ID", &self.quickpay_merchant_id),
            ("QUICKPAY_AGREEMENT_ID", &self.quickpay_agreement_id),
            ("QUICKPAY_API_KEY", &self.quickpay_api_key),
            ("QUICKPAY_WINDOW_API_KEY", &self.quickpay_window_api_key),
            ("QUICKPAY_PRIVATE_KEY", &self.quickpay_private_key),
        ] {
            if !is_valid_key(key) {
                return Err(AppError::Configuration(format!(
                    "{} does not appear to be a valid QuickPay key",
                    name
                )));
            }
        }

        for (name, value) in [
            ("CONTINUE_URL", &self.continue_url),
            ("CANCEL_URL", &self.cancel_url),
            ("CALLBACK_URL", &self.callback_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|_| AppError::Configuration(format!("{} is not a valid URL", name)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(AppError::Configuration(format!(
                    "{} must use http or https",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Prefix applied to provider order ids.
    ///
    /// In test mode a `T` is appended so test transactions never clash with
    /// production order ids on the same QuickPay account.
    pub fn order_reference_prefix(&self) -> String {
        if self.test_mode {
            format!("{}T", self.order_id_prefix)
        } else {
            self.order_id_prefix.clone()
        }
    }

    /// Build the provider-facing order id for a local order number.
    ///
    /// QuickPay requires order ids of 4-20 characters, unique per merchant.
    /// Order numbers are zero-padded to satisfy the minimum length.
    pub fn order_reference(&self, order_number: i64) -> String {
        format!("{}{:04}", self.order_reference_prefix(), order_number)
    }
}

/// Validate a QuickPay key (merchant id, agreement id, API or private key).
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/qp".to_string(),
            server_port: 3000,
            quickpay_merchant_id: "12345".to_string(),
            quickpay_agreement_id: "67890".to_string(),
            quickpay_api_key: "api_user_key".to_string(),
            quickpay_window_api_key: "window_key".to_string(),
            quickpay_private_key: "private_key".to_string(),
            quickpay_api_url: default_api_url(),
            order_id_prefix: "shop".to_string(),
            continue_url: "https://example.com/checkout/complete".to_string(),
            cancel_url: "https://example.com/checkout/cancel".to_string(),
            callback_url: "https://example.com/callbacks/quickpay".to_string(),
            language: "en".to_string(),
            currency: "DKK".to_string(),
            autocapture: false,
            test_mode: false,
        }
    }

    #[test]
    fn order_reference_pads_to_minimum_length() {
        let cfg = config();
        assert_eq!(cfg.order_reference(7), "shop0007");
        assert_eq!(cfg.order_reference(123456), "shop123456");
    }

    #[test]
    fn test_mode_appends_marker_to_prefix() {
        let mut cfg = config();
        cfg.test_mode = true;
        // The numeric suffix must survive so callbacks can resolve the order.
        assert_eq!(cfg.order_reference(42), "shopT0042");
    }

    #[test]
    fn rejects_keys_with_invalid_characters() {
        let mut cfg = config();
        cfg.quickpay_api_key = "key with spaces".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.quickpay_window_api_key = "window-key!".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_http_callback_urls() {
        let mut cfg = config();
        cfg.callback_url = "ftp://example.com/cb".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(config().validate().is_ok());
    }
}
