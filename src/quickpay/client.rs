//! HTTP client for the QuickPay v10 REST API.
//!
//! A thin wrapper around `reqwest` that pins the API version headers, HTTP
//! Basic authentication, and form encoding the provider expects, plus typed
//! helpers for the payment endpoints this service uses.
//!
//! # Authentication
//!
//! Every request carries `Authorization: Basic base64(":" + api_key)` - an
//! empty username with the API key as password.
//!
//! # Versioning
//!
//! The `Accept-Version: v10` header selects the API version; responses are
//! JSON (`Accept: application/json`).

use reqwest::{Method, StatusCode, header};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::AppError;
use crate::quickpay::types::Payment;

/// Per-request timeout. Payment operations are synchronous round trips to
/// the acquirer and can take several seconds.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// QuickPay v10 API client.
#[derive(Debug, Clone)]
pub struct QuickPayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl QuickPayClient {
    /// Create a client for the given API base URL and API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("Accept-Version", header::HeaderValue::from_static("v10"));
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Perform a GET request against an API path.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, AppError> {
        self.execute(Method::GET, path, &[]).await
    }

    /// Perform a POST request with form-encoded parameters.
    pub async fn post(&self, path: &str, form: &[(String, String)]) -> Result<ApiResponse, AppError> {
        self.execute(Method::POST, path, form).await
    }

    /// Build and send a request, wrapping the outcome in an [`ApiResponse`].
    ///
    /// Form parameters use bracket-keyed names (`card[token]`,
    /// `variables[order_id]`) the same way PHP's `http_build_query` renders
    /// nested arrays.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<ApiResponse, AppError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut request = self
            .http
            .request(method, &url)
            .basic_auth("", Some(&self.api_key));

        if !form.is_empty() {
            request = request.form(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }

    /// Create a payment shell for an order.
    ///
    /// `POST /payments` with the provider-facing order id and currency. The
    /// local order UUID travels along in `variables[order_id]` so callbacks
    /// can be matched back without relying on the numeric reference alone.
    pub async fn create_payment(
        &self,
        order_reference: &str,
        currency: &str,
        order_id: Uuid,
    ) -> Result<Payment, AppError> {
        let form = vec![
            ("order_id".to_string(), order_reference.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("variables[order_id]".to_string(), order_id.to_string()),
        ];
        self.post("payments", &form).await?.json()
    }

    /// Authorize a payment with a card token from the embedded form.
    ///
    /// `?synchronized` makes the provider wait for the acquirer so the
    /// response carries the operation outcome.
    pub async fn authorize_payment(
        &self,
        payment_id: i64,
        amount_cents: i64,
        card_token: &str,
        auto_capture: bool,
    ) -> Result<Payment, AppError> {
        let form = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("card[token]".to_string(), card_token.to_string()),
            (
                "auto_capture".to_string(),
                if auto_capture { "1" } else { "0" }.to_string(),
            ),
        ];
        self.post(&format!("payments/{}/authorize?synchronized", payment_id), &form)
            .await?
            .json()
    }

    /// Capture an authorized amount.
    pub async fn capture_payment(
        &self,
        payment_id: i64,
        amount_cents: i64,
    ) -> Result<Payment, AppError> {
        let form = vec![("amount".to_string(), amount_cents.to_string())];
        self.post(&format!("payments/{}/capture?synchronized", payment_id), &form)
            .await?
            .json()
    }

    /// Refund a captured amount.
    pub async fn refund_payment(
        &self,
        payment_id: i64,
        amount_cents: i64,
    ) -> Result<Payment, AppError> {
        let form = vec![("amount".to_string(), amount_cents.to_string())];
        self.post(&format!("payments/{}/refund?synchronized", payment_id), &form)
            .await?
            .json()
    }

    /// Cancel an authorized (not yet captured) payment.
    pub async fn cancel_payment(&self, payment_id: i64) -> Result<Payment, AppError> {
        self.post(&format!("payments/{}/cancel?synchronized", payment_id), &[])
            .await?
            .json()
    }

    /// Fetch the current state of a payment.
    pub async fn get_payment(&self, payment_id: i64) -> Result<Payment, AppError> {
        self.get(&format!("payments/{}", payment_id)).await?.json()
    }
}

/// Response wrapper for a QuickPay API call.
///
/// Keeps the raw body so error payloads can be logged verbatim, and decodes
/// JSON only when the caller asks for it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    /// Whether the status code indicates success (<= 299).
    pub fn is_success(&self) -> bool {
        self.status.as_u16() <= 299
    }

    /// Decode the body as a typed JSON value.
    ///
    /// # Errors
    ///
    /// - `AppError::Gateway` when the provider answered with an error status;
    ///   the message is lifted from the error body when present
    /// - `AppError::Gateway` when a success body cannot be decoded
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        if !self.is_success() {
            return Err(AppError::Gateway {
                status: self.status.as_u16(),
                message: self.error_message(),
            });
        }

        serde_json::from_str(&self.body).map_err(|e| AppError::Gateway {
            status: self.status.as_u16(),
            message: format!("Unparseable response body: {}", e),
        })
    }

    /// Best-effort extraction of the provider's error message.
    ///
    /// QuickPay error bodies look like `{"message": "...", "errors": {...}}`.
    /// Falls back to the raw body when that shape is absent.
    fn error_message(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn success_is_any_2xx_status() {
        assert!(response(200, "{}").is_success());
        assert!(response(201, "{}").is_success());
        assert!(!response(400, "{}").is_success());
        assert!(!response(500, "{}").is_success());
    }

    #[test]
    fn json_decodes_payment_on_success() {
        let resp = response(201, r#"{"id": 318559, "order_id": "shop0042", "accepted": false}"#);
        let payment: Payment = resp.json().unwrap();
        assert_eq!(payment.id, 318559);
        assert!(!payment.accepted);
    }

    #[test]
    fn json_maps_error_status_to_gateway_error() {
        let resp = response(400, r#"{"message": "Validation error", "errors": {"currency": ["is invalid"]}}"#);
        match resp.json::<Payment>() {
            Err(AppError::Gateway { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Validation error");
            }
            other => panic!("expected gateway error, got {:?}", other.map(|p| p.id)),
        }
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        let resp = response(500, "upstream exploded");
        match resp.json::<Payment>() {
            Err(AppError::Gateway { message, .. }) => assert_eq!(message, "upstream exploded"),
            other => panic!("expected gateway error, got {:?}", other.map(|p| p.id)),
        }
    }
}
