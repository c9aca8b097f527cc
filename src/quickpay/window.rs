//! Hosted payment-window form building.
//!
//! For redirect-style checkout the storefront POSTs the shopper to
//! `https://payment.quickpay.net` with a set of hidden fields describing the
//! order, signed with the Payment Window API key. This module assembles that
//! field set from a local order.
//!
//! The checksum is computed over exactly the fields that are posted; empty
//! values are dropped *before* signing so the digest always matches what the
//! provider recomputes on its side.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::config::Config;
use crate::models::order::{Order, OrderItem};
use crate::quickpay::checksum;

/// The hosted payment window endpoint the form posts to.
pub const PAYMENT_WINDOW_URL: &str = "https://payment.quickpay.net";

/// A ready-to-render payment window form.
///
/// # JSON shape
///
/// ```json
/// {
///   "action": "https://payment.quickpay.net",
///   "method": "POST",
///   "fields": {
///     "version": "v10",
///     "merchant_id": "12345",
///     "order_id": "shop0042",
///     "invoice_address[email]": "shopper@example.dk",
///     "basket[0][qty]": "2",
///     "checksum": "..."
///   }
/// }
/// ```
///
/// The storefront renders every entry of `fields` as a hidden input.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentWindowForm {
    pub action: String,
    pub method: String,
    pub fields: BTreeMap<String, String>,
}

/// Build the signed payment-window form for an order.
pub fn build(config: &Config, order: &Order, items: &[OrderItem]) -> PaymentWindowForm {
    let params = window_params(config, order, items);

    let digest = checksum::checksum(&params, &config.quickpay_window_api_key);

    let mut fields: BTreeMap<String, String> = checksum::flatten(&params)
        .into_iter()
        .map(|(key, value)| (form_key(&key), value))
        .collect();
    fields.insert("checksum".to_string(), digest);

    PaymentWindowForm {
        action: PAYMENT_WINDOW_URL.to_string(),
        method: "POST".to_string(),
        fields,
    }
}

/// Assemble the nested parameter set the checksum is computed over.
///
/// Field-for-field the set the original gateway posted: identification and
/// agreement ids, order reference and amount, the three redirect/callback
/// URLs, invoice address, and one basket entry per order line. Empty values
/// are omitted entirely.
fn window_params(config: &Config, order: &Order, items: &[OrderItem]) -> Value {
    let mut params = Map::new();

    let mut put = |key: &str, value: String| {
        if !value.is_empty() {
            params.insert(key.to_string(), Value::String(value));
        }
    };

    put("version", "v10".to_string());
    put("merchant_id", config.quickpay_merchant_id.clone());
    put("agreement_id", config.quickpay_agreement_id.clone());
    put("order_id", config.order_reference(order.order_number));
    put("amount", order.total_cents.to_string());
    put("currency", order.currency.clone());
    put("continueurl", config.continue_url.clone());
    put("cancelurl", config.cancel_url.clone());
    put("callbackurl", config.callback_url.clone());
    put("language", config.language.clone());
    put(
        "autocapture",
        if config.autocapture { "1" } else { "0" }.to_string(),
    );
    put("customer_email", order.customer_email.clone());

    params.insert("variables".to_string(), json!({"order_id": order.id.to_string()}));

    let mut invoice = Map::new();
    let mut put_invoice = |key: &str, value: String| {
        if !value.is_empty() {
            invoice.insert(key.to_string(), Value::String(value));
        }
    };
    put_invoice(
        "name",
        format!("{} {}", order.billing_first_name, order.billing_last_name)
            .trim()
            .to_string(),
    );
    put_invoice("att", order.billing_street1.clone());
    put_invoice("street", order.billing_street2.clone().unwrap_or_default());
    put_invoice("zip_code", order.billing_postal_code.clone());
    put_invoice("city", order.billing_city.clone());
    put_invoice("region", order.billing_region.clone().unwrap_or_default());
    put_invoice("country_code", order.billing_country_code.clone());
    put_invoice("email", order.customer_email.clone());
    if !invoice.is_empty() {
        params.insert("invoice_address".to_string(), Value::Object(invoice));
    }

    if !items.is_empty() {
        let basket: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "qty": item.qty.to_string(),
                    "item_no": item.item_no,
                    "item_name": item.item_name,
                    "item_price": item.price_cents.to_string(),
                    "vat_rate": format!("{}", item.vat_rate),
                })
            })
            .collect();
        params.insert("basket".to_string(), Value::Array(basket));
    }

    Value::Object(params)
}

/// Turn a fully bracketed flattened key into the form-field name
/// `http_build_query` would use: first path segment bare, the rest bracketed.
///
/// `[invoice_address][email]` becomes `invoice_address[email]`.
fn form_key(flat_key: &str) -> String {
    match flat_key.find(']') {
        Some(end) => format!("{}{}", &flat_key[1..end], &flat_key[end + 1..]),
        None => flat_key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/qp".to_string(),
            server_port: 3000,
            quickpay_merchant_id: "12345".to_string(),
            quickpay_agreement_id: "67890".to_string(),
            quickpay_api_key: "api_user_key".to_string(),
            quickpay_window_api_key: "window_key".to_string(),
            quickpay_private_key: "private_key".to_string(),
            quickpay_api_url: "https://api.quickpay.net/".to_string(),
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

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            api_key_id: Uuid::new_v4(),
            order_number: 42,
            customer_email: "shopper@example.dk".to_string(),
            currency: "DKK".to_string(),
            total_cents: 10000,
            status: "in_checkout".to_string(),
            billing_first_name: "Jens".to_string(),
            billing_last_name: "Hansen".to_string(),
            billing_street1: "Somevej 1".to_string(),
            billing_street2: None,
            billing_city: "Aarhus".to_string(),
            billing_region: None,
            billing_postal_code: "8000".to_string(),
            billing_country_code: "DNK".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn items(order_id: Uuid) -> Vec<OrderItem> {
        vec![OrderItem {
            id: Uuid::new_v4(),
            order_id,
            line_no: 0,
            qty: 2,
            item_no: "SKU-1".to_string(),
            item_name: "Blue mug".to_string(),
            price_cents: 5000,
            vat_rate: 0.25,
        }]
    }

    #[test]
    fn form_contains_required_fields() {
        let order = order();
        let form = build(&config(), &order, &items(order.id));

        assert_eq!(form.action, PAYMENT_WINDOW_URL);
        assert_eq!(form.method, "POST");
        assert_eq!(form.fields.get("version").unwrap(), "v10");
        assert_eq!(form.fields.get("merchant_id").unwrap(), "12345");
        assert_eq!(form.fields.get("agreement_id").unwrap(), "67890");
        assert_eq!(form.fields.get("order_id").unwrap(), "shop0042");
        assert_eq!(form.fields.get("amount").unwrap(), "10000");
        assert_eq!(form.fields.get("currency").unwrap(), "DKK");
        assert_eq!(form.fields.get("autocapture").unwrap(), "0");
        assert_eq!(form.fields.get("basket[0][qty]").unwrap(), "2");
        assert_eq!(form.fields.get("basket[0][item_no]").unwrap(), "SKU-1");
        assert_eq!(form.fields.get("basket[0][vat_rate]").unwrap(), "0.25");
        assert_eq!(
            form.fields.get("invoice_address[name]").unwrap(),
            "Jens Hansen"
        );
        assert_eq!(
            form.fields.get("variables[order_id]").unwrap(),
            &order.id.to_string()
        );
        assert!(form.fields.contains_key("checksum"));
    }

    #[test]
    fn checksum_covers_exactly_the_posted_fields() {
        let cfg = config();
        let order = order();
        let items = items(order.id);

        let form = build(&cfg, &order, &items);
        let expected = checksum::checksum(
            &window_params(&cfg, &order, &items),
            &cfg.quickpay_window_api_key,
        );

        assert_eq!(form.fields.get("checksum").unwrap(), &expected);
    }

    #[test]
    fn checksum_is_signed_with_the_window_key_not_the_api_user_key() {
        let cfg = config();
        let order = order();
        let items = items(order.id);

        let form = build(&cfg, &order, &items);
        let rest_key_digest =
            checksum::checksum(&window_params(&cfg, &order, &items), &cfg.quickpay_api_key);

        // The window agreement key and the REST API user key are distinct
        // credentials; the hosted form must be signed with the former.
        assert_ne!(form.fields.get("checksum").unwrap(), &rest_key_digest);
    }

    #[test]
    fn empty_values_are_omitted() {
        let mut order = order();
        order.billing_street2 = None;
        order.billing_region = Some(String::new());
        let form = build(&config(), &order, &[]);

        assert!(!form.fields.contains_key("invoice_address[street]"));
        assert!(!form.fields.contains_key("invoice_address[region]"));
        assert!(form.fields.keys().all(|k| !k.starts_with("basket")));
    }

    #[test]
    fn form_keys_unwrap_first_segment() {
        assert_eq!(form_key("[merchant_id]"), "merchant_id");
        assert_eq!(form_key("[invoice_address][email]"), "invoice_address[email]");
        assert_eq!(form_key("[basket][0][qty]"), "basket[0][qty]");
    }
}
