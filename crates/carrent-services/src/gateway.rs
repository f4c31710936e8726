//! Payment gateway adapters
//!
//! [`HttpPaymentGateway`] talks to a JSON charge endpoint; [`MockPaymentGateway`]
//! stands in for it in development and tests.

use async_trait::async_trait;
use carrent_core::config::PaymentGatewayConfig;
use carrent_core::traits::{ChargeOutcome, ChargeRequest, PaymentGateway};
use carrent_core::{AppError, AppResult};
use parking_lot::Mutex;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Body returned by the charge endpoint
#[derive(Debug, Deserialize)]
struct ChargeResponse {
    success: bool,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// JSON-over-HTTP gateway client
///
/// `POST {url}/charges` with the [`ChargeRequest`] as body. A 2xx or 402
/// response carries a verdict; any other status is a gateway error.
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build gateway client: {}", e)))?;

        let base_url = url.into().trim_end_matches('/').to_string();
        info!("Payment gateway client created for {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build from configuration; `None` when no gateway url is configured
    pub fn from_config(config: &PaymentGatewayConfig) -> AppResult<Option<Self>> {
        match config.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Self::new(
                url,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    fn charges_url(&self) -> String {
        format!("{}/charges", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(booking_id = request.booking_id, method = %request.method))]
    async fn charge(&self, request: &ChargeRequest) -> AppResult<ChargeOutcome> {
        let mut builder = self.client.post(self.charges_url()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Gateway request timed out");
                AppError::Gateway("Gateway request timed out".to_string())
            } else {
                error!("Gateway connection failed: {}", e);
                AppError::Gateway(format!("Gateway connection failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::PAYMENT_REQUIRED {
            error!("Gateway returned HTTP {}", status.as_u16());
            return Err(AppError::Gateway(format!(
                "Gateway returned HTTP {}",
                status.as_u16()
            )));
        }

        let raw: JsonValue = response.json().await.map_err(|e| {
            error!("Failed to read gateway response: {}", e);
            AppError::Gateway(format!("Invalid gateway response: {}", e))
        })?;

        parse_verdict(raw)
    }
}

/// Interpret a charge endpoint body
///
/// An approval must carry the gateway reference.
fn parse_verdict(raw: JsonValue) -> AppResult<ChargeOutcome> {
    let parsed: ChargeResponse = serde_json::from_value(raw.clone())
        .map_err(|e| AppError::Gateway(format!("Invalid gateway response: {}", e)))?;

    debug!(success = parsed.success, reference = ?parsed.reference, "Gateway verdict");

    let reference = parsed.reference.filter(|r| !r.trim().is_empty());
    if parsed.success && reference.is_none() {
        error!("Gateway approved a charge without a reference");
        return Err(AppError::Gateway(
            "Gateway approved the charge without a reference".to_string(),
        ));
    }

    Ok(ChargeOutcome {
        success: parsed.success,
        reference,
        message: parsed.message,
        raw: Some(raw),
    })
}

/// Select the gateway for this deployment
///
/// A configured url wins. Without one the mock is used only when
/// `payment_gateway.mock` is set; otherwise startup fails.
pub fn gateway_from_config(config: &PaymentGatewayConfig) -> AppResult<Arc<dyn PaymentGateway>> {
    if let Some(gateway) = HttpPaymentGateway::from_config(config)? {
        return Ok(Arc::new(gateway));
    }

    if config.mock {
        warn!("payment_gateway.mock is set: charges are approved without contacting a gateway");
        return Ok(Arc::new(MockPaymentGateway::new()));
    }

    Err(AppError::Config(
        "payment_gateway.url is not set and payment_gateway.mock is false".to_string(),
    ))
}

/// Scripted behaviour of the mock gateway
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Approve,
    Decline(String),
    /// The call itself fails
    Fail(String),
    /// Sleep before approving
    Delay(Duration),
}

/// In-process gateway for development and tests
///
/// Approves every charge unless scripted otherwise, and records each request.
#[derive(Clone)]
pub struct MockPaymentGateway {
    behavior: Arc<Mutex<MockBehavior>>,
    requests: Arc<Mutex<Vec<ChargeRequest>>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Approve)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn declining(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Decline(message.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()))
    }

    pub fn delayed(delay: Duration) -> Self {
        Self::with_behavior(MockBehavior::Delay(delay))
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().clone()
    }

    pub fn charge_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn approved(request: &ChargeRequest) -> ChargeOutcome {
        let reference = format!("mock_txn_{}", uuid::Uuid::new_v4());
        info!(
            booking_id = request.booking_id,
            amount = %request.amount,
            reference = %reference,
            "Mock charge approved"
        );
        ChargeOutcome {
            success: true,
            raw: Some(serde_json::json!({
                "success": true,
                "reference": reference,
                "gateway": "mock",
            })),
            reference: Some(reference),
            message: None,
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> AppResult<ChargeOutcome> {
        self.requests.lock().push(request.clone());
        let behavior = self.behavior.lock().clone();

        match behavior {
            MockBehavior::Approve => Ok(Self::approved(request)),
            MockBehavior::Decline(message) => {
                info!(booking_id = request.booking_id, "Mock charge declined");
                let mut outcome = ChargeOutcome::declined(message.clone());
                outcome.raw = Some(serde_json::json!({ "success": false, "message": message }));
                Ok(outcome)
            }
            MockBehavior::Fail(message) => Err(AppError::Gateway(message)),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Self::approved(request))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::PaymentMethod;
    use rust_decimal_macros::dec;

    fn request() -> ChargeRequest {
        ChargeRequest {
            booking_id: 7,
            method: PaymentMethod::Visa,
            method_ref: "tok_visa".to_string(),
            amount: dec!(356.40),
            currency: "USD".to_string(),
        }
    }

    fn gateway_config(url: Option<&str>, mock: bool) -> PaymentGatewayConfig {
        PaymentGatewayConfig {
            url: url.map(str::to_string),
            api_key: None,
            timeout_secs: 5,
            mock,
        }
    }

    #[test]
    fn test_gateway_selection_requires_url_or_mock() {
        let err = gateway_from_config(&gateway_config(None, false)).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));

        let err = gateway_from_config(&gateway_config(Some("  "), false)).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));

        assert!(gateway_from_config(&gateway_config(None, true)).is_ok());
        assert!(gateway_from_config(&gateway_config(Some("http://127.0.0.1:9/v1"), false)).is_ok());
    }

    #[test]
    fn test_approval_without_reference_is_gateway_error() {
        let err = parse_verdict(serde_json::json!({ "success": true })).unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));

        let err = parse_verdict(serde_json::json!({ "success": true, "reference": "" })).unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));

        let outcome =
            parse_verdict(serde_json::json!({ "success": true, "reference": "ch_123" })).unwrap();
        assert_eq!(outcome.reference.as_deref(), Some("ch_123"));

        let declined = parse_verdict(serde_json::json!({
            "success": false,
            "message": "insufficient funds"
        }))
        .unwrap();
        assert!(!declined.success);
        assert!(declined.reference.is_none());
    }

    #[tokio::test]
    async fn test_mock_approves_by_default() {
        let gateway = MockPaymentGateway::new();
        let outcome = gateway.charge(&request()).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.reference.unwrap().starts_with("mock_txn_"));
        assert_eq!(gateway.charge_count(), 1);
        assert_eq!(gateway.requests()[0].amount, dec!(356.40));
    }

    #[tokio::test]
    async fn test_mock_decline_is_not_an_error() {
        let gateway = MockPaymentGateway::declining("card declined");
        let outcome = gateway.charge(&request()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("card declined"));
        assert!(outcome.reference.is_none());
    }

    #[tokio::test]
    async fn test_mock_failure_is_gateway_error() {
        let gateway = MockPaymentGateway::failing("connection reset");
        let err = gateway.charge(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_behavior_can_change() {
        let gateway = MockPaymentGateway::declining("no");
        gateway.set_behavior(MockBehavior::Approve);
        assert!(gateway.charge(&request()).await.unwrap().success);
    }

    #[test]
    fn test_http_gateway_from_empty_config_is_none() {
        let config = PaymentGatewayConfig::default();
        assert!(HttpPaymentGateway::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_http_gateway_url_normalized() {
        let gateway =
            HttpPaymentGateway::new("http://gateway.local/", None, Duration::from_secs(2)).unwrap();
        assert_eq!(gateway.charges_url(), "http://gateway.local/charges");
    }
}
