use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use skybook_core::provider::{
    CardToken, CreateOrderRequest, Offer, PaymentIntent, PaymentRecord, PaymentRequest,
    ProviderApi, ProviderError, RemoteOrder, TokenizeCardRequest,
};
use std::time::Duration;

const DUFFEL_VERSION: &str = "v2";

/// HTTP adapter for the flight-inventory/booking provider. All payloads ride
/// in the provider's `{"data": ...}` envelope; API rejections carry an
/// `errors` array whose first entry becomes a `ProviderError::Api`.
#[derive(Clone)]
pub struct DuffelClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl DuffelClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: api_token.to_string(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Duffel-Version", DUFFEL_VERSION)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            req = req.json(&json!({ "data": body }));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<Envelope<T>>()
                .await
                .map(|envelope| envelope.data)
                .map_err(|e| ProviderError::Decode(e.to_string()));
        }

        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) if !body.errors.is_empty() => {
                let first = &body.errors[0];
                Err(ProviderError::Api {
                    code: first.code.clone(),
                    message: first.message.clone(),
                })
            }
            _ => Err(ProviderError::Api {
                code: format!("http_{}", status.as_u16()),
                message: truncate(&text, 512),
            }),
        }
    }

    fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ProviderError> {
        serde_json::to_value(value).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}

#[async_trait]
impl ProviderApi for DuffelClient {
    async fn get_offer(&self, offer_id: &str) -> Result<Offer, ProviderError> {
        self.request(Method::GET, &format!("/air/offers/{}", offer_id), None)
            .await
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<RemoteOrder, ProviderError> {
        self.request(Method::POST, "/air/orders", Some(Self::to_value(req)?))
            .await
    }

    async fn get_order(&self, order_id: &str) -> Result<RemoteOrder, ProviderError> {
        self.request(Method::GET, &format!("/air/orders/{}", order_id), None)
            .await
    }

    async fn tokenize_card(&self, req: &TokenizeCardRequest) -> Result<CardToken, ProviderError> {
        self.request(Method::POST, "/payments/cards", Some(Self::to_value(req)?))
            .await
    }

    async fn create_payment_intent(
        &self,
        amount: &str,
        currency: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        self.request(
            Method::POST,
            "/payments/payment_intents",
            Some(json!({ "amount": amount, "currency": currency })),
        )
        .await
    }

    async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProviderError> {
        self.request(
            Method::GET,
            &format!("/payments/payment_intents/{}", intent_id),
            None,
        )
        .await
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        card_token: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        self.request(
            Method::POST,
            &format!("/payments/payment_intents/{}/actions/confirm", intent_id),
            Some(json!({ "card_id": card_token })),
        )
        .await
    }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentRecord, ProviderError> {
        self.request(Method::POST, "/air/payments", Some(Self::to_value(req)?))
            .await
    }
}
