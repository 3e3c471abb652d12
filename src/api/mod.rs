//! Paymentology backend API seam
//!
//! Request/response models for the registration backend plus a thin
//! `reqwest`-backed client. Every response carries a success/error envelope;
//! `extract_result` maps a populated error (or `success == false`) to an
//! `Error::Api` so the orchestration layer only sees one tagged result type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Hex string (de)serialization for byte fields on the wire
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

/// Hex string (de)serialization for optional byte fields
pub mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            Some(text) => hex::decode(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Card identity item used by verification and challenge requests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardVerifyItem {
    pub card_id: String,
    /// Card public key, hex encoded
    pub public_key: String,
}

impl CardVerifyItem {
    pub fn new(card_id: &str, card_public_key: &[u8]) -> Self {
        Self {
            card_id: card_id.to_string(),
            public_key: hex::encode(card_public_key),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRegistrationRequest {
    pub requests: Vec<CardVerifyItem>,
}

/// KYC progress as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    NotStarted,
    Started,
    WaitingForApproval,
    CorrectionRequested,
    Rejected,
    Approved,
}

/// Per-card registration status
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationItem {
    pub card_id: Option<String>,
    pub passed: Option<bool>,
    pub active: Option<bool>,
    pub pin_set: Option<bool>,
    pub kyc_status: Option<KycStatus>,
    pub kyc_date: Option<DateTime<Utc>>,
    pub disabled_by_admin: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    #[serde(default)]
    pub results: Vec<RegistrationItem>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub error_code: Option<i32>,
}

impl RegistrationResponse {
    /// Combined error text of the envelope and every per-card item
    pub fn error_message(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(error) = self.error.as_deref() {
            parts.push(error);
        }
        for item in &self.results {
            if let Some(error) = item.error.as_deref() {
                parts.push(error);
            }
        }
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(default, with = "hex_bytes_opt")]
    pub challenge: Option<Vec<u8>>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub error_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterKycRequest {
    pub card_id: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub kyc_provider: String,
    pub kyc_ref_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletRequest {
    pub card_id: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub wallet_public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub wallet_salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub wallet_signature: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub card_salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub card_signature: Vec<u8>,
    pub pin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterKycResponse {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub error_code: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletResponse {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub error_code: Option<i32>,
}

/// Success/error envelope every backend response carries
pub trait ApiEnvelope {
    fn success(&self) -> Option<bool>;
    fn error(&self) -> Option<&str>;
    fn error_code(&self) -> Option<i32>;
}

macro_rules! impl_envelope {
    ($($response:ty),+ $(,)?) => {
        $(impl ApiEnvelope for $response {
            fn success(&self) -> Option<bool> {
                self.success
            }
            fn error(&self) -> Option<&str> {
                self.error.as_deref()
            }
            fn error_code(&self) -> Option<i32> {
                self.error_code
            }
        })+
    };
}

impl_envelope!(
    RegistrationResponse,
    AttestationResponse,
    RegisterKycResponse,
    RegisterWalletResponse,
);

/// Unwrap the backend envelope, mapping failure markers to `Error::Api`
pub fn extract_result<T: ApiEnvelope>(response: T) -> Result<T> {
    if let Some(error) = response.error() {
        if !error.is_empty() {
            return Err(Error::Api(match response.error_code() {
                Some(code) => format!("{} (code {})", error, code),
                None => error.to_string(),
            }));
        }
    }
    if response.success() == Some(false) {
        return Err(Error::Api("request was not successful".to_string()));
    }
    Ok(response)
}

/// Backend operations the activation flow depends on
#[async_trait]
pub trait PaymentologyApi: Send + Sync {
    async fn check_registration(
        &self,
        request: &CheckRegistrationRequest,
    ) -> Result<RegistrationResponse>;

    async fn request_attestation_challenge(
        &self,
        request: &CardVerifyItem,
    ) -> Result<AttestationResponse>;

    async fn register_kyc(&self, request: &RegisterKycRequest) -> Result<RegisterKycResponse>;

    async fn register_wallet(
        &self,
        request: &RegisterWalletRequest,
    ) -> Result<RegisterWalletResponse>;
}

/// HTTP client for the Paymentology registration backend
pub struct PaymentologyClient {
    base_url: Url,
    client: Client,
}

impl PaymentologyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            client: Client::new(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentologyApi for PaymentologyClient {
    async fn check_registration(
        &self,
        request: &CheckRegistrationRequest,
    ) -> Result<RegistrationResponse> {
        self.post("card/verify", request).await
    }

    async fn request_attestation_challenge(
        &self,
        request: &CardVerifyItem,
    ) -> Result<AttestationResponse> {
        self.post("card/get_challenge", request).await
    }

    async fn register_kyc(&self, request: &RegisterKycRequest) -> Result<RegisterKycResponse> {
        self.post("card/kyc", request).await
    }

    async fn register_wallet(
        &self,
        request: &RegisterWalletRequest,
    ) -> Result<RegisterWalletResponse> {
        self.post("card/wallet", request).await
    }
}
