//! Configuration for the SaltPay activation flow
//!
//! The config carries everything the orchestration layer cannot derive from
//! the card: which chain the card ships on, the KYC provider parameters for
//! URL building, and the backend base URL. Loaded from TOML; `stub()` gives
//! tests a fully populated instance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::eth::Blockchain;

/// KYC provider parameters for building the web-flow URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycProvider {
    /// Provider code sent to the backend
    pub code: String,
    pub base_url: String,
    pub sid_parameter_key: String,
    pub sid_value: String,
    pub external_id_parameter_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaltPayConfig {
    pub blockchain: Blockchain,
    pub kyc_provider: KycProvider,
    pub paymentology_base_url: String,
}

impl SaltPayConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| Error::Config(err.to_string()))
    }

    /// Fully populated configuration for tests and demos
    pub fn stub() -> Self {
        Self {
            blockchain: Blockchain::SaltPay,
            kyc_provider: KycProvider {
                code: "UTORG".to_string(),
                base_url: "https://app.utorg.pro/kyc/".to_string(),
                sid_parameter_key: "sid".to_string(),
                sid_value: "saltpay".to_string(),
                external_id_parameter_key: "externalId".to_string(),
            },
            paymentology_base_url: "https://paymentology.example.com/".to_string(),
        }
    }
}
