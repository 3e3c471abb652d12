//! KYC web-flow URL building
//!
//! The KYC provider identifies a wallet by a stable external reference id
//! derived from the wallet public key. The request URL is the provider base
//! URL with the provider's session and external-id query parameters appended.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::KycProvider;
use crate::error::{Error, Result};

/// Landing page the provider redirects to after a completed KYC flow
pub const KYC_DONE_URL: &str = "https://success.tangem.com/";

const REFERENCE_ID_CONTEXT: &[u8] = b"UserWalletID";

/// Stable per-wallet external reference id.
///
/// HMAC-SHA256 over the wallet public key, keyed by a fixed context digest,
/// hex encoded. Deterministic for one wallet across reinstalls.
pub fn wallet_reference_id(wallet_public_key: &[u8]) -> Result<String> {
    let key = Sha256::digest(REFERENCE_ID_CONTEXT);
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|err| Error::Crypto(err.to_string()))?;
    mac.update(wallet_public_key);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// URLs and ids for one wallet's KYC web flow
#[derive(Debug, Clone)]
pub struct KycUrlProvider {
    pub kyc_ref_id: String,
    pub request_url: String,
    pub done_url: &'static str,
}

impl KycUrlProvider {
    pub fn new(wallet_public_key: &[u8], provider: &KycProvider) -> Result<Self> {
        let kyc_ref_id = wallet_reference_id(wallet_public_key)?;

        let mut url = Url::parse(&provider.base_url)?;
        url.query_pairs_mut()
            .append_pair(&provider.sid_parameter_key, &provider.sid_value)
            .append_pair(&provider.external_id_parameter_key, &kyc_ref_id);

        Ok(Self {
            kyc_ref_id,
            request_url: url.to_string(),
            done_url: KYC_DONE_URL,
        })
    }
}
