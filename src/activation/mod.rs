//! Activation orchestration over registrar, card and backend
//!
//! `SaltPayActivationManager` is the thin layer the onboarding flow calls:
//! every method combines one backend request or one registrar operation with
//! the activation error taxonomy. The resumable workflow driver and the step
//! engine live in `workflow`; KYC URL building lives in `kyc`.

pub mod kyc;
pub mod workflow;

use std::sync::Arc;

use ethers::types::U256;
use log::debug;

use crate::api::{
    extract_result, AttestationResponse, CardVerifyItem, CheckRegistrationRequest,
    PaymentologyApi, RegisterKycRequest, RegisterWalletRequest, RegisterWalletResponse,
    RegistrationItem,
};
use crate::card::{AttestWalletKeyResponse, RegistrationTask};
use crate::config::KycProvider;
use crate::error::{Error, Result};
use crate::eth::{Amount, SignedTransaction};
use crate::registrar::GnosisRegistrator;
use crate::wallet::TransactionSigner;

pub use kyc::{wallet_reference_id, KycUrlProvider, KYC_DONE_URL};
pub use workflow::{
    assert_pin_valid, determine_step, ActivationStep, SaltPayRegistrationManager,
};

/// Per-transaction spend limit, in whole tokens
pub const SPEND_LIMIT_TOKENS: u64 = 100;

/// Allowance granted to the OTP processor by this manager's approval
/// transaction: the full ERC-20 value range.
fn approval_value() -> U256 {
    U256::MAX
}

/// Drives a single card's activation against backend and chain
pub struct SaltPayActivationManager {
    card_id: String,
    card_public_key: Vec<u8>,
    kyc_provider: KycProvider,
    api: Arc<dyn PaymentologyApi>,
    registrar: Arc<GnosisRegistrator>,
    kyc_url_provider: KycUrlProvider,
}

impl SaltPayActivationManager {
    pub fn new(
        card_id: String,
        card_public_key: Vec<u8>,
        kyc_provider: KycProvider,
        api: Arc<dyn PaymentologyApi>,
        registrar: Arc<GnosisRegistrator>,
    ) -> Result<Self> {
        let wallet_public_key = registrar.wallet_manager().info().public_key.clone();
        let kyc_url_provider = KycUrlProvider::new(&wallet_public_key, &kyc_provider)?;
        Ok(Self {
            card_id,
            card_public_key,
            kyc_provider,
            api,
            registrar,
            kyc_url_provider,
        })
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn wallet_public_key(&self) -> Vec<u8> {
        self.registrar.wallet_manager().info().public_key.clone()
    }

    pub fn kyc_url_provider(&self) -> &KycUrlProvider {
        &self.kyc_url_provider
    }

    pub fn registrar(&self) -> &Arc<GnosisRegistrator> {
        &self.registrar
    }

    /// Gate registration on a positive native-coin balance
    pub async fn check_has_gas(&self) -> Result<()> {
        if self.registrar.check_has_gas().await? {
            Ok(())
        } else {
            Err(Error::NoGas)
        }
    }

    /// Announce the KYC web flow to the backend
    pub async fn register_kyc(&self) -> Result<()> {
        let request = RegisterKycRequest {
            card_id: self.card_id.clone(),
            public_key: self.card_public_key.clone(),
            kyc_provider: self.kyc_provider.code.clone(),
            kyc_ref_id: self.kyc_url_provider.kyc_ref_id.clone(),
        };
        extract_result(self.api.register_kyc(&request).await?)?;
        Ok(())
    }

    /// Single registration-status lookup for this card
    pub async fn check_registration(&self) -> Result<RegistrationItem> {
        let request = CheckRegistrationRequest {
            requests: vec![CardVerifyItem::new(&self.card_id, &self.card_public_key)],
        };
        let response = extract_result(self.api.check_registration(&request).await?)?;
        if response.results.is_empty() {
            return Err(Error::EmptyBackendResponse);
        }

        let message = response.error_message();
        let item = response
            .results
            .into_iter()
            .next()
            .ok_or(Error::EmptyBackendResponse)?;
        if item.error.is_some() {
            return Err(Error::Api(message));
        }
        Ok(item)
    }

    pub async fn request_attestation_challenge(&self) -> Result<AttestationResponse> {
        let request = CardVerifyItem::new(&self.card_id, &self.card_public_key);
        extract_result(self.api.request_attestation_challenge(&request).await?)
    }

    pub async fn send_transactions(
        &self,
        transactions: &[SignedTransaction],
    ) -> Result<Vec<String>> {
        self.registrar.send_transactions(transactions).await
    }

    /// Register the wallet with the backend, handing over the attestation
    /// payload and the chosen PIN
    pub async fn register_wallet(
        &self,
        attest_response: &AttestWalletKeyResponse,
        pin: &str,
    ) -> Result<RegisterWalletResponse> {
        let request = RegisterWalletRequest {
            card_id: self.card_id.clone(),
            public_key: self.card_public_key.clone(),
            wallet_public_key: self.wallet_public_key(),
            wallet_salt: attest_response.salt.clone(),
            wallet_signature: attest_response.wallet_signature.clone(),
            card_salt: attest_response.public_key_salt.clone().unwrap_or_default(),
            card_signature: attest_response.card_signature.clone().unwrap_or_default(),
            pin: pin.to_string(),
        };
        extract_result(self.api.register_wallet(&request).await?)
    }

    /// Claimable allowance, failing when nothing is left to claim
    pub async fn get_amount_to_claim(&self) -> Result<Amount> {
        let amount = self
            .registrar
            .get_allowance()
            .await
            .map_err(|_| Error::FailedToGetFundsToClaim)?;
        if amount.is_zero() {
            Err(Error::NoFundsToClaim)
        } else {
            Ok(amount)
        }
    }

    /// Pull the claimable amount into the wallet, signing on the card.
    /// A user cancel on the card passes through unchanged.
    pub async fn claim(&self, value: U256, signer: &dyn TransactionSigner) -> Result<()> {
        match self.registrar.transfer_from(value, signer).await {
            Ok(hash) => {
                debug!("claim transaction submitted: {}", hash);
                Ok(())
            }
            Err(Error::UserCancelled) => Err(Error::UserCancelled),
            Err(_) => Err(Error::ClaimTransactionFailed),
        }
    }

    /// Current token balance of the wallet
    pub async fn get_token_amount(&self) -> Result<Amount> {
        let snapshot = self.registrar.wallet_manager().update().await?;
        snapshot.token_balance.ok_or(Error::MissingToken)
    }

    /// Registration task with this manager's approval value
    pub fn make_registration_task(&self, challenge: Vec<u8>) -> RegistrationTask {
        self.make_registration_task_with(challenge, approval_value())
    }

    pub(crate) fn make_registration_task_with(
        &self,
        challenge: Vec<u8>,
        approval_value: U256,
    ) -> RegistrationTask {
        RegistrationTask::new(
            self.registrar.clone(),
            challenge,
            self.wallet_public_key(),
            approval_value,
            self.registrar.token().base_units(SPEND_LIMIT_TOKENS),
        )
    }
}
