//! Resumable activation workflow
//!
//! `SaltPayRegistrationManager` drives the whole onboarding sequence: status
//! polling mapped to an `ActivationStep`, the card registration run (gas gate,
//! PIN, attestation challenge, card task, transaction submission, wallet
//! registration), and the claim flow. The `transactions_sent` checkpoint makes
//! `register_card` idempotent across process restarts; nothing here retries on
//! its own - callers re-invoke after a failure.

use std::sync::Arc;

use ethers::types::U256;
use log::{info, warn};

use crate::api::{KycStatus, RegisterWalletResponse, RegistrationItem};
use crate::card::CardSession;
use crate::error::{Error, Result};
use crate::eth::Amount;
use crate::storage::ActivationStorage;
use crate::wallet::TransactionSigner;

use super::SaltPayActivationManager;

/// Minimum accepted PIN length
pub const DEFAULT_PIN_LENGTH: usize = 4;

/// Allowance granted to the OTP processor by this workflow's approval
/// transaction: half the ERC-20 value range.
fn approval_value() -> U256 {
    U256::one() << 255
}

/// Screens of the activation flow, in visiting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActivationStep {
    None,
    NeedPin,
    CardRegistration,
    KycIntro,
    KycStart,
    KycWaiting,
    KycReject,
    Claim,
    ClaimInProgress,
    ClaimSuccess,
    Success,
}

impl ActivationStep {
    /// Gas is only required while registration transactions are still ahead
    pub fn requires_gas_check(&self) -> bool {
        *self < ActivationStep::KycIntro
    }
}

/// Map a registration-status item to the next activation step.
///
/// The KYC sub-table depends on the step currently shown, so a user sitting
/// on the waiting screen is not bounced back to the intro while the provider
/// still processes the application.
pub fn determine_step(
    current_step: ActivationStep,
    amount_to_claim: Option<&Amount>,
    item: &RegistrationItem,
) -> Result<ActivationStep> {
    fn step_for_claim(amount: Option<&Amount>) -> ActivationStep {
        match amount {
            Some(_) => ActivationStep::Claim,
            None => ActivationStep::Success,
        }
    }

    if item.passed != Some(true) {
        return Err(Error::CardNotPassed(
            item.error.clone().unwrap_or_default(),
        ));
    }
    if item.disabled_by_admin == Some(true) {
        return Err(Error::CardDisabled(item.error.clone().unwrap_or_default()));
    }

    if item.active == Some(true) {
        return Ok(step_for_claim(amount_to_claim));
    }
    if item.pin_set == Some(false) {
        return Ok(ActivationStep::NeedPin);
    }

    if let Some(status) = item.kyc_status {
        let step = match current_step {
            ActivationStep::KycWaiting => match status {
                KycStatus::NotStarted | KycStatus::Started => ActivationStep::KycIntro,
                KycStatus::WaitingForApproval => ActivationStep::KycWaiting,
                KycStatus::CorrectionRequested | KycStatus::Rejected => ActivationStep::KycReject,
                KycStatus::Approved => step_for_claim(amount_to_claim),
            },
            ActivationStep::KycReject => match status {
                KycStatus::NotStarted
                | KycStatus::Started
                | KycStatus::CorrectionRequested
                | KycStatus::Rejected => ActivationStep::KycStart,
                KycStatus::WaitingForApproval => ActivationStep::KycWaiting,
                KycStatus::Approved => step_for_claim(amount_to_claim),
            },
            _ => match status {
                KycStatus::NotStarted | KycStatus::Started => ActivationStep::KycIntro,
                KycStatus::WaitingForApproval => ActivationStep::KycWaiting,
                KycStatus::CorrectionRequested | KycStatus::Rejected => ActivationStep::KycReject,
                KycStatus::Approved => step_for_claim(amount_to_claim),
            },
        };
        return Ok(step);
    }

    if item.kyc_date.is_some() {
        return Ok(ActivationStep::KycWaiting);
    }
    Ok(ActivationStep::KycIntro)
}

/// Reject PINs below the minimum length or with a single repeated symbol
pub fn assert_pin_valid(pin: &str, min_length: usize) -> Result<()> {
    let chars: Vec<char> = pin.chars().collect();
    if chars.len() < min_length {
        return Err(Error::WeakPin);
    }
    if chars.windows(2).all(|pair| pair[0] == pair[1]) {
        return Err(Error::WeakPin);
    }
    Ok(())
}

/// Resumable driver for the whole activation workflow
pub struct SaltPayRegistrationManager {
    manager: Arc<SaltPayActivationManager>,
    storage: Arc<dyn ActivationStorage>,
    pin_length: usize,
}

impl SaltPayRegistrationManager {
    pub fn new(
        manager: Arc<SaltPayActivationManager>,
        storage: Arc<dyn ActivationStorage>,
    ) -> Self {
        Self {
            manager,
            storage,
            pin_length: DEFAULT_PIN_LENGTH,
        }
    }

    pub fn manager(&self) -> &Arc<SaltPayActivationManager> {
        &self.manager
    }

    /// Record that activation began for this card
    pub fn start_activation(&self) -> Result<()> {
        let card_id = self.manager.card_id();
        if !self.storage.activation_started(card_id) {
            info!("activation started for card {}", card_id);
            self.storage.set_activation_started(card_id)?;
        }
        Ok(())
    }

    /// Poll the backend and work out which step the flow is on.
    ///
    /// The claimable amount is only fetched when the caller does not already
    /// hold one; a failed lookup degrades to "nothing to claim" instead of
    /// failing the whole update.
    pub async fn update(
        &self,
        current_step: ActivationStep,
        current_amount: Option<Amount>,
    ) -> Result<(ActivationStep, Option<Amount>)> {
        let item = self.manager.check_registration().await?;

        let amount = match current_amount {
            Some(amount) => Some(amount),
            None => match self.manager.get_amount_to_claim().await {
                Ok(amount) => Some(amount),
                Err(Error::NoFundsToClaim) => None,
                Err(err) => {
                    warn!("claimable amount lookup failed: {}", err);
                    None
                }
            },
        };

        let step = determine_step(current_step, amount.as_ref(), &item)?;
        if step.requires_gas_check() {
            self.manager.check_has_gas().await?;
        }
        Ok((step, amount))
    }

    /// Run the card registration sequence end to end.
    ///
    /// When the transaction batch was already submitted in a previous run,
    /// the card task still executes (the attestation payload is needed for
    /// wallet registration) but submission is skipped.
    pub async fn register_card(
        &self,
        session: &mut dyn CardSession,
        pin: &str,
    ) -> Result<RegisterWalletResponse> {
        self.start_activation()?;
        self.manager.check_has_gas().await?;
        assert_pin_valid(pin, self.pin_length)?;

        let challenge_response = self.manager.request_attestation_challenge().await?;
        let challenge = challenge_response
            .challenge
            .ok_or_else(|| Error::Api("attestation challenge missing".to_string()))?;

        let task = self
            .manager
            .make_registration_task_with(challenge, approval_value());
        let response = task.run(session).await?;

        let card_id = self.manager.card_id();
        if self.storage.transactions_sent(card_id) {
            info!("transactions already sent for card {}, skipping", card_id);
        } else {
            self.manager
                .send_transactions(&response.signed_transactions)
                .await
                .map_err(|_| Error::FailedToSendTransactions)?;
            self.storage.set_transactions_sent(card_id, true)?;
        }

        self.manager
            .register_wallet(&response.attest_response, pin)
            .await
    }

    /// Claim the outstanding allowance, returning the claimed amount
    pub async fn claim(&self, signer: &dyn TransactionSigner) -> Result<Amount> {
        let amount = self.manager.get_amount_to_claim().await?;
        self.manager.claim(amount.value, signer).await?;
        Ok(amount)
    }

    /// Re-check chain state after a claim was submitted
    pub async fn refresh_claim(&self) -> Result<ActivationStep> {
        let token_amount = self.manager.get_token_amount().await?;
        let allowance_left = match self.manager.get_amount_to_claim().await {
            Ok(_) => true,
            Err(Error::NoFundsToClaim) => false,
            Err(err) => return Err(err),
        };

        if !token_amount.is_zero() && !allowance_left {
            Ok(ActivationStep::ClaimSuccess)
        } else {
            Ok(ActivationStep::ClaimInProgress)
        }
    }
}
