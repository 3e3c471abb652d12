//! Card-session seam and the registration task
//!
//! The hardware card is driven through the `CardSession` trait: one pending
//! command at a time, timeouts and cancellation belong to the session runner.
//! `RegistrationTask` is the linear state machine that prepares a card for
//! activation: generate OTP material, attest the wallet key, build the four
//! registration transactions, sign their hashes in one batch. A failure in any
//! state terminates the task with that state's error.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{H256, U256};
use log::debug;

use crate::error::{Error, Result};
use crate::eth::{recover_signature, CompiledTransaction, RawSignature, SignedTransaction};
use crate::registrar::GnosisRegistrator;

/// Wallet-attestation confirmation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationMode {
    /// Static card attestation only
    Static,
    /// Challenge-based attestation of the active wallet key
    Dynamic,
}

/// Response of the card's one-time-password generation command
#[derive(Debug, Clone)]
pub struct GenerateOtpResponse {
    pub root_otp: Vec<u8>,
    pub root_otp_counter: u64,
}

/// Response of the card's wallet-key attestation command
#[derive(Debug, Clone)]
pub struct AttestWalletKeyResponse {
    pub salt: Vec<u8>,
    pub wallet_signature: Vec<u8>,
    pub public_key_salt: Option<Vec<u8>>,
    pub card_signature: Option<Vec<u8>>,
}

/// Command/response surface of the hardware card session runner
#[async_trait]
pub trait CardSession: Send + Sync {
    /// Public key of the wallet currently active on the card, if any
    fn active_wallet_public_key(&self) -> Option<Vec<u8>>;

    async fn generate_otp(&mut self) -> Result<GenerateOtpResponse>;

    async fn attest_wallet_key(
        &mut self,
        wallet_public_key: &[u8],
        challenge: &[u8],
        mode: AttestationMode,
    ) -> Result<AttestWalletKeyResponse>;

    /// Sign a batch of hashes with one user confirmation, preserving order
    async fn sign_hashes(
        &mut self,
        hashes: &[H256],
        wallet_public_key: &[u8],
    ) -> Result<Vec<RawSignature>>;
}

/// States of the registration task, visited in order with no branching back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    GenerateOtp,
    AttestWallet,
    PrepareTransactions,
    SignTransactions,
    Complete,
}

/// Aggregate the task yields when every state has succeeded
#[derive(Debug, Clone)]
pub struct RegistrationTaskResponse {
    pub signed_transactions: Vec<SignedTransaction>,
    pub attest_response: AttestWalletKeyResponse,
}

/// Linear card-session state machine preparing a card for activation
pub struct RegistrationTask {
    registrar: Arc<GnosisRegistrator>,
    challenge: Vec<u8>,
    wallet_public_key: Vec<u8>,
    approval_value: U256,
    spend_limit_value: U256,
    state: TaskState,
    otp: Option<GenerateOtpResponse>,
    attest_response: Option<AttestWalletKeyResponse>,
    transactions: Vec<CompiledTransaction>,
    signed_transactions: Vec<SignedTransaction>,
}

impl RegistrationTask {
    pub fn new(
        registrar: Arc<GnosisRegistrator>,
        challenge: Vec<u8>,
        wallet_public_key: Vec<u8>,
        approval_value: U256,
        spend_limit_value: U256,
    ) -> Self {
        Self {
            registrar,
            challenge,
            wallet_public_key,
            approval_value,
            spend_limit_value,
            state: TaskState::GenerateOtp,
            otp: None,
            attest_response: None,
            transactions: Vec::new(),
            signed_transactions: Vec::new(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Drive the state machine to completion on the given session.
    ///
    /// The first failing state terminates the task with its error; there is
    /// no retry and no partial completion.
    pub async fn run(mut self, session: &mut dyn CardSession) -> Result<RegistrationTaskResponse> {
        loop {
            debug!("registration task entering {:?}", self.state);
            match self.state {
                TaskState::GenerateOtp => {
                    self.otp = Some(session.generate_otp().await?);
                    self.state = TaskState::AttestWallet;
                }
                TaskState::AttestWallet => {
                    self.ensure_active_wallet(session)?;
                    let response = session
                        .attest_wallet_key(
                            &self.wallet_public_key,
                            &self.challenge,
                            AttestationMode::Dynamic,
                        )
                        .await?;
                    self.attest_response = Some(response);
                    self.state = TaskState::PrepareTransactions;
                }
                TaskState::PrepareTransactions => {
                    self.prepare_transactions().await?;
                    self.state = TaskState::SignTransactions;
                }
                TaskState::SignTransactions => {
                    self.sign_transactions(session).await?;
                    self.state = TaskState::Complete;
                }
                TaskState::Complete => return self.complete(),
            }
        }
    }

    fn ensure_active_wallet(&self, session: &dyn CardSession) -> Result<()> {
        match session.active_wallet_public_key() {
            Some(key) if key == self.wallet_public_key => Ok(()),
            _ => Err(Error::WalletNotFound),
        }
    }

    /// Build the four registration transactions in fixed order. Runs off the
    /// card session; only the cached OTP response is consumed.
    async fn prepare_transactions(&mut self) -> Result<()> {
        let otp = self.otp.as_ref().ok_or(Error::UnknownError)?;

        self.registrar.prepare_before_making_txs().await?;
        let transactions = vec![
            self.registrar.make_approval_tx(self.approval_value).await?,
            self.registrar.make_set_wallet_tx().await?,
            self.registrar
                .make_init_otp_tx(&otp.root_otp, otp.root_otp_counter)
                .await?,
            self.registrar
                .make_set_spend_limit_tx(self.spend_limit_value)
                .await?,
        ];
        self.transactions = transactions;
        Ok(())
    }

    /// Sign all prepared transaction hashes as one batched card command and
    /// pair the returned signatures with their transactions positionally.
    async fn sign_transactions(&mut self, session: &mut dyn CardSession) -> Result<()> {
        self.ensure_active_wallet(session)?;

        let hashes: Vec<H256> = self.transactions.iter().map(|tx| tx.sighash()).collect();
        let signatures = session
            .sign_hashes(&hashes, &self.wallet_public_key)
            .await?;
        if signatures.len() != self.transactions.len() {
            return Err(Error::InvalidSignature(format!(
                "expected {} signatures, got {}",
                self.transactions.len(),
                signatures.len()
            )));
        }

        let sender = self.registrar.wallet_manager().info().address;
        let transactions = std::mem::take(&mut self.transactions);
        for (transaction, raw) in transactions.into_iter().zip(signatures) {
            let signature = recover_signature(&raw, transaction.sighash(), sender)?;
            self.signed_transactions.push(transaction.into_signed(signature));
        }
        Ok(())
    }

    /// Succeeds only with at least one signed transaction and a present
    /// attestation response.
    fn complete(self) -> Result<RegistrationTaskResponse> {
        match (self.signed_transactions.is_empty(), self.attest_response) {
            (false, Some(attest_response)) => Ok(RegistrationTaskResponse {
                signed_transactions: self.signed_transactions,
                attest_response,
            }),
            _ => Err(Error::UnknownError),
        }
    }
}
