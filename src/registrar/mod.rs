//! Gnosis registrar: the fixed catalogue of registration transactions
//!
//! One registrar instance owns the nonce sequence for one registration
//! attempt. `prepare_before_making_txs` seeds the sequence from the on-chain
//! transaction count; each `make_*_tx` call then consumes the next nonce, so
//! one prepared batch carries strictly increasing gap-free nonces.

use std::sync::Arc;

use ethers::types::{Address, Bytes, U256};
use futures::future;
use log::{debug, info};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::eth::{
    abi, extract_fee_amount, recover_signature, Amount, Blockchain, CompiledTransaction,
    NonceSequence, SignedTransaction, Token, TransactionData,
};
use crate::wallet::{TransactionSigner, WalletManager};

/// OTP-processor smart contract the registration catalogue targets
static OTP_PROCESSOR_ADDRESS: Lazy<Address> = Lazy::new(|| {
    "0x3B4397C817A26521Df8bD01a949AFDE2251d91C2"
        .parse()
        .expect("valid OTP processor address")
});

/// Builds and submits the fixed set of registration transactions
pub struct GnosisRegistrator {
    wallet_manager: Arc<dyn WalletManager>,
    token: Token,
    otp_processor: Address,
    nonce: NonceSequence,
}

impl GnosisRegistrator {
    /// Fails fast when the wallet has no token or runs on an unsupported
    /// blockchain; these are construction invariants, not runtime results.
    pub fn new(wallet_manager: Arc<dyn WalletManager>) -> Result<Self> {
        let info = wallet_manager.info();
        match info.blockchain {
            Blockchain::Gnosis | Blockchain::SaltPay => {}
            other => return Err(Error::UnsupportedBlockchain(other.name().to_string())),
        }
        let token = info.token.clone().ok_or(Error::MissingToken)?;

        Ok(Self {
            wallet_manager,
            token,
            otp_processor: *OTP_PROCESSOR_ADDRESS,
            nonce: NonceSequence::new(),
        })
    }

    pub fn wallet_manager(&self) -> &Arc<dyn WalletManager> {
        &self.wallet_manager
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    fn wallet_address(&self) -> Address {
        self.wallet_manager.info().address
    }

    /// Refresh account state and report whether any native coin is left
    pub async fn check_has_gas(&self) -> Result<bool> {
        let snapshot = self.wallet_manager.update().await?;
        Ok(!snapshot.coin_balance.is_zero())
    }

    /// Refresh account state and restart the nonce sequence from the
    /// account's transaction count. Must be called once before any batch of
    /// `make_*_tx` calls.
    pub async fn prepare_before_making_txs(&self) -> Result<()> {
        let snapshot = self.wallet_manager.update().await?;
        self.nonce.reset(snapshot.transaction_count);
        debug!(
            "prepared registrar, nonce sequence starts at {}",
            snapshot.transaction_count
        );
        Ok(())
    }

    async fn make_tx(
        &self,
        operation: &str,
        amount: Amount,
        destination: Address,
        calldata: Bytes,
    ) -> Result<CompiledTransaction> {
        let fees = self
            .wallet_manager
            .estimate_fee(&amount, destination, Some(&calldata))
            .await?;
        let fee = extract_fee_amount(&fees)?;

        let data = TransactionData {
            amount,
            fee,
            source: self.wallet_address(),
            destination,
            calldata: Some(calldata),
            gas_limit: None,
            nonce: self.nonce.next(),
        };
        debug!("building {} transaction with nonce {}", operation, data.nonce);

        self.wallet_manager
            .compile_transaction(&data)?
            .ok_or_else(|| Error::FailedToBuildTransaction(operation.to_string()))
    }

    /// Approve the OTP processor to spend `value` token base units
    pub async fn make_approval_tx(&self, value: U256) -> Result<CompiledTransaction> {
        self.make_tx(
            "approval",
            self.token.amount(value),
            self.token.contract_address,
            abi::approve(self.otp_processor, value),
        )
        .await
    }

    /// Register this wallet address with the OTP processor
    pub async fn make_set_wallet_tx(&self) -> Result<CompiledTransaction> {
        self.make_tx(
            "set-wallet",
            Amount::coin(self.wallet_manager.info().blockchain, U256::zero()),
            self.otp_processor,
            abi::set_wallet(self.wallet_address()),
        )
        .await
    }

    /// Install the card's root OTP material on the processor
    pub async fn make_init_otp_tx(
        &self,
        root_otp: &[u8],
        counter: u64,
    ) -> Result<CompiledTransaction> {
        self.make_tx(
            "init-otp",
            Amount::coin(self.wallet_manager.info().blockchain, U256::zero()),
            self.otp_processor,
            abi::init_otp(root_otp, counter),
        )
        .await
    }

    /// Set the per-transaction spend limit in token base units
    pub async fn make_set_spend_limit_tx(&self, value: U256) -> Result<CompiledTransaction> {
        self.make_tx(
            "set-spend-limit",
            self.token.amount(value),
            self.otp_processor,
            abi::set_spend_limit(self.wallet_address(), value),
        )
        .await
    }

    /// Submit every signed transaction concurrently and wait for all of them.
    ///
    /// An empty input is an empty success. If any submission fails, the first
    /// failure in input order is returned; successful submissions are not
    /// rolled back and nothing is retried.
    pub async fn send_transactions(
        &self,
        transactions: &[SignedTransaction],
    ) -> Result<Vec<String>> {
        let submissions = transactions
            .iter()
            .map(|tx| self.wallet_manager.send_raw(tx));
        let results = future::join_all(submissions).await;

        let mut hashes = Vec::with_capacity(results.len());
        for result in results {
            hashes.push(result?);
        }
        info!("submitted {} registration transactions", hashes.len());
        Ok(hashes)
    }

    /// Allowance the OTP processor has granted this wallet
    pub async fn get_allowance(&self) -> Result<Amount> {
        self.wallet_manager
            .allowance(self.otp_processor, self.wallet_address())
            .await
    }

    /// Pull `value` token base units from the OTP processor into the wallet,
    /// signing the single transfer on the card.
    pub async fn transfer_from(
        &self,
        value: U256,
        signer: &dyn TransactionSigner,
    ) -> Result<String> {
        let snapshot = self.wallet_manager.update().await?;
        let amount = self.token.amount(value);
        let calldata = abi::transfer_from(self.otp_processor, self.wallet_address(), value);

        let fees = self
            .wallet_manager
            .estimate_fee(&amount, self.token.contract_address, Some(&calldata))
            .await?;
        let fee = extract_fee_amount(&fees)?;

        let data = TransactionData {
            amount,
            fee,
            source: self.wallet_address(),
            destination: self.token.contract_address,
            calldata: Some(calldata),
            gas_limit: None,
            nonce: snapshot.transaction_count,
        };
        let compiled = self
            .wallet_manager
            .compile_transaction(&data)?
            .ok_or_else(|| Error::FailedToBuildTransaction("transfer-from".to_string()))?;

        let info = self.wallet_manager.info();
        let raw = signer
            .sign_hash(compiled.sighash(), &info.public_key)
            .await?;
        let signature = recover_signature(&raw, compiled.sighash(), info.address)?;
        let signed = compiled.into_signed(signature);

        self.wallet_manager.send_raw(&signed).await
    }
}
