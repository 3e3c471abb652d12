//! External wallet-manager seam
//!
//! The blockchain SDK lives outside this crate; the registrar talks to it
//! through the `WalletManager` trait: account refresh, three-amount fee
//! estimation, transaction building keyed by named parameters, and raw
//! submission. The card-side signer is a second seam so the claim flow can
//! sign a single transfer without running the full registration task.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

use crate::error::Result;
use crate::eth::{
    Amount, Blockchain, CompiledTransaction, RawSignature, SignedTransaction, Token,
    TransactionData,
};

/// Static description of the wallet a manager operates
#[derive(Debug, Clone)]
pub struct WalletInfo {
    pub blockchain: Blockchain,
    /// Seed public key of the wallet on the card
    pub public_key: Vec<u8>,
    /// Derived account address
    pub address: Address,
    /// Token the card is provisioned with, if any
    pub token: Option<Token>,
}

/// Account state as of the latest refresh
#[derive(Debug, Clone)]
pub struct WalletSnapshot {
    pub coin_balance: Amount,
    pub token_balance: Option<Amount>,
    pub transaction_count: u64,
}

/// Wallet manager abstraction over the external blockchain SDK.
///
/// `estimate_fee` must return exactly three amounts (low, medium, high);
/// `compile_transaction` may yield nothing, which callers map to a
/// `FailedToBuildTransaction` error.
#[async_trait]
pub trait WalletManager: Send + Sync {
    fn info(&self) -> &WalletInfo;

    /// Refresh account state from the chain
    async fn update(&self) -> Result<WalletSnapshot>;

    /// Estimate fees for a call to `destination` with optional calldata
    async fn estimate_fee(
        &self,
        amount: &Amount,
        destination: Address,
        calldata: Option<&Bytes>,
    ) -> Result<Vec<Amount>>;

    /// Build an unsigned transaction from named parameters
    fn compile_transaction(&self, data: &TransactionData) -> Result<Option<CompiledTransaction>>;

    /// Submit a signed transaction, returning its hash string
    async fn send_raw(&self, transaction: &SignedTransaction) -> Result<String>;

    /// ERC-20 allowance granted by `owner` to `spender`
    async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount>;
}

/// Signer abstraction over the card-session runner.
///
/// One batched call covers all hashes with a single user confirmation;
/// signatures come back in input order.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_hashes(
        &self,
        hashes: &[H256],
        wallet_public_key: &[u8],
    ) -> Result<Vec<RawSignature>>;

    async fn sign_hash(&self, hash: H256, wallet_public_key: &[u8]) -> Result<RawSignature> {
        let mut signatures = self.sign_hashes(&[hash], wallet_public_key).await?;
        signatures
            .pop()
            .ok_or_else(|| crate::error::Error::Card("signer returned no signature".to_string()))
    }
}
