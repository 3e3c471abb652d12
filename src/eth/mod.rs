//! Ethereum value types for the Gnosis registration flow
//!
//! This module defines the chain and token model the registrar operates on:
//! - Blockchain identity (the SaltPay card ships on the xDai-based chain)
//! - Token and amount representation in base units
//! - Fee extraction from the wallet manager's three-amount estimate
//! - The explicit nonce sequence owned by one registrar instance

pub mod abi;
pub mod tx;

use std::sync::atomic::{AtomicU64, Ordering};

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use tx::{
    compile_legacy, recover_signature, CompiledTransaction, RawSignature, SignedTransaction,
    TransactionData,
};

/// Wrapped-xDai token contract on the Gnosis chain
const WXDAI_CONTRACT: &str = "0xe91D153E0b41518A2Ce8Dd3D7944Fa863463a97d";

/// Blockchains the registrar can operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blockchain {
    /// Ethereum mainnet
    Ethereum,
    /// The public Gnosis chain (formerly xDai)
    Gnosis,
    /// The SaltPay deployment, xDai-based with a fixed token
    SaltPay,
}

impl Blockchain {
    /// EIP-155 chain id
    pub fn chain_id(&self) -> u64 {
        match self {
            Blockchain::Ethereum => 1,
            Blockchain::Gnosis | Blockchain::SaltPay => 100,
        }
    }

    /// Native coin decimals
    pub fn decimals(&self) -> u8 {
        18
    }

    /// Native coin symbol
    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Blockchain::Ethereum => "ETH",
            Blockchain::Gnosis | Blockchain::SaltPay => "xDAI",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Blockchain::Ethereum => "Ethereum",
            Blockchain::Gnosis => "Gnosis",
            Blockchain::SaltPay => "SaltPay",
        }
    }
}

/// ERC-20 token description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub contract_address: Address,
    pub decimals: u8,
}

impl Token {
    /// The fixed token a SaltPay card is provisioned with
    pub fn wrapped_xdai() -> Self {
        Self {
            symbol: "WXDAI".to_string(),
            contract_address: WXDAI_CONTRACT.parse().expect("valid WXDAI contract address"),
            decimals: 18,
        }
    }

    /// Convert a whole-token value into base units
    pub fn base_units(&self, whole: u64) -> U256 {
        U256::from(whole) * U256::exp10(self.decimals as usize)
    }

    /// Wrap a base-unit value into an amount of this token
    pub fn amount(&self, value: U256) -> Amount {
        Amount {
            value,
            decimals: self.decimals,
            symbol: self.symbol.clone(),
            kind: AmountKind::Token(self.clone()),
        }
    }
}

/// What an amount denominates
#[derive(Debug, Clone, PartialEq)]
pub enum AmountKind {
    Coin,
    Token(Token),
}

/// A value in base units of the native coin or a token
#[derive(Debug, Clone, PartialEq)]
pub struct Amount {
    pub value: U256,
    pub decimals: u8,
    pub symbol: String,
    pub kind: AmountKind,
}

impl Amount {
    /// Native-coin amount in base units
    pub fn coin(blockchain: Blockchain, value: U256) -> Self {
        Self {
            value,
            decimals: blockchain.decimals(),
            symbol: blockchain.currency_symbol().to_string(),
            kind: AmountKind::Coin,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Human-unit representation, if the value fits a 96-bit mantissa
    pub fn to_decimal(&self) -> Option<Decimal> {
        if self.value.bits() > 96 {
            return None;
        }
        Decimal::try_from_i128_with_scale(self.value.as_u128() as i128, self.decimals as u32).ok()
    }
}

/// Extract the fee from a wallet manager estimate.
///
/// The wallet manager contract is exactly three amounts (low, medium, high);
/// the medium one is used. Any other shape is a `FailedToLoadFee` error.
pub fn extract_fee_amount(fees: &[Amount]) -> Result<Amount> {
    if fees.len() != 3 {
        return Err(Error::FailedToLoadFee);
    }
    Ok(fees[1].clone())
}

/// Explicit nonce sequence for one batch of registration transactions.
///
/// Reset from the on-chain transaction count before a batch, then handed out
/// post-increment per built transaction. The atomic only guards against
/// incidental concurrent access; transaction building is sequential.
#[derive(Debug, Default)]
pub struct NonceSequence {
    next: AtomicU64,
}

impl NonceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the sequence from the account's current transaction count
    pub fn reset(&self, transaction_count: u64) {
        self.next.store(transaction_count, Ordering::SeqCst);
    }

    /// Take the next nonce in the sequence
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The nonce the next call to `next` will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
