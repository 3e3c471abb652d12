//! Unsigned and signed legacy transactions
//!
//! A `CompiledTransaction` is produced once by the wallet manager's builder and
//! is immutable afterward: the signing step consumes its EIP-155 sighash, and
//! pairing a recovered signature with it yields the `SignedTransaction` the
//! submission step consumes exactly once.

use ethers::signers::to_eip155_v;
use ethers::types::{Address, Bytes, NameOrAddress, Signature, TransactionRequest, H256, U256};
use ethers::utils::keccak256;

use crate::error::{Error, Result};
use crate::eth::{Amount, AmountKind, Blockchain};

/// Default gas limit for OTP-processor contract calls
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Raw 64-byte `r || s` signature as returned by the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature(pub [u8; 64]);

impl RawSignature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(Error::InvalidSignature(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut raw = [0u8; 64];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn r(&self) -> U256 {
        U256::from_big_endian(&self.0[..32])
    }

    pub fn s(&self) -> U256 {
        U256::from_big_endian(&self.0[32..])
    }
}

/// Named parameters for the wallet manager's transaction builder
#[derive(Debug, Clone)]
pub struct TransactionData {
    pub amount: Amount,
    pub fee: Amount,
    pub source: Address,
    pub destination: Address,
    pub calldata: Option<Bytes>,
    pub gas_limit: Option<U256>,
    pub nonce: u64,
}

/// An unsigned transaction with its precomputed signing hash
#[derive(Debug, Clone)]
pub struct CompiledTransaction {
    request: TransactionRequest,
    fee: Amount,
    nonce: u64,
    sighash: H256,
}

impl CompiledTransaction {
    pub fn new(request: TransactionRequest, fee: Amount, nonce: u64) -> Self {
        let sighash = request.sighash();
        Self {
            request,
            fee,
            nonce,
            sighash,
        }
    }

    /// EIP-155 hash the card signs
    pub fn sighash(&self) -> H256 {
        self.sighash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn fee(&self) -> &Amount {
        &self.fee
    }

    pub fn destination(&self) -> Option<Address> {
        match self.request.to.as_ref() {
            Some(NameOrAddress::Address(address)) => Some(*address),
            _ => None,
        }
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    /// Pair this transaction with its signature, producing the raw encoding.
    ///
    /// Recovery yields a 27/28 `v`; the raw encoding must carry the EIP-155
    /// form (`chain_id * 2 + 35 + parity`) or the node decodes the bytes as a
    /// pre-EIP-155 transaction and recovers the wrong sender.
    pub fn into_signed(self, signature: Signature) -> SignedTransaction {
        let signature = match self.request.chain_id {
            Some(chain_id) if signature.v < 35 => Signature {
                v: to_eip155_v((signature.v - 27) as u8, chain_id.as_u64()),
                ..signature
            },
            _ => signature,
        };
        let raw = self.request.rlp_signed(&signature);
        let hash = H256::from(keccak256(raw.as_ref()));
        SignedTransaction {
            transaction: self,
            signature,
            raw,
            hash,
        }
    }
}

/// A compiled transaction plus its signature, ready for submission
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: CompiledTransaction,
    pub signature: Signature,
    pub raw: Bytes,
    pub hash: H256,
}

/// Build a legacy transaction from named builder parameters.
///
/// Token amounts move value through calldata, so the native `value` field is
/// only populated for coin amounts. The gas price is derived from the total
/// fee and the gas limit, matching how the fee estimate was produced.
pub fn compile_legacy(data: &TransactionData, blockchain: Blockchain) -> CompiledTransaction {
    let gas_limit = data.gas_limit.unwrap_or_else(|| U256::from(DEFAULT_GAS_LIMIT));
    let gas_price = if gas_limit.is_zero() {
        U256::zero()
    } else {
        data.fee.value / gas_limit
    };
    let value = match data.amount.kind {
        AmountKind::Coin => data.amount.value,
        AmountKind::Token(_) => U256::zero(),
    };

    let mut request = TransactionRequest::new()
        .from(data.source)
        .to(data.destination)
        .value(value)
        .gas(gas_limit)
        .gas_price(gas_price)
        .nonce(data.nonce)
        .chain_id(blockchain.chain_id());
    if let Some(calldata) = &data.calldata {
        request = request.data(calldata.clone());
    }

    CompiledTransaction::new(request, data.fee.clone(), data.nonce)
}

/// Recover the full signature from the card's raw `r || s` output.
///
/// The card does not report a recovery id, so both candidates are tried and
/// checked against the expected sender address.
pub fn recover_signature(
    raw: &RawSignature,
    sighash: H256,
    sender: Address,
) -> Result<Signature> {
    let r = raw.r();
    let s = raw.s();
    for v in [27u64, 28] {
        let candidate = Signature { r, s, v };
        if let Ok(recovered) = candidate.recover(sighash) {
            if recovered == sender {
                return Ok(candidate);
            }
        }
    }
    Err(Error::InvalidSignature(
        "signature does not recover to the sender address".to_string(),
    ))
}
