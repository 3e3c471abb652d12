//! Calldata encoding for the OTP-processor and token contracts
//!
//! The registration catalogue only needs five fixed contract calls, so the
//! calldata is assembled directly from the 4-byte selector and ABI-encoded
//! arguments rather than through generated bindings.

use ethers::abi::{encode, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

fn call(signature: &str, args: &[AbiToken]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}

/// ERC-20 `approve(spender, value)`
pub fn approve(spender: Address, value: U256) -> Bytes {
    call(
        "approve(address,uint256)",
        &[AbiToken::Address(spender), AbiToken::Uint(value)],
    )
}

/// OTP processor `setWallet(wallet)`
pub fn set_wallet(wallet: Address) -> Bytes {
    call("setWallet(address)", &[AbiToken::Address(wallet)])
}

/// OTP processor `initOTP(rootOtp, counter)`.
///
/// Only the first 16 bytes of the card's root OTP material are used.
pub fn init_otp(root_otp: &[u8], counter: u64) -> Bytes {
    let mut otp = [0u8; 16];
    let len = root_otp.len().min(16);
    otp[..len].copy_from_slice(&root_otp[..len]);
    call(
        "initOTP(bytes16,uint64)",
        &[
            AbiToken::FixedBytes(otp.to_vec()),
            AbiToken::Uint(U256::from(counter)),
        ],
    )
}

/// OTP processor `setSpendLimit(wallet, value)`
pub fn set_spend_limit(wallet: Address, value: U256) -> Bytes {
    call(
        "setSpendLimit(address,uint256)",
        &[AbiToken::Address(wallet), AbiToken::Uint(value)],
    )
}

/// ERC-20 `transferFrom(from, to, value)`
pub fn transfer_from(from: Address, to: Address, value: U256) -> Bytes {
    call(
        "transferFrom(address,address,uint256)",
        &[
            AbiToken::Address(from),
            AbiToken::Address(to),
            AbiToken::Uint(value),
        ],
    )
}
