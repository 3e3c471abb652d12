//! SaltPay card activation core
//!
//! Everything needed to take a payment card from first tap to an active
//! wallet on the Gnosis chain:
//! - eth: chain model, amounts, transaction compilation, contract calldata
//! - wallet: wallet-manager and signer seams the registrar drives
//! - registrar: the fixed catalogue of registration transactions
//! - card: hardware-card session seam and the registration task
//! - api: Paymentology backend models and client
//! - activation: orchestration, KYC URLs, the resumable workflow
//! - storage: per-card activation checkpoints
//! - config: chain and provider configuration

pub mod activation; // Orchestration and the resumable workflow
pub mod api; // Paymentology backend seam
pub mod card; // Card session and registration task
pub mod config; // Chain and KYC provider configuration
pub mod error;
pub mod eth; // Chain model and transaction compilation
pub mod registrar; // Registration transaction catalogue
pub mod storage; // Activation checkpoints
pub mod wallet; // Wallet-manager and signer seams

// Re-export commonly used types for easy access
pub use error::{Error, ErrorCategory, Result};

pub use activation::{
    ActivationStep, KycUrlProvider, SaltPayActivationManager, SaltPayRegistrationManager,
    SPEND_LIMIT_TOKENS,
};
pub use api::{PaymentologyApi, PaymentologyClient, RegistrationItem};
pub use card::{
    AttestationMode, CardSession, RegistrationTask, RegistrationTaskResponse, TaskState,
};
pub use config::{KycProvider, SaltPayConfig};
pub use eth::{
    Amount, Blockchain, CompiledTransaction, NonceSequence, RawSignature, SignedTransaction,
    Token, TransactionData,
};
pub use registrar::GnosisRegistrator;
pub use storage::{ActivationStorage, FileActivationStorage, MemoryActivationStorage};
pub use wallet::{TransactionSigner, WalletInfo, WalletManager, WalletSnapshot};
