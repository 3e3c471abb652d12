//! Error types for the SaltPay activation core
//!
//! One crate-wide error enum covers the three failure classes the activation
//! flow deals with: construction-time invariant violations, failures reported
//! by external collaborators (blockchain SDK, card session, backend API), and
//! contract violations of those collaborators (wrong fee shape, empty builder
//! results). Activation-workflow errors carry the step-specific reasons the
//! onboarding UI needs to route on.

use thiserror::Error;

/// Result type alias for activation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for logging and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Constructor invariant violations - fatal, not recoverable
    Construction,
    /// Failures reported by an external collaborator
    External,
    /// An external collaborator violated its contract
    Contract,
    /// Activation workflow errors routed to the onboarding flow
    Workflow,
}

#[derive(Debug, Error)]
pub enum Error {
    // Construction-time invariant violations
    #[error("wallet has no token configured")]
    MissingToken,

    #[error("unsupported blockchain: {0}")]
    UnsupportedBlockchain(String),

    // External-call failures
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("blockchain error: {0}")]
    Blockchain(String),

    #[error("card command error: {0}")]
    Card(String),

    #[error("backend error: {0}")]
    Api(String),

    #[error("user cancelled the card operation")]
    UserCancelled,

    // Protocol/contract violations
    #[error("failed to load fee")]
    FailedToLoadFee,

    #[error("failed to build transaction: {0}")]
    FailedToBuildTransaction(String),

    #[error("active wallet not found on card")]
    WalletNotFound,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("unknown error")]
    UnknownError,

    // Activation workflow errors
    #[error("no gas to pay for registration transactions")]
    NoGas,

    #[error("PIN code is not set")]
    NeedPin,

    #[error("PIN code is too weak")]
    WeakPin,

    #[error("backend returned an empty response")]
    EmptyBackendResponse,

    #[error("card did not pass registration checks: {0}")]
    CardNotPassed(String),

    #[error("card is disabled by administrator: {0}")]
    CardDisabled(String),

    #[error("failed to send registration transactions")]
    FailedToSendTransactions,

    #[error("no funds to claim")]
    NoFundsToClaim,

    #[error("failed to get funds to claim")]
    FailedToGetFundsToClaim,

    #[error("claim transaction failed")]
    ClaimTransactionFailed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Get the error category for logging and routing
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingToken | Self::UnsupportedBlockchain(_) | Self::Config(_) => {
                ErrorCategory::Construction
            }
            Self::Io(_)
            | Self::Serialization(_)
            | Self::Network(_)
            | Self::UrlParse(_)
            | Self::Blockchain(_)
            | Self::Card(_)
            | Self::Api(_)
            | Self::UserCancelled => ErrorCategory::External,
            Self::FailedToLoadFee
            | Self::FailedToBuildTransaction(_)
            | Self::WalletNotFound
            | Self::InvalidSignature(_)
            | Self::Crypto(_)
            | Self::UnknownError => ErrorCategory::Contract,
            Self::NoGas
            | Self::NeedPin
            | Self::WeakPin
            | Self::EmptyBackendResponse
            | Self::CardNotPassed(_)
            | Self::CardDisabled(_)
            | Self::FailedToSendTransactions
            | Self::NoFundsToClaim
            | Self::FailedToGetFundsToClaim
            | Self::ClaimTransactionFailed => ErrorCategory::Workflow,
        }
    }

    /// Whether the caller may resume the workflow after this error
    pub fn is_recoverable(&self) -> bool {
        self.category() != ErrorCategory::Construction
    }
}
