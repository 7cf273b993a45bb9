//! Confidential transfer service error types

use thiserror::Error;
use veilraise_fhe::FheError;

/// Errors that can occur in the confidential transfer service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    /// Account has no confidential balance for this asset
    #[error("No balance recorded for account")]
    NoBalance,

    /// Encrypted balance is below the requested plain amount
    #[error("Insufficient balance: requested {requested} encrypted units")]
    InsufficientBalance { requested: u64 },

    /// Plain amount does not cover a single encrypted unit at the wrap rate
    #[error("Amount too small to wrap: {amount} plain units below rate {rate}")]
    AmountTooSmall { amount: u64, rate: u64 },

    /// The amount handle is not authorized for the debited account
    #[error("Amount handle not authorized for the debited account")]
    AmountNotAuthorized,

    /// Arithmetic overflow in plain-side supply accounting
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Underlying encrypted value service failure
    #[error("Encrypted value service: {0}")]
    Fhe(#[from] FheError),
}
