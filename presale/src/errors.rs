//! Presale error types
//!
//! Every precondition failure is a synchronous, named rejection of the
//! triggering operation; no partial effects persist (the one designed
//! exception is the finalize retry marker, see `engine`).

use crate::pool::PoolState;
use thiserror::Error;
use veilraise_fhe::FheError;
use veilraise_token::TokenError;

/// Errors that can occur in presale operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresaleError {
    // State violations
    #[error("Operation requires state {expected:?}, pool is {actual:?}")]
    StateViolation {
        expected: PoolState,
        actual: PoolState,
    },

    #[error("Invalid state transition {from:?} -> {to:?}")]
    InvalidTransition { from: PoolState, to: PoolState },

    #[error("Bidding opens at {start}, current time {now}")]
    BiddingNotOpen { start: u64, now: u64 },

    #[error("Bidding closed at {end}, current time {now}")]
    BiddingClosed { end: u64, now: u64 },

    #[error("Sale ends at {end}, current time {now}")]
    SaleNotEnded { end: u64, now: u64 },

    // Duplicate one-shot actions
    #[error("Participant already settled")]
    AlreadySettled,

    #[error("Participant already claimed")]
    AlreadyClaimed,

    #[error("Participant already refunded")]
    AlreadyRefunded,

    // Invalid parameters
    #[error("Hard cap must be nonzero")]
    ZeroHardCap,

    #[error("Soft cap must be nonzero")]
    ZeroSoftCap,

    #[error("Soft cap {soft_cap} exceeds hard cap {hard_cap}")]
    SoftCapExceedsHardCap { soft_cap: u64, hard_cap: u64 },

    #[error("Sale end {end} precedes start {start}")]
    EndBeforeStart { start: u64, end: u64 },

    #[error("Token reserve must be nonzero")]
    ZeroTokenPresale,

    #[error("Fill denominator must be nonzero")]
    ZeroFillDenominator,

    #[error("Derived rate too low to cover the hard cap")]
    RateTooLow,

    #[error("Derived rate exceeds its storage width")]
    RateOverflow,

    #[error("Tokens sold {sold} exceed the reserved inventory {reserve}")]
    TokensSoldExceedsReserve { sold: u64, reserve: u64 },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // Authorization
    #[error("Finalize is restricted to the pool operator")]
    NotOperator,

    // Missing participation
    #[error("No contribution recorded for participant")]
    NoContribution,

    #[error("No settled allocation to claim")]
    NothingToClaim,

    // Collaborator failures
    #[error("Encrypted value service: {0}")]
    Fhe(#[from] FheError),

    #[error("Confidential transfer service: {0}")]
    Token(#[from] TokenError),
}
