//! VEILRAISE: Confidential Fundraising Engine
//!
//! Participants contribute value under encryption, the engine tracks
//! per-participant and aggregate contributions without revealing individual
//! amounts, and after the deadline the sale resolves into pro-rata token
//! allocation plus partial refunds (success) or full refunds (failure).
//!
//! ## Crate Organization
//!
//! - `veilraise-fhe`: encrypted value service (TFHE-backed handle vault
//!   with capability-gated homomorphic operations)
//! - `veilraise-token`: confidential transfer service (encrypted balances,
//!   wrap/unwrap, min-semantics transfers)
//! - `veilraise-presale`: the presale engine (encrypted ledger, lifecycle
//!   state machine, finalization, settlement/claim/refund)
//!
//! This root crate re-exports the members for integration testing and
//! carries the protocol-wide unit scales.

pub use veilraise_fhe as fhe;
pub use veilraise_presale as presale;
pub use veilraise_token as token;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Unit scales shared across the protocol
pub mod config {
    /// Plain wei represented by one encrypted payment unit
    pub const WEI_PER_UNIT: u64 = veilraise_presale::WEI_PER_UNIT;

    /// Plain base token units represented by one wrapped sale-token unit
    pub const TOKEN_RATE_FROM_WRAPPER: u64 = veilraise_presale::TOKEN_RATE_FROM_WRAPPER;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use veilraise_fhe::{
        Address, ClientKey, EncodedBid, FheConfig, Handle, HandleVault, PermissionKind, ServerKey,
    };
    pub use veilraise_presale::{
        Presale, PresaleError, PresaleEvent, PresaleOptions, PoolState, SaleOutcome,
    };
    pub use veilraise_token::{ConfidentialToken, TokenError};
}
