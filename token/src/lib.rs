//! VEILRAISE Confidential Transfer Service
//!
//! Per-asset registry of encrypted balances. Balances are vault handles; all
//! arithmetic is delegated to the encrypted value service, so the token
//! service never sees an amount in plaintext except at the wrap/unwrap
//! boundary, where plain units enter and leave the confidential domain.
//!
//! # Key Features:
//! - `wrap` / `unwrap` between plain token units and encrypted balances,
//!   at a fixed plain-units-per-encrypted-unit rate
//! - `transfer` / `transfer_from` returning the *actually moved* amount as
//!   an encrypted handle (min of requested amount and sender balance)
//! - balance handles carry persistent decrypt grants for their owners

pub mod errors;
pub mod registry;

pub use errors::TokenError;
pub use registry::ConfidentialToken;

/// Result type for confidential transfer operations
pub type TokenResult<T> = Result<T, TokenError>;
