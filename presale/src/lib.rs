//! VEILRAISE Presale Engine
//!
//! One fundraising round: an encrypted contribution ledger fed during a
//! bidding window, an operator-triggered finalize that resolves the sale
//! into success or failure and fixes the pool-wide fill ratio, and
//! per-participant settlement/claim/refund driven entirely over encrypted
//! handles.
//!
//! # Lifecycle
//!
//! ```text
//!            place_bid (within window)
//!               v
//!  Active ──────────────> AwaitingFinalize ──┬──> Finalized   (raised >= soft cap)
//!            finalize_pre_sale               └──> Cancelled   (raised <  soft cap)
//!
//!  Finalized: settle_bid -> claim_tokens (per participant, once each)
//!  Cancelled: refund                     (per participant, once)
//! ```
//!
//! Every intermediate quantity stays encrypted; the only plaintext figures
//! are the operator-supplied aggregates at finalize and the single
//! comparison bits the value service discloses for admission checks.

pub mod engine;
pub mod errors;
pub mod events;
pub mod options;
pub mod pool;

pub use engine::Presale;
pub use errors::PresaleError;
pub use events::PresaleEvent;
pub use options::PresaleOptions;
pub use pool::{ParticipantRecord, Pool, PoolState, SaleOutcome};

/// Plain wei represented by one encrypted payment unit
pub const WEI_PER_UNIT: u64 = 1_000_000_000;

/// Plain base token units represented by one wrapped sale-token unit
pub const TOKEN_RATE_FROM_WRAPPER: u64 = 1_000;

/// Result type for presale operations
pub type PresaleResult<T> = Result<T, PresaleError>;
