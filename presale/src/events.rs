//! Events for off-chain observers
//!
//! The engine appends to an in-memory log and mirrors each event as a
//! `tracing` record. The core only requires construction and outcome
//! events; the per-participant ones are emitted for completeness.

use serde::{Deserialize, Serialize};
use veilraise_fhe::Address;

use crate::pool::SaleOutcome;

/// Observer-facing presale events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresaleEvent {
    /// A pool was constructed with these sale terms
    PoolCreated {
        pool: Address,
        operator: Address,
        token_presale: u64,
        hard_cap: u64,
        soft_cap: u64,
        start: u64,
        end: u64,
    },
    /// A bid was accepted into the ledger (amount stays encrypted)
    BidPlaced { bidder: Address },
    /// The sale was resolved at finalize
    PoolResolved {
        outcome: SaleOutcome,
        wei_raised: u128,
        tokens_sold: u64,
        /// Plain inventory handed back to the operator
        tokens_returned: u64,
    },
    /// A participant's contribution was settled into an allocation
    BidSettled { beneficiary: Address },
    /// A settled allocation was claimed
    TokensClaimed { beneficiary: Address },
    /// A full contribution was refunded after cancellation
    Refunded { participant: Address },
}
