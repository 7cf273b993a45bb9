//! Pool record, lifecycle states, and per-participant records

use serde::{Deserialize, Serialize};
use veilraise_fhe::{Address, Handle};

use crate::options::PresaleOptions;
use crate::{PresaleError, PresaleResult};

/// Lifecycle phase of a sale instance
///
/// `AwaitingFinalize` exists only inside a finalize operation: it is never
/// observable between operations, but re-admitting it lets an interrupted
/// finalize be retried safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    Active,
    AwaitingFinalize,
    Cancelled,
    Finalized,
}

impl PoolState {
    /// Whether the pool has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PoolState::Cancelled | PoolState::Finalized)
    }

    /// The single transition function; every state change goes through here
    pub fn transition(self, to: PoolState) -> PresaleResult<PoolState> {
        use PoolState::*;
        match (self, to) {
            (Active, AwaitingFinalize)
            | (AwaitingFinalize, AwaitingFinalize)
            | (AwaitingFinalize, Cancelled)
            | (AwaitingFinalize, Finalized) => Ok(to),
            (from, to) => Err(PresaleError::InvalidTransition { from, to }),
        }
    }
}

/// Outcome of a resolved sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleOutcome {
    /// Soft cap reached: pro-rata allocation plus partial refunds
    Success,
    /// Soft cap missed: full refunds
    Failure,
}

/// Per-participant ledger entry
///
/// The contribution handle is mutated only by bid placement; settlement
/// reads it and writes the claimable handle exactly once. The three flags
/// are write-once and gate the corresponding one-shot actions.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRecord {
    /// Encrypted running total of accepted bids
    pub contribution: Option<Handle>,
    /// Encrypted token allocation, written by settlement
    pub claimable: Option<Handle>,
    pub settled: bool,
    pub claimed: bool,
    pub refunded: bool,
}

/// One sale instance's pool record
#[derive(Debug, Clone)]
pub struct Pool {
    pub state: PoolState,
    pub options: PresaleOptions,
    /// Role with exclusive rights to trigger finalize
    pub operator: Address,
    /// The pool's own principal address in the vault and token registries
    pub address: Address,
    /// Wrapped sale-token units per payment unit, fixed at construction
    pub token_per_eth_with_decimals: u64,
    /// Plain sale-token inventory still held by the pool
    pub token_balance: u64,
    /// Plain base token units sold, set at finalize
    pub tokens_sold: u64,
    /// Plain wei raised, set at finalize
    pub wei_raised: u128,
    /// Running encrypted sum of all accepted contributions
    pub eth_raised_encrypted: Handle,
    /// Pool-wide fill ratio, set exactly once at finalize
    pub fill_numerator: u64,
    pub fill_denominator: u64,
}

impl Pool {
    /// Move the pool to a new state through the transition function
    pub fn set_state(&mut self, to: PoolState) -> PresaleResult<()> {
        self.state = self.state.transition(to)?;
        Ok(())
    }
}
