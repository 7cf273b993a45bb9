//! Sale terms and rate derivation

use serde::{Deserialize, Serialize};

use crate::{PresaleError, PresaleResult, TOKEN_RATE_FROM_WRAPPER};

/// Immutable sale terms, fixed at pool construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleOptions {
    /// Plain base token units reserved for sale
    pub token_presale: u64,
    /// Maximum acceptable aggregate contribution (payment units)
    pub hard_cap: u64,
    /// Minimum aggregate contribution for success (payment units)
    pub soft_cap: u64,
    /// Bidding window open (unix timestamp)
    pub start: u64,
    /// Bidding window close (unix timestamp)
    pub end: u64,
}

impl PresaleOptions {
    pub fn new(token_presale: u64, hard_cap: u64, soft_cap: u64, start: u64, end: u64) -> Self {
        Self {
            token_presale,
            hard_cap,
            soft_cap,
            start,
            end,
        }
    }

    /// Check every construction invariant
    pub fn validate(&self) -> PresaleResult<()> {
        if self.hard_cap == 0 {
            return Err(PresaleError::ZeroHardCap);
        }
        if self.soft_cap == 0 {
            return Err(PresaleError::ZeroSoftCap);
        }
        if self.soft_cap > self.hard_cap {
            return Err(PresaleError::SoftCapExceedsHardCap {
                soft_cap: self.soft_cap,
                hard_cap: self.hard_cap,
            });
        }
        if self.end < self.start {
            return Err(PresaleError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        if self.token_presale == 0 {
            return Err(PresaleError::ZeroTokenPresale);
        }
        self.derive_rate()?;
        Ok(())
    }

    /// Conversion rate fixed for the pool's lifetime: wrapped sale-token
    /// units allocated per payment unit, `token_presale / hard_cap` at the
    /// wrapper's decimal reduction. The reserve must cover the full hard
    /// cap at this rate.
    pub fn derive_rate(&self) -> PresaleResult<u64> {
        let denominator = (self.hard_cap as u128) * (TOKEN_RATE_FROM_WRAPPER as u128);
        let rate_wide = (self.token_presale as u128) / denominator;
        if rate_wide > u64::MAX as u128 {
            return Err(PresaleError::RateOverflow);
        }
        let rate = rate_wide as u64;
        if rate == 0 {
            return Err(PresaleError::RateTooLow);
        }
        let coverable =
            (self.token_presale as u128) / (rate as u128 * TOKEN_RATE_FROM_WRAPPER as u128);
        if coverable < self.hard_cap as u128 {
            return Err(PresaleError::RateTooLow);
        }
        Ok(rate)
    }

    /// Whether a timestamp falls inside the bidding window
    pub fn within_window(&self, now: u64) -> bool {
        now >= self.start && now <= self.end
    }
}
