//! The presale engine
//!
//! Owns the pool record and the per-participant ledger. Every operation
//! takes the collaborating repositories (`HandleVault`, `ConfidentialToken`)
//! by mutable reference; the `&mut self` receiver gives the total serial
//! order the settlement logic assumes.
//!
//! One-shot flags are always set before the external transfer they guard,
//! so a transfer callback can never re-enter the same action.

use std::collections::HashMap;
use tracing::{debug, info};
use veilraise_fhe::{Address, EncodedBid, Handle, HandleVault, PermissionKind};
use veilraise_token::{ConfidentialToken, TokenError};

use crate::events::PresaleEvent;
use crate::options::PresaleOptions;
use crate::pool::{ParticipantRecord, Pool, PoolState, SaleOutcome};
use crate::{PresaleError, PresaleResult, TOKEN_RATE_FROM_WRAPPER, WEI_PER_UNIT};

/// One sale instance: pool record, encrypted ledger, event log
pub struct Presale {
    pool: Pool,
    ledger: HashMap<Address, ParticipantRecord>,
    events: Vec<PresaleEvent>,
}

impl Presale {
    /// Construct a pool. Validates every sale-term invariant, fixes the
    /// conversion rate, and takes custody of the plain token reserve
    /// (`options.token_presale`, deposited by the operator).
    pub fn new(
        vault: &mut HandleVault,
        operator: Address,
        address: Address,
        options: PresaleOptions,
    ) -> PresaleResult<Self> {
        options.validate()?;
        let rate = options.derive_rate()?;

        let zero = vault.encrypt_constant(0, &address)?;
        vault.grant_use(zero, &address, PermissionKind::Persistent)?;

        let pool = Pool {
            state: PoolState::Active,
            options,
            operator,
            address,
            token_per_eth_with_decimals: rate,
            token_balance: options.token_presale,
            tokens_sold: 0,
            wei_raised: 0,
            eth_raised_encrypted: zero,
            fill_numerator: 0,
            fill_denominator: 0,
        };

        info!(
            hard_cap = options.hard_cap,
            soft_cap = options.soft_cap,
            rate,
            "presale pool created"
        );

        let events = vec![PresaleEvent::PoolCreated {
            pool: address,
            operator,
            token_presale: options.token_presale,
            hard_cap: options.hard_cap,
            soft_cap: options.soft_cap,
            start: options.start,
            end: options.end,
        }];

        Ok(Self {
            pool,
            ledger: HashMap::new(),
            events,
        })
    }

    // ------------------------------------------------------------------
    // Bidding
    // ------------------------------------------------------------------

    /// Accept an encrypted bid into the ledger. The amount actually moved
    /// by the transfer service (not the nominal bid) is what lands in the
    /// participant's running total and the pool aggregate. No cap is
    /// enforced here; oversubscription is resolved at finalize.
    pub fn place_bid(
        &mut self,
        vault: &mut HandleVault,
        payment: &mut ConfidentialToken,
        now: u64,
        bidder: Address,
        encoded: &EncodedBid,
        proof: &[u8; 32],
    ) -> PresaleResult<()> {
        if self.pool.state != PoolState::Active {
            return Err(PresaleError::StateViolation {
                expected: PoolState::Active,
                actual: self.pool.state,
            });
        }
        let options = self.pool.options;
        if now < options.start {
            return Err(PresaleError::BiddingNotOpen {
                start: options.start,
                now,
            });
        }
        if now > options.end {
            return Err(PresaleError::BiddingClosed {
                end: options.end,
                now,
            });
        }

        let pool_addr = self.pool.address;
        let amount = vault.decode_external(encoded, proof, &bidder)?;
        let moved = payment.transfer_from(vault, &pool_addr, &bidder, &pool_addr, amount)?;

        let prior = self.ledger.get(&bidder).and_then(|r| r.contribution);
        let contribution = match prior {
            Some(total) => vault.add(&pool_addr, total, moved)?,
            None => moved,
        };
        vault.grant_use(contribution, &bidder, PermissionKind::Persistent)?;
        vault.grant_use(contribution, &pool_addr, PermissionKind::Persistent)?;

        let aggregate = vault.add(&pool_addr, self.pool.eth_raised_encrypted, moved)?;
        vault.grant_use(aggregate, &pool_addr, PermissionKind::Persistent)?;

        self.ledger.entry(bidder).or_default().contribution = Some(contribution);
        self.pool.eth_raised_encrypted = aggregate;

        self.events.push(PresaleEvent::BidPlaced { bidder });
        debug!("bid accepted into encrypted ledger");
        vault.clear_transient();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Finalize
    // ------------------------------------------------------------------

    /// Resolve the sale. Operator-only, at or after the window close.
    ///
    /// The four figures are plaintext operator inputs, expected to come
    /// from a public decryption of the encrypted aggregate and an agreed
    /// fill policy. The engine does not reconcile them against the
    /// encrypted aggregate beyond the soft-cap branch on the operator's own
    /// number: the operator is trusted for these values, and a dishonest
    /// set skews settlement. Constraining that is an attestation concern
    /// outside this engine.
    ///
    /// A failure after the entry checks leaves the pool in the
    /// `AwaitingFinalize` marker, from which finalize may be retried.
    /// Every fallible step on the collaborating services is validated
    /// before any of them mutates, so a failed attempt leaves nothing
    /// behind but the marker and a retry starts from a clean slate.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_pre_sale(
        &mut self,
        vault: &mut HandleVault,
        payment: &mut ConfidentialToken,
        sale_token: &mut ConfidentialToken,
        caller: Address,
        now: u64,
        eth_raised: u64,
        tokens_sold: u64,
        fill_numerator: u64,
        fill_denominator: u64,
    ) -> PresaleResult<SaleOutcome> {
        if caller != self.pool.operator {
            return Err(PresaleError::NotOperator);
        }
        if !matches!(
            self.pool.state,
            PoolState::Active | PoolState::AwaitingFinalize
        ) {
            return Err(PresaleError::StateViolation {
                expected: PoolState::Active,
                actual: self.pool.state,
            });
        }
        let end = self.pool.options.end;
        if now < end {
            return Err(PresaleError::SaleNotEnded { end, now });
        }
        if fill_denominator == 0 {
            return Err(PresaleError::ZeroFillDenominator);
        }
        let tokens_sold_plain = tokens_sold
            .checked_mul(TOKEN_RATE_FROM_WRAPPER)
            .ok_or(PresaleError::ArithmeticOverflow)?;

        self.pool.set_state(PoolState::AwaitingFinalize)?;
        let wei_raised = eth_raised as u128 * WEI_PER_UNIT as u128;

        if eth_raised < self.pool.options.soft_cap {
            // Soft cap missed: the entire reserved inventory goes back to
            // the operator; participants use the refund path.
            self.pool.fill_numerator = fill_numerator;
            self.pool.fill_denominator = fill_denominator;
            self.pool.wei_raised = wei_raised;
            let tokens_returned = self.pool.token_balance;
            self.pool.token_balance = 0;
            self.pool.set_state(PoolState::Cancelled)?;

            info!(eth_raised, tokens_returned, "presale cancelled below soft cap");
            self.events.push(PresaleEvent::PoolResolved {
                outcome: SaleOutcome::Failure,
                wei_raised: self.pool.wei_raised,
                tokens_sold: 0,
                tokens_returned,
            });
            vault.clear_transient();
            return Ok(SaleOutcome::Failure);
        }

        if tokens_sold_plain > self.pool.token_balance {
            return Err(PresaleError::TokensSoldExceedsReserve {
                sold: tokens_sold_plain,
                reserve: self.pool.token_balance,
            });
        }
        let surplus = self.pool.token_balance - tokens_sold_plain;

        let pool_addr = self.pool.address;
        let operator = self.pool.operator;

        // The used fraction of the encrypted aggregate goes to the operator,
        // released against the plaintext figure. Truncating division: the
        // residual dust stays in the pool's confidential balance.
        let scaled = vault.mul_plain(&pool_addr, self.pool.eth_raised_encrypted, fill_numerator)?;
        let used = vault.div_plain(&pool_addr, scaled, fill_denominator)?;

        // Validate the remaining fallible steps before any collaborator
        // mutation: the sold inventory must be wrappable and the pool's
        // payment balance must cover the operator release at this fill
        // ratio. Inconsistent operator figures fail here, with both token
        // services untouched.
        let release = eth_raised
            .checked_mul(WEI_PER_UNIT)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        if tokens_sold_plain > 0 && tokens_sold_plain / sale_token.wrap_rate() == 0 {
            return Err(TokenError::AmountTooSmall {
                amount: tokens_sold_plain,
                rate: sale_token.wrap_rate(),
            }
            .into());
        }
        if !payment.can_fund_release(vault, &pool_addr, &operator, used, release)? {
            return Err(TokenError::InsufficientBalance {
                requested: release / payment.wrap_rate(),
            }
            .into());
        }

        // Sold inventory becomes a confidential balance held for claims.
        if tokens_sold_plain > 0 {
            sale_token.wrap(vault, &pool_addr, tokens_sold_plain)?;
        }
        payment.transfer(vault, &pool_addr, &operator, used)?;
        payment.unwrap(vault, &operator, release)?;

        self.pool.fill_numerator = fill_numerator;
        self.pool.fill_denominator = fill_denominator;
        self.pool.wei_raised = wei_raised;
        self.pool.tokens_sold = tokens_sold_plain;
        self.pool.token_balance = 0;
        self.pool.set_state(PoolState::Finalized)?;

        info!(
            eth_raised,
            tokens_sold = tokens_sold_plain,
            surplus,
            "presale finalized"
        );
        self.events.push(PresaleEvent::PoolResolved {
            outcome: SaleOutcome::Success,
            wei_raised: self.pool.wei_raised,
            tokens_sold: tokens_sold_plain,
            tokens_returned: surplus,
        });
        vault.clear_transient();
        Ok(SaleOutcome::Success)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Settle one participant after a successful sale: compute the used
    /// portion of their contribution at the pool fill ratio, write the
    /// token allocation, and refund the excess. Homomorphic and
    /// truncating throughout; when the fill ratio is 1 the used amount
    /// equals the contribution and the refund is zero.
    pub fn settle_bid(
        &mut self,
        vault: &mut HandleVault,
        payment: &mut ConfidentialToken,
        beneficiary: Address,
    ) -> PresaleResult<()> {
        if self.pool.state != PoolState::Finalized {
            return Err(PresaleError::StateViolation {
                expected: PoolState::Finalized,
                actual: self.pool.state,
            });
        }
        let record = self
            .ledger
            .get(&beneficiary)
            .ok_or(PresaleError::NoContribution)?;
        if record.settled {
            return Err(PresaleError::AlreadySettled);
        }
        let contribution = record.contribution.ok_or(PresaleError::NoContribution)?;
        if self.pool.fill_denominator == 0 {
            return Err(PresaleError::ZeroFillDenominator);
        }

        let pool_addr = self.pool.address;
        if !vault.gt_zero(&pool_addr, contribution)? {
            return Err(PresaleError::NoContribution);
        }

        let scaled = vault.mul_plain(&pool_addr, contribution, self.pool.fill_numerator)?;
        let used = vault.div_plain(&pool_addr, scaled, self.pool.fill_denominator)?;
        let refund_amount = vault.sub(&pool_addr, contribution, used)?;
        let allocated =
            vault.mul_plain(&pool_addr, used, self.pool.token_per_eth_with_decimals)?;
        vault.grant_use(allocated, &beneficiary, PermissionKind::Persistent)?;
        vault.grant_use(allocated, &pool_addr, PermissionKind::Persistent)?;

        // Flag and allocation are committed before the external transfer.
        {
            let record = self
                .ledger
                .get_mut(&beneficiary)
                .ok_or(PresaleError::NoContribution)?;
            record.claimable = Some(allocated);
            record.settled = true;
        }
        payment.transfer(vault, &pool_addr, &beneficiary, refund_amount)?;

        self.events.push(PresaleEvent::BidSettled { beneficiary });
        debug!("bid settled");
        vault.clear_transient();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Claim / refund
    // ------------------------------------------------------------------

    /// Transfer a settled allocation to its beneficiary. One-shot; the
    /// claimed flag is set before the transfer executes.
    pub fn claim_tokens(
        &mut self,
        vault: &mut HandleVault,
        sale_token: &mut ConfidentialToken,
        beneficiary: Address,
    ) -> PresaleResult<()> {
        if self.pool.state != PoolState::Finalized {
            return Err(PresaleError::StateViolation {
                expected: PoolState::Finalized,
                actual: self.pool.state,
            });
        }
        let record = self
            .ledger
            .get(&beneficiary)
            .ok_or(PresaleError::NothingToClaim)?;
        if record.claimed {
            return Err(PresaleError::AlreadyClaimed);
        }
        let claimable = record.claimable.ok_or(PresaleError::NothingToClaim)?;

        let pool_addr = self.pool.address;
        self.ledger
            .get_mut(&beneficiary)
            .ok_or(PresaleError::NothingToClaim)?
            .claimed = true;
        sale_token.transfer(vault, &pool_addr, &beneficiary, claimable)?;

        self.events.push(PresaleEvent::TokensClaimed { beneficiary });
        debug!("allocation claimed");
        vault.clear_transient();
        Ok(())
    }

    /// Return a participant's full contribution after cancellation.
    /// One-shot; the refunded flag is set before the transfer executes.
    pub fn refund(
        &mut self,
        vault: &mut HandleVault,
        payment: &mut ConfidentialToken,
        participant: Address,
    ) -> PresaleResult<()> {
        if self.pool.state != PoolState::Cancelled {
            return Err(PresaleError::StateViolation {
                expected: PoolState::Cancelled,
                actual: self.pool.state,
            });
        }
        let record = self
            .ledger
            .get(&participant)
            .ok_or(PresaleError::NoContribution)?;
        if record.refunded {
            return Err(PresaleError::AlreadyRefunded);
        }
        let contribution = record.contribution.ok_or(PresaleError::NoContribution)?;

        let pool_addr = self.pool.address;
        self.ledger
            .get_mut(&participant)
            .ok_or(PresaleError::NoContribution)?
            .refunded = true;
        payment.transfer(vault, &pool_addr, &participant, contribution)?;

        self.events.push(PresaleEvent::Refunded { participant });
        debug!("contribution refunded");
        vault.clear_transient();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> PoolState {
        self.pool.state
    }

    pub fn options(&self) -> &PresaleOptions {
        &self.pool.options
    }

    pub fn operator(&self) -> &Address {
        &self.pool.operator
    }

    pub fn address(&self) -> &Address {
        &self.pool.address
    }

    /// Wrapped sale-token units per payment unit
    pub fn rate(&self) -> u64 {
        self.pool.token_per_eth_with_decimals
    }

    /// Pool-wide fill ratio, once finalize has set it
    pub fn fill_ratio(&self) -> Option<(u64, u64)> {
        if self.pool.fill_denominator == 0 {
            None
        } else {
            Some((self.pool.fill_numerator, self.pool.fill_denominator))
        }
    }

    pub fn wei_raised(&self) -> u128 {
        self.pool.wei_raised
    }

    pub fn tokens_sold(&self) -> u64 {
        self.pool.tokens_sold
    }

    pub fn token_balance(&self) -> u64 {
        self.pool.token_balance
    }

    /// Encrypted aggregate of accepted contributions
    pub fn eth_raised_encrypted(&self) -> Handle {
        self.pool.eth_raised_encrypted
    }

    /// A participant's encrypted running contribution, if any
    pub fn contribution_of(&self, participant: &Address) -> Option<Handle> {
        self.ledger.get(participant).and_then(|r| r.contribution)
    }

    /// A participant's encrypted settled allocation, if any
    pub fn claimable_of(&self, participant: &Address) -> Option<Handle> {
        self.ledger.get(participant).and_then(|r| r.claimable)
    }

    /// Observer event log
    pub fn events(&self) -> &[PresaleEvent] {
        &self.events
    }
}

impl std::fmt::Debug for Presale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presale")
            .field("state", &self.pool.state)
            .field("participants", &self.ledger.len())
            .field("events", &self.events.len())
            .finish()
    }
}
