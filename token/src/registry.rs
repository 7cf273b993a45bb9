//! Encrypted balance registry
//!
//! One `ConfidentialToken` per asset. The asset id doubles as the service's
//! principal address in the vault capability table: every balance handle
//! carries a persistent grant for the service (so it can keep operating on
//! the balance) and for the owning account (so the owner can decrypt it).

use std::collections::HashMap;
use tracing::debug;
use veilraise_fhe::{Address, Handle, HandleVault, PermissionKind};

use crate::{TokenError, TokenResult};

/// Per-asset confidential balance registry
pub struct ConfidentialToken {
    /// Asset identifier; also the service principal in the vault ACL
    asset_id: Address,
    /// Plain units per encrypted unit (>= 1)
    wrap_rate: u64,
    balances: HashMap<Address, Handle>,
    /// Encrypted units in circulation (plain-side supply accounting)
    total_wrapped: u64,
}

impl ConfidentialToken {
    /// Create a registry for an asset. `wrap_rate` is the number of plain
    /// base units represented by one encrypted unit.
    pub fn new(asset_id: Address, wrap_rate: u64) -> Self {
        debug_assert!(wrap_rate >= 1);
        Self {
            asset_id,
            wrap_rate: wrap_rate.max(1),
            balances: HashMap::new(),
            total_wrapped: 0,
        }
    }

    /// Asset identifier
    pub fn asset_id(&self) -> &Address {
        &self.asset_id
    }

    /// Plain units per encrypted unit
    pub fn wrap_rate(&self) -> u64 {
        self.wrap_rate
    }

    /// Encrypted units currently in circulation
    pub fn total_wrapped(&self) -> u64 {
        self.total_wrapped
    }

    /// Current encrypted balance handle for an account, if any
    pub fn balance_of(&self, account: &Address) -> Option<Handle> {
        self.balances.get(account).copied()
    }

    /// Wrap plain units into an account's encrypted balance. Truncates to
    /// whole encrypted units at the wrap rate; returns the updated balance.
    pub fn wrap(
        &mut self,
        vault: &mut HandleVault,
        account: &Address,
        plain_amount: u64,
    ) -> TokenResult<Handle> {
        let units = plain_amount / self.wrap_rate;
        if units == 0 {
            return Err(TokenError::AmountTooSmall {
                amount: plain_amount,
                rate: self.wrap_rate,
            });
        }

        // Supply accounting is checked before the balance write so a failed
        // wrap leaves the registry untouched.
        let new_total = self
            .total_wrapped
            .checked_add(units)
            .ok_or(TokenError::ArithmeticOverflow)?;

        let minted = vault.encrypt_constant(units, &self.asset_id)?;
        let new_balance = match self.balances.get(account) {
            Some(balance) => vault.add(&self.asset_id, *balance, minted)?,
            None => minted,
        };
        self.record_balance(vault, account, new_balance)?;
        self.total_wrapped = new_total;

        debug!(units, "wrapped plain amount into confidential balance");
        Ok(new_balance)
    }

    /// Unwrap plain units out of an account's encrypted balance. Fails if
    /// the encrypted balance is below the requested amount (checked via a
    /// single disclosed comparison bit). Returns the plain units released.
    pub fn unwrap(
        &mut self,
        vault: &mut HandleVault,
        account: &Address,
        plain_amount: u64,
    ) -> TokenResult<u64> {
        let units = plain_amount / self.wrap_rate;
        if units == 0 {
            return Err(TokenError::AmountTooSmall {
                amount: plain_amount,
                rate: self.wrap_rate,
            });
        }
        let balance = self.balances.get(account).copied().ok_or(TokenError::NoBalance)?;
        if !vault.ge_plain(&self.asset_id, balance, units)? {
            return Err(TokenError::InsufficientBalance { requested: units });
        }

        let new_total = self
            .total_wrapped
            .checked_sub(units)
            .ok_or(TokenError::ArithmeticOverflow)?;

        let debit = vault.encrypt_constant(units, &self.asset_id)?;
        let new_balance = vault.sub(&self.asset_id, balance, debit)?;
        self.record_balance(vault, account, new_balance)?;
        self.total_wrapped = new_total;

        let released = units
            .checked_mul(self.wrap_rate)
            .ok_or(TokenError::ArithmeticOverflow)?;
        debug!(units, "unwrapped confidential balance to plain amount");
        Ok(released)
    }

    /// Whether transferring `amount` from `from` to `to` (at min-semantics,
    /// capped by the sender's balance) would leave `to` able to release
    /// `plain_amount`. Discloses a single comparison bit and mutates no
    /// registry state, so callers can validate a transfer-then-unwrap
    /// sequence before running either mutation.
    pub fn can_fund_release(
        &self,
        vault: &mut HandleVault,
        from: &Address,
        to: &Address,
        amount: Handle,
        plain_amount: u64,
    ) -> TokenResult<bool> {
        let units = plain_amount / self.wrap_rate;
        if units == 0 {
            return Err(TokenError::AmountTooSmall {
                amount: plain_amount,
                rate: self.wrap_rate,
            });
        }
        if !vault.is_authorized(amount, from) {
            return Err(TokenError::AmountNotAuthorized);
        }
        let from_balance = self.balances.get(from).copied().ok_or(TokenError::NoBalance)?;
        vault.grant_use(amount, &self.asset_id, PermissionKind::Transient)?;

        let moved = vault.min(&self.asset_id, amount, from_balance)?;
        let funded = match self.balances.get(to) {
            Some(balance) => vault.add(&self.asset_id, *balance, moved)?,
            None => moved,
        };
        Ok(vault.ge_plain(&self.asset_id, funded, units)?)
    }

    /// Move an encrypted amount between accounts on the owner's behalf.
    /// Returns the actually-moved amount handle: the encrypted minimum of
    /// the requested amount and the sender's balance.
    pub fn transfer(
        &mut self,
        vault: &mut HandleVault,
        from: &Address,
        to: &Address,
        amount: Handle,
    ) -> TokenResult<Handle> {
        self.execute_transfer(vault, from, to, amount, from)
    }

    /// Spender-initiated transfer. Same admission rule (the amount handle
    /// must be authorized for the debited account); the moved-amount handle
    /// is additionally granted to the spender so it can keep computing with
    /// the service-reported figure.
    pub fn transfer_from(
        &mut self,
        vault: &mut HandleVault,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Handle,
    ) -> TokenResult<Handle> {
        self.execute_transfer(vault, from, to, amount, spender)
    }

    fn execute_transfer(
        &mut self,
        vault: &mut HandleVault,
        from: &Address,
        to: &Address,
        amount: Handle,
        grantee: &Address,
    ) -> TokenResult<Handle> {
        if !vault.is_authorized(amount, from) {
            return Err(TokenError::AmountNotAuthorized);
        }
        let from_balance = self.balances.get(from).copied().ok_or(TokenError::NoBalance)?;

        // The service needs use rights on the caller-supplied handle.
        vault.grant_use(amount, &self.asset_id, PermissionKind::Transient)?;

        let moved = vault.min(&self.asset_id, amount, from_balance)?;
        if from == to {
            // Self-transfer: balances are unchanged, only the moved amount
            // is reported.
            vault.grant_use(moved, grantee, PermissionKind::Transient)?;
            return Ok(moved);
        }
        let new_from = vault.sub(&self.asset_id, from_balance, moved)?;
        let new_to = match self.balances.get(to) {
            Some(balance) => vault.add(&self.asset_id, *balance, moved)?,
            None => moved,
        };

        self.record_balance(vault, from, new_from)?;
        self.record_balance(vault, to, new_to)?;
        vault.grant_use(moved, grantee, PermissionKind::Transient)?;

        debug!("confidential transfer executed");
        Ok(moved)
    }

    fn record_balance(
        &mut self,
        vault: &mut HandleVault,
        account: &Address,
        balance: Handle,
    ) -> TokenResult<()> {
        vault.grant_use(balance, account, PermissionKind::Persistent)?;
        vault.grant_use(balance, &self.asset_id, PermissionKind::Persistent)?;
        self.balances.insert(*account, balance);
        Ok(())
    }
}

impl std::fmt::Debug for ConfidentialToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialToken")
            .field("accounts", &self.balances.len())
            .field("total_wrapped", &self.total_wrapped)
            .field("wrap_rate", &self.wrap_rate)
            .finish()
    }
}
