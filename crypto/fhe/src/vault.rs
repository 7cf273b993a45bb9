//! Handle vault: ciphertext store, capability table, homomorphic operations
//!
//! The vault plays the trusted-coprocessor role: it holds the client key and
//! the ciphertexts, executes homomorphic arithmetic on behalf of callers,
//! and discloses plaintext only through [`HandleVault::decrypt`] (gated by
//! the capability table) or as single comparison bits.
//!
//! Operand handles must be authorized for the calling principal; operation
//! results are granted transiently to the caller, so a chain of arithmetic
//! works without explicit grants but nothing outlives the operation unless
//! upgraded to a persistent grant.

use crate::handle::{Address, EncodedBid, Handle, PermissionKind};
use crate::keys::{ClientKey, ServerKey};
use crate::{FheConfig, FheError, FheResult};
use std::collections::HashMap;
use tfhe::prelude::*;
use tfhe::FheUint64;
use tracing::debug;

/// Encrypted-value store with capability-gated operations
pub struct HandleVault {
    client_key: ClientKey,
    server_key: ServerKey,
    slots: HashMap<u64, FheUint64>,
    acl: HashMap<u64, HashMap<Address, PermissionKind>>,
    next_slot: u64,
}

impl HandleVault {
    /// Create a vault with freshly generated keys
    pub fn new(config: &FheConfig) -> FheResult<Self> {
        let client_key = ClientKey::generate(config)?;
        let server_key = client_key.derive_server_key();
        Ok(Self::with_keys(client_key, server_key))
    }

    /// Create a vault over an existing key pair
    pub fn with_keys(client_key: ClientKey, server_key: ServerKey) -> Self {
        server_key.install();
        Self {
            client_key,
            server_key,
            slots: HashMap::new(),
            acl: HashMap::new(),
            next_slot: 1,
        }
    }

    /// TFHE-rs keeps the server key in thread-local context; re-install it
    /// before every operation so the vault works from any thread.
    fn enter(&self) {
        self.server_key.install();
    }

    fn insert(&mut self, ciphertext: FheUint64) -> Handle {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(slot, ciphertext);
        Handle(slot)
    }

    fn ciphertext(&self, handle: Handle) -> FheResult<&FheUint64> {
        self.slots
            .get(&handle.0)
            .ok_or(FheError::UnknownHandle(handle.0))
    }

    fn require_use(&self, caller: &Address, handle: Handle) -> FheResult<&FheUint64> {
        if !self.is_authorized(handle, caller) {
            return Err(FheError::NotAuthorized { handle: handle.0 });
        }
        self.ciphertext(handle)
    }

    // ------------------------------------------------------------------
    // Capability table
    // ------------------------------------------------------------------

    /// Grant use/decrypt permission on a handle to a principal.
    /// A persistent grant is never downgraded back to transient.
    pub fn grant_use(
        &mut self,
        handle: Handle,
        principal: &Address,
        kind: PermissionKind,
    ) -> FheResult<()> {
        if !self.slots.contains_key(&handle.0) {
            return Err(FheError::UnknownHandle(handle.0));
        }
        let entry = self.acl.entry(handle.0).or_default();
        match entry.get(principal) {
            Some(PermissionKind::Persistent) => {}
            _ => {
                entry.insert(*principal, kind);
            }
        }
        Ok(())
    }

    /// Whether a principal may use or decrypt a handle
    pub fn is_authorized(&self, handle: Handle, principal: &Address) -> bool {
        self.acl
            .get(&handle.0)
            .map(|grants| grants.contains_key(principal))
            .unwrap_or(false)
    }

    /// Wipe every transient grant. Engines call this at the end of each
    /// operation; only persistent grants survive across operations.
    pub fn clear_transient(&mut self) {
        for grants in self.acl.values_mut() {
            grants.retain(|_, kind| *kind == PermissionKind::Persistent);
        }
        self.acl.retain(|_, grants| !grants.is_empty());
    }

    // ------------------------------------------------------------------
    // Encryption and input gateway
    // ------------------------------------------------------------------

    /// Encrypt a plaintext constant; the result is granted transiently to
    /// the caller.
    pub fn encrypt_constant(&mut self, value: u64, caller: &Address) -> FheResult<Handle> {
        self.enter();
        let ciphertext = FheUint64::encrypt(value, self.client_key.inner());
        let handle = self.insert(ciphertext);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    /// Encode a value for external submission: serialized ciphertext plus a
    /// blake3 proof binding the payload to the submitting address.
    pub fn encode_input(
        &self,
        value: u64,
        submitter: &Address,
    ) -> FheResult<(EncodedBid, [u8; 32])> {
        self.enter();
        let ciphertext = FheUint64::encrypt(value, self.client_key.inner());
        let data = bincode::serialize(&ciphertext)
            .map_err(|e| FheError::SerializationError(e.to_string()))?;
        let encoded = EncodedBid::new(data, 64);
        let proof = encoded.proof_for(submitter);
        Ok((encoded, proof))
    }

    /// Admit an externally encoded ciphertext after checking its proof.
    /// Replaying another submitter's payload fails the binding check.
    pub fn decode_external(
        &mut self,
        encoded: &EncodedBid,
        proof: &[u8; 32],
        submitter: &Address,
    ) -> FheResult<Handle> {
        if encoded.bits() != 64 {
            return Err(FheError::UnsupportedWidth(encoded.bits()));
        }
        if encoded.proof_for(submitter) != *proof {
            return Err(FheError::InvalidProof);
        }
        self.enter();
        let ciphertext: FheUint64 = bincode::deserialize(encoded.data())
            .map_err(|e| FheError::SerializationError(e.to_string()))?;
        let handle = self.insert(ciphertext);
        self.grant_use(handle, submitter, PermissionKind::Transient)?;
        debug!(handle = handle.0, "external input admitted");
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Homomorphic arithmetic
    // ------------------------------------------------------------------

    /// Homomorphic addition of two encrypted values
    pub fn add(&mut self, caller: &Address, a: Handle, b: Handle) -> FheResult<Handle> {
        self.enter();
        let result = self.require_use(caller, a)? + self.require_use(caller, b)?;
        let handle = self.insert(result);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    /// Homomorphic subtraction. Wraps on underflow like the underlying
    /// scheme; callers are responsible for `a >= b`.
    pub fn sub(&mut self, caller: &Address, a: Handle, b: Handle) -> FheResult<Handle> {
        self.enter();
        let result = self.require_use(caller, a)? - self.require_use(caller, b)?;
        let handle = self.insert(result);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    /// Multiply an encrypted value by a plaintext factor
    pub fn mul_plain(&mut self, caller: &Address, a: Handle, factor: u64) -> FheResult<Handle> {
        self.enter();
        let result = self.require_use(caller, a)? * factor;
        let handle = self.insert(result);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    /// Divide an encrypted value by a plaintext divisor. Integer division:
    /// truncating, never rounding.
    pub fn div_plain(&mut self, caller: &Address, a: Handle, divisor: u64) -> FheResult<Handle> {
        if divisor == 0 {
            return Err(FheError::DivisionByZero);
        }
        self.enter();
        let result = self.require_use(caller, a)? / divisor;
        let handle = self.insert(result);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    /// Encrypted minimum of two values, via an encrypted comparison and
    /// select. Used by the transfer service for actually-moved amounts.
    pub fn min(&mut self, caller: &Address, a: Handle, b: Handle) -> FheResult<Handle> {
        self.enter();
        let lhs = self.require_use(caller, a)?;
        let rhs = self.require_use(caller, b)?;
        let a_le_b = lhs.le(rhs);
        let result = a_le_b.if_then_else(lhs, rhs);
        let handle = self.insert(result);
        self.grant_use(handle, caller, PermissionKind::Transient)?;
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Disclosure
    // ------------------------------------------------------------------

    /// Compare an encrypted value against zero, disclosing a single bit
    pub fn gt_zero(&self, caller: &Address, a: Handle) -> FheResult<bool> {
        self.enter();
        let ciphertext = self.require_use(caller, a)?;
        let bit = ciphertext.gt(0u64);
        Ok(bit.decrypt(self.client_key.inner()))
    }

    /// Compare an encrypted value against a plaintext bound, disclosing a
    /// single bit. The transfer service uses this for unwrap sufficiency.
    pub fn ge_plain(&self, caller: &Address, a: Handle, bound: u64) -> FheResult<bool> {
        self.enter();
        let ciphertext = self.require_use(caller, a)?;
        let bit = ciphertext.ge(bound);
        Ok(bit.decrypt(self.client_key.inner()))
    }

    /// Decrypt a handle for an authorized principal
    pub fn decrypt(&self, handle: Handle, principal: &Address) -> FheResult<u64> {
        if !self.is_authorized(handle, principal) {
            return Err(FheError::NotAuthorized { handle: handle.0 });
        }
        self.enter();
        let ciphertext = self.ciphertext(handle)?;
        debug!(handle = handle.0, "authorized decrypt");
        Ok(ciphertext.decrypt(self.client_key.inner()))
    }

    /// Number of live slots, for diagnostics
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the vault holds no values
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for HandleVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleVault")
            .field("slots", &self.slots.len())
            .field("acl_entries", &self.acl.len())
            .finish()
    }
}
