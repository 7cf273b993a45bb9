//! Handles, principals, and externally encoded inputs
//!
//! A [`Handle`] is the only thing callers ever hold for an encrypted value:
//! a Copy newtype over a vault slot id. The ciphertext itself and the
//! capability list for the handle stay inside the vault.

use serde::{Deserialize, Serialize};

/// 32-byte principal address (participant, pool, operator, token service)
pub type Address = [u8; 32];

/// Opaque reference to an encrypted value in the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub(crate) u64);

impl Handle {
    /// Raw slot id, for diagnostics only
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Permission kind in the capability side table
///
/// Transient grants are scoped to a single engine operation and wiped by
/// [`crate::HandleVault::clear_transient`]; persistent grants survive until
/// the handle is dropped from the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionKind {
    Transient,
    Persistent,
}

/// Externally encoded encrypted input
///
/// Produced by the service's input gateway ([`crate::HandleVault::encode_input`])
/// and admitted back through [`crate::HandleVault::decode_external`] against a
/// proof binding the payload to its submitter.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncodedBid {
    /// Serialized ciphertext bytes
    data: Vec<u8>,
    /// Number of bits encrypted
    bits: u8,
}

impl EncodedBid {
    pub(crate) fn new(data: Vec<u8>, bits: u8) -> Self {
        Self { data, bits }
    }

    /// Serialized ciphertext bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bits encrypted
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Compute the blake3 proof binding this payload to a submitter
    pub fn proof_for(&self, submitter: &Address) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.data);
        hasher.update(&[self.bits]);
        hasher.update(submitter);
        *hasher.finalize().as_bytes()
    }
}

impl std::fmt::Debug for EncodedBid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBid")
            .field("size", &self.data.len())
            .field("bits", &self.bits)
            .finish()
    }
}
