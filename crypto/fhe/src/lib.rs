//! VEILRAISE Encrypted Value Service
//!
//! TFHE-backed vault of opaque encrypted-integer handles. Callers never hold
//! ciphertexts directly: every encrypted value lives in the vault, addressed
//! by a [`Handle`], and every use is gated by a capability side table
//! (principal -> transient/persistent permission).
//!
//! # Key Features:
//! - Homomorphic add/sub, multiply/divide by plaintext, comparisons
//! - Permissioned decrypt (one value, one authorized principal at a time)
//! - Input gateway: externally encoded ciphertexts admitted against a
//!   blake3 proof binding the payload to its submitter
//!
//! # Architecture:
//! - ClientKey: encryption/decryption, held by the service
//! - ServerKey: homomorphic operations, installed per thread before use
//! - Handle: Copy newtype over a vault slot; ciphertext and capability
//!   list live in vault side tables

pub mod errors;
pub mod handle;
pub mod keys;
pub mod vault;

pub use errors::FheError;
pub use handle::{Address, EncodedBid, Handle, PermissionKind};
pub use keys::{ClientKey, ServerKey};
pub use vault::HandleVault;

/// FHE configuration
#[derive(Clone, Debug)]
pub struct FheConfig {
    /// Security parameter (bits)
    pub security_bits: u32,
    /// Enable multi-threaded operations
    pub multi_threaded: bool,
}

impl Default for FheConfig {
    fn default() -> Self {
        Self {
            security_bits: 128,
            multi_threaded: true,
        }
    }
}

/// Result type for encrypted value service operations
pub type FheResult<T> = Result<T, FheError>;
