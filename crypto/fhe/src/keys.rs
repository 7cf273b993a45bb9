//! FHE key management
//!
//! Wraps the TFHE-rs key pair used by the vault.
//! - ClientKey: encryption and decryption, held by the service only
//! - ServerKey: homomorphic operations; TFHE-rs requires it to be installed
//!   in per-thread context before any operation runs

use crate::{FheConfig, FheError, FheResult};
use tfhe::{generate_keys, ConfigBuilder};
use tfhe::{ClientKey as TfheClientKey, ServerKey as TfheServerKey};

/// Client key for encryption and decryption.
/// Held by the vault; never handed to callers.
#[derive(Clone)]
pub struct ClientKey {
    pub(crate) inner: TfheClientKey,
    /// Configuration hash for versioning
    config_hash: [u8; 32],
}

impl ClientKey {
    /// Generate a new client key for the given configuration
    pub fn generate(config: &FheConfig) -> FheResult<Self> {
        if config.security_bits < 128 {
            return Err(FheError::KeyGenerationFailed(format!(
                "security parameter below minimum: {} bits",
                config.security_bits
            )));
        }

        let tfhe_config = ConfigBuilder::default().build();
        let (client_key, _server_key) = generate_keys(tfhe_config);

        Ok(Self {
            inner: client_key,
            config_hash: hash_config(config),
        })
    }

    /// Derive the server key for homomorphic operations
    pub fn derive_server_key(&self) -> ServerKey {
        ServerKey {
            inner: TfheServerKey::new(&self.inner),
            config_hash: self.config_hash,
        }
    }

    /// Access the inner TFHE-rs key
    pub(crate) fn inner(&self) -> &TfheClientKey {
        &self.inner
    }

    /// Hash of the configuration this key was generated under
    pub fn config_hash(&self) -> [u8; 32] {
        self.config_hash
    }
}

/// Server key for homomorphic operations
#[derive(Clone)]
pub struct ServerKey {
    pub(crate) inner: TfheServerKey,
    config_hash: [u8; 32],
}

impl ServerKey {
    /// Install this key into the current thread's TFHE-rs context.
    /// Must run on every thread that performs homomorphic operations;
    /// the vault re-installs before each operation.
    pub fn install(&self) {
        tfhe::set_server_key(self.inner.clone());
    }

    /// Hash of the configuration this key was generated under
    pub fn config_hash(&self) -> [u8; 32] {
        self.config_hash
    }
}

fn hash_config(config: &FheConfig) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&config.security_bits.to_le_bytes());
    hasher.update(&[config.multi_threaded as u8]);
    *hasher.finalize().as_bytes()
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("config_hash", &hex_prefix(&self.config_hash))
            .finish()
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("config_hash", &hex_prefix(&self.config_hash))
            .finish()
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect()
}
