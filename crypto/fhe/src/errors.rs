//! Encrypted value service error types

use thiserror::Error;

/// Errors that can occur in the encrypted value service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FheError {
    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Handle does not exist in the vault
    #[error("Unknown handle: {0}")]
    UnknownHandle(u64),

    /// Principal lacks use permission on a handle
    #[error("Principal not authorized for handle {handle}")]
    NotAuthorized { handle: u64 },

    /// External input proof did not match the payload/submitter binding
    #[error("Input proof verification failed")]
    InvalidProof,

    /// Division by a zero plaintext divisor
    #[error("Division by zero")]
    DivisionByZero,

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Encoded input declared an unsupported ciphertext width
    #[error("Unsupported ciphertext width: {0} bits")]
    UnsupportedWidth(u8),
}
