// ABOUTME: Encryption seam for secrets persisted by the control plane.
// ABOUTME: The real cipher lives outside this crate; a pass-through vault serves development and tests.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Symmetric encryption for values at rest.
///
/// Implementations must map the empty string to itself in both directions;
/// [`seal`] and [`open`] enforce that for callers.
pub trait Vault: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, VaultError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError>;
}

/// Stores values as-is. Only for local development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextVault;

impl Vault for PlaintextVault {
    fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        Ok(ciphertext.to_string())
    }
}

/// Encrypt, passing the empty string through untouched.
pub fn seal(vault: &dyn Vault, plaintext: &str) -> Result<String, VaultError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    vault.encrypt(plaintext)
}

/// Decrypt, passing the empty string through untouched.
pub fn open(vault: &dyn Vault, ciphertext: &str) -> Result<String, VaultError> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }
    vault.decrypt(ciphertext)
}
