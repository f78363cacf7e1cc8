//! Server secret used to MAC signer tokens.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::token::TokenError;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// HMAC key material. Zeroized on drop; `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    /// Wrap configured key material. Rejects keys shorter than 16 bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::InvalidSecret(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Generate a random 32-byte secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_rejected() {
        assert!(TokenSecret::new(b"short".to_vec()).is_err());
    }

    #[test]
    fn generated_secrets_differ() {
        assert_ne!(
            TokenSecret::generate().as_bytes(),
            TokenSecret::generate().as_bytes()
        );
    }

    #[test]
    fn debug_is_redacted() {
        let s = TokenSecret::new(b"0123456789abcdef-very-secret".to_vec()).unwrap();
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
