//! PKCE (Proof Key for Code Exchange) support, RFC 7636.
//!
//! Only the `S256` method is produced; `plain` offers nothing over omitting PKCE.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Value of the `code_challenge_method` parameter.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier, kept with the login attempt until the code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a verifier from 32 random bytes (43 base64url characters).
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the `S256` challenge sent with the authorization request.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

impl From<String> for PkceVerifier {
    fn from(verifier: String) -> Self {
        Self(verifier)
    }
}

/// PKCE code challenge: base64url(SHA256(verifier)) without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let digest = Sha256::digest(verifier.as_str().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_verifier_length() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 43);
    }

    #[test]
    fn test_generated_verifiers_differ() {
        assert_ne!(PkceVerifier::generate(), PkceVerifier::generate());
    }

    #[test]
    fn test_challenge_matches_rfc7636_appendix_b() {
        let verifier =
            PkceVerifier::from("dBjftJeZ4CVP-mJ92K9qkA4yYrSBgN8cDTzw0E0ThDY".to_string());
        assert_eq!(
            verifier.challenge().as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGEqbt7oY0"
        );
    }
}
