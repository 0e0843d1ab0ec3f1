use super::CryptoError;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use std::fmt;

/// Private signing key, tagged by algorithm
#[derive(Clone)]
pub enum PrivateKey {
    EcdsaP256(SigningKey),
}

impl PrivateKey {
    /// Decode a PKCS#8 DER private key
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = SigningKey::from_pkcs8_der(der).map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
        Ok(PrivateKey::EcdsaP256(key))
    }

    /// Sign `message`, returning a DER-encoded signature
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            PrivateKey::EcdsaP256(key) => {
                let signature: Signature = key
                    .try_sign(message)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::EcdsaP256(key) => PublicKey::EcdsaP256(*key.verifying_key()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::EcdsaP256(_) => f.write_str("PrivateKey::EcdsaP256(<redacted>)"),
        }
    }
}

/// Public verification key, tagged by algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    EcdsaP256(VerifyingKey),
}

impl PublicKey {
    /// Verify a DER-encoded signature over `message`.
    ///
    /// `Ok(false)` is a cryptographic mismatch; `Err` means the signature
    /// could not even be decoded.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        match self {
            PublicKey::EcdsaP256(key) => {
                let signature = Signature::from_der(signature).map_err(|_| CryptoError::MalformedSignature)?;
                Ok(key.verify(message, &signature).is_ok())
            }
        }
    }

    /// Like [`PublicKey::verify`], over a digest the caller already computed
    pub fn verify_prehash(&self, prehash: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        match self {
            PublicKey::EcdsaP256(key) => {
                let signature = Signature::from_der(signature).map_err(|_| CryptoError::MalformedSignature)?;
                Ok(key.verify_prehash(prehash, &signature).is_ok())
            }
        }
    }
}
