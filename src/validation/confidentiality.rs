//! Transaction confidentiality.
//!
//! Per-transaction keys are derived from the network chain key and the
//! transaction nonce:
//!
//! ```text
//! root             = HMAC(chain_key, nonce)
//! payload_key      = HMAC(root, 0x01)
//! chaincode_id_key = HMAC(root, 0x02)
//! ```
//!
//! Submitters seal with [`seal_transaction`] before signing; validators open
//! with [`open_transaction`] during pre-execution.

use crate::crypto::CryptoError;
use crate::crypto::symmetric::{self, KEY_LENGTH};
use crate::types::{ConfidentialityLevel, Transaction};
use rand::RngCore;
use rand::rngs::OsRng;

/// Length of the nonce generated for sealed transactions
pub const TX_NONCE_LENGTH: usize = 32;

const PAYLOAD_LABEL: [u8; 1] = [1];
const CHAINCODE_ID_LABEL: [u8; 1] = [2];

struct TransactionKeys {
    payload: [u8; KEY_LENGTH],
    chaincode_id: [u8; KEY_LENGTH],
}

impl TransactionKeys {
    fn derive(chain_key: &[u8], nonce: &[u8]) -> Result<Self, CryptoError> {
        let root = symmetric::derive_key(chain_key, nonce)?;
        Ok(Self {
            payload: symmetric::derive_key(&root, &PAYLOAD_LABEL)?,
            chaincode_id: symmetric::derive_key(&root, &CHAINCODE_ID_LABEL)?,
        })
    }
}

/// Encrypt the payload and chaincode id of `tx` and mark it confidential.
///
/// A random nonce is assigned when the transaction has none. The plaintext
/// fields are cleared.
pub fn seal_transaction(chain_key: &[u8], mut tx: Transaction) -> Result<Transaction, CryptoError> {
    if tx.nonce.is_empty() {
        tx.nonce = vec![0u8; TX_NONCE_LENGTH];
        OsRng.fill_bytes(&mut tx.nonce);
    }
    let keys = TransactionKeys::derive(chain_key, &tx.nonce)?;

    tx.encrypted_payload = symmetric::encrypt(&keys.payload, &tx.payload)?;
    tx.encrypted_chaincode_id = symmetric::encrypt(&keys.chaincode_id, &tx.chaincode_id)?;
    tx.payload.clear();
    tx.chaincode_id.clear();
    tx.confidentiality_level = ConfidentialityLevel::Confidential;
    Ok(tx)
}

/// Decrypt the payload and chaincode id of `tx` into its plaintext fields.
///
/// Either both fields are decrypted or the transaction is dropped with
/// [`CryptoError::Decryption`].
pub fn open_transaction(chain_key: &[u8], mut tx: Transaction) -> Result<Transaction, CryptoError> {
    let keys = TransactionKeys::derive(chain_key, &tx.nonce).map_err(|_| CryptoError::Decryption)?;

    let payload = symmetric::decrypt(&keys.payload, &tx.encrypted_payload)?;
    let chaincode_id = symmetric::decrypt(&keys.chaincode_id, &tx.encrypted_chaincode_id)?;

    tx.payload = payload;
    tx.chaincode_id = chaincode_id;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;

    const CHAIN_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn plain() -> Transaction {
        Transaction::new(TransactionKind::Invoke, "tx-1", b"mycc".to_vec(), b"transfer a b 10".to_vec())
    }

    #[test]
    fn seal_hides_plaintext() {
        let sealed = seal_transaction(CHAIN_KEY, plain()).unwrap();

        assert!(sealed.is_confidential());
        assert!(sealed.payload.is_empty());
        assert!(sealed.chaincode_id.is_empty());
        assert_eq!(sealed.nonce.len(), TX_NONCE_LENGTH);
        assert!(!sealed.encrypted_payload.is_empty());
        assert!(!sealed.encrypted_chaincode_id.is_empty());
    }

    #[test]
    fn open_restores_plaintext() {
        let opened = open_transaction(CHAIN_KEY, seal_transaction(CHAIN_KEY, plain()).unwrap()).unwrap();

        assert_eq!(opened.payload, plain().payload);
        assert_eq!(opened.chaincode_id, plain().chaincode_id);
    }

    #[test]
    fn keys_are_bound_to_the_nonce() {
        let mut sealed = seal_transaction(CHAIN_KEY, plain()).unwrap();
        sealed.nonce[0] ^= 0xff;

        assert_eq!(open_transaction(CHAIN_KEY, sealed), Err(CryptoError::Decryption));
    }

    #[test]
    fn payload_and_chaincode_keys_differ() {
        let mut sealed = seal_transaction(CHAIN_KEY, plain()).unwrap();
        std::mem::swap(&mut sealed.encrypted_payload, &mut sealed.encrypted_chaincode_id);

        assert_eq!(open_transaction(CHAIN_KEY, sealed), Err(CryptoError::Decryption));
    }

    #[test]
    fn wrong_chain_key_fails() {
        let sealed = seal_transaction(CHAIN_KEY, plain()).unwrap();
        assert_eq!(
            open_transaction(b"another chain key", sealed),
            Err(CryptoError::Decryption)
        );
    }
}
