use serde::{Deserialize, Serialize};

/// What a transaction asks the chaincode runtime to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deploy,
    Invoke,
    Query,
}

/// Whether the payload and chaincode id travel in the clear or encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidentialityLevel {
    Public,
    Confidential,
}

/// Transaction as submitted to the peer
///
/// Byte fields use an empty vector for "absent". For confidential transactions
/// `chaincode_id` and `payload` are empty on the wire and get populated by
/// pre-execution from `encrypted_chaincode_id` / `encrypted_payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub uuid: String,
    pub timestamp: i64,
    pub chaincode_id: Vec<u8>,
    pub payload: Vec<u8>,
    pub confidentiality_level: ConfidentialityLevel,
    pub nonce: Vec<u8>,
    /// DER-encoded certificate of the submitter
    pub cert: Vec<u8>,
    /// Signature over [`Transaction::canonical_bytes`]
    pub signature: Vec<u8>,
    pub encrypted_payload: Vec<u8>,
    pub encrypted_chaincode_id: Vec<u8>,
}

impl Transaction {
    /// Creates an unsigned public transaction
    pub fn new(kind: TransactionKind, uuid: impl Into<String>, chaincode_id: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            kind,
            uuid: uuid.into(),
            timestamp: chrono::Utc::now().timestamp(),
            chaincode_id,
            payload,
            confidentiality_level: ConfidentialityLevel::Public,
            nonce: Vec::new(),
            cert: Vec::new(),
            signature: Vec::new(),
            encrypted_payload: Vec::new(),
            encrypted_chaincode_id: Vec::new(),
        }
    }

    /// Binary wire form of the transaction
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// The exact byte sequence a submitter signs: the wire form with the
    /// signature field cleared.
    ///
    /// Works on a copy, so `self.signature` is left as it was.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut unsigned = self.clone();
        unsigned.signature.clear();
        unsigned.to_bytes()
    }

    pub fn is_confidential(&self) -> bool {
        self.confidentiality_level == ConfidentialityLevel::Confidential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bytes_ignore_signature() {
        let mut tx = Transaction::new(TransactionKind::Invoke, "tx-1", b"mycc".to_vec(), b"args".to_vec());
        let unsigned = tx.canonical_bytes().unwrap();

        tx.signature = vec![1, 2, 3];
        assert_eq!(tx.canonical_bytes().unwrap(), unsigned);
        assert_eq!(tx.signature, vec![1, 2, 3]);
    }

    #[test]
    fn canonical_bytes_cover_payload() {
        let tx = Transaction::new(TransactionKind::Invoke, "tx-1", b"mycc".to_vec(), b"args".to_vec());
        let mut other = tx.clone();
        other.payload = b"argz".to_vec();

        assert_ne!(tx.canonical_bytes().unwrap(), other.canonical_bytes().unwrap());
    }

    #[test]
    fn wire_form_decodes() {
        let mut tx = Transaction::new(TransactionKind::Deploy, "tx-2", b"cc".to_vec(), Vec::new());
        tx.signature = vec![9; 70];
        let decoded = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }
}
