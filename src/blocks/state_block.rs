//! The state block: the ledger's single transaction shape.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{sign_message, verify_message, KeyResult, RawKey};
use crate::numbers::uint::{Amount, BlockHash, PublicKey, Signature, Uint256};

type Blake2b256 = Blake2b<U32>;

/// Block-type discriminant hashed ahead of the fields.
const STATE_BLOCK_PREAMBLE: u64 = 6;

/// The five fields that determine a state block's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHashables {
    pub account: PublicKey,
    /// Zero for the first block of an account.
    pub previous: BlockHash,
    pub representative: PublicKey,
    /// Balance after this block.
    pub balance: Amount,
    /// Source hash for a receive, destination key for a send, zero for a
    /// representative change.
    pub link: Uint256,
}

impl StateHashables {
    /// Blake2b-256 of the preamble followed by each field's raw bytes.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Blake2b256::new();
        hasher.update(Uint256::from(STATE_BLOCK_PREAMBLE).as_bytes());
        hasher.update(self.account.as_bytes());
        hasher.update(self.previous.as_bytes());
        hasher.update(self.representative.as_bytes());
        hasher.update(self.balance.to_be_bytes());
        hasher.update(self.link.as_bytes());

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Uint256::from_bytes(bytes)
    }
}

/// A signed state block. Hash and signature are computed once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlock {
    hashables: StateHashables,
    hash: BlockHash,
    signature: Signature,
}

impl StateBlock {
    pub fn new(
        account: PublicKey,
        previous: BlockHash,
        representative: PublicKey,
        balance: Amount,
        link: Uint256,
        private: &RawKey,
        public: &PublicKey,
    ) -> KeyResult<Self> {
        let hashables = StateHashables {
            account,
            previous,
            representative,
            balance,
            link,
        };
        let hash = hashables.hash();
        let signature = sign_message(private, public, &hash)?;
        Ok(Self {
            hashables,
            hash,
            signature,
        })
    }

    pub fn hashables(&self) -> &StateHashables {
        &self.hashables
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Recompute the hash from the fields and check the signature against
    /// the block's own account.
    pub fn verify(&self) -> bool {
        let hash = self.hashables.hash();
        hash == self.hash && verify_message(&self.hashables.account, &hash, &self.signature)
    }

    /// The node's JSON rendering of this block, with proof of work attached.
    pub fn to_json(&self, work: &str) -> JsonBlock {
        let h = &self.hashables;
        JsonBlock {
            kind: "state".to_string(),
            account: h.account.to_account(),
            previous: h.previous.to_hex(),
            representative: h.representative.to_account(),
            balance: h.balance.to_dec_string(),
            link: h.link.to_hex(),
            link_as_account: h.link.to_account(),
            signature: self.signature.to_hex(),
            work: work.to_string(),
        }
    }
}

/// State block as exchanged with the node in `process` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub account: String,
    pub previous: String,
    pub representative: String,
    pub balance: String,
    pub link: String,
    pub link_as_account: String,
    pub signature: String,
    pub work: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{deterministic_key, pub_key};

    const SEED: &str = "1234567891234567891234567891234567891234567891234567891234567891";

    fn keypair() -> (RawKey, PublicKey) {
        let private = deterministic_key(&RawKey::from_hex(SEED).unwrap(), 0);
        let public = pub_key(&private);
        (private, public)
    }

    fn block(balance: u128) -> StateBlock {
        let (private, public) = keypair();
        StateBlock::new(
            public,
            Uint256::from(1u64),
            public,
            Amount::new(balance),
            Uint256::from(2u64),
            &private,
            &public,
        )
        .unwrap()
    }

    #[test]
    fn test_construction_is_deterministic() {
        let first = block(100);
        let second = block(100);
        assert_eq!(first.hash(), second.hash());
        assert_eq!(first.signature(), second.signature());
        assert!(first.verify());
    }

    #[test]
    fn test_every_field_feeds_the_hash() {
        let base = block(100).hashables;
        let mut variants = Vec::new();

        let mut changed = base;
        changed.account = Uint256::from(9u64);
        variants.push(changed);
        let mut changed = base;
        changed.previous = Uint256::ZERO;
        variants.push(changed);
        let mut changed = base;
        changed.representative = Uint256::from(9u64);
        variants.push(changed);
        let mut changed = base;
        changed.balance = Amount::new(101);
        variants.push(changed);
        let mut changed = base;
        changed.link = Uint256::from(3u64);
        variants.push(changed);

        for variant in variants {
            assert_ne!(variant.hash(), base.hash());
        }
    }

    #[test]
    fn test_mutated_block_fails_verification() {
        let mut tampered = block(100);
        tampered.hashables.balance = Amount::new(1_000_000);
        assert!(!tampered.verify());

        let original = block(100);
        let mut resigned = original.clone();
        resigned.hash = tampered.hashables.hash();
        resigned.hashables = tampered.hashables;
        assert!(!resigned.verify());
    }

    #[test]
    fn test_wrong_public_key_is_rejected() {
        let (private, public) = keypair();
        let other = Uint256::from(5u64);
        assert!(StateBlock::new(public, Uint256::ZERO, public, Amount::ZERO, Uint256::ZERO, &private, &other).is_err());
    }

    #[test]
    fn test_json_rendering() {
        let block = block(1_000);
        let json = block.to_json("fffffe0000000000");
        let (_, public) = keypair();

        assert_eq!(json.kind, "state");
        assert_eq!(json.account, public.to_account());
        assert_eq!(json.previous, Uint256::from(1u64).to_hex());
        assert_eq!(json.balance, "1000");
        assert_eq!(json.link, Uint256::from(2u64).to_hex());
        assert_eq!(json.link_as_account, Uint256::from(2u64).to_account());
        assert_eq!(json.signature.len(), 128);

        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["work"], "fffffe0000000000");
    }
}
