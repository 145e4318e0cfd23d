use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_program::hash::{hash, hashv, Hash};

use pocket_svm_types::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashEntry {
    pub hash: Hash,
    pub valid: bool,
}

/// Holds the single blockhash transactions may currently reference. Expiry is
/// an explicit transition; nothing here depends on wall-clock time.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockhashRegistry {
    #[serde_as(as = "DisplayFromStr")]
    current: Hash,
    height: u64,
}

impl BlockhashRegistry {
    pub fn new(seed: &str) -> Self {
        Self {
            current: hash(seed.as_bytes()),
            height: 0,
        }
    }

    pub fn current(&self) -> Hash {
        self.current
    }

    /// Number of times the registry has been advanced.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Replaces the current hash with a new one derived from it. Transactions
    /// referencing the previous hash are rejected from now on.
    pub fn advance(&mut self) -> Hash {
        self.height = self.height.saturating_add(1);
        self.current = hashv(&[self.current.as_ref(), &self.height.to_le_bytes()]);
        self.current
    }

    pub fn entry(&self, hash: &Hash) -> BlockhashEntry {
        BlockhashEntry {
            hash: *hash,
            valid: *hash == self.current,
        }
    }

    pub fn check(&self, hash: &Hash) -> Result<(), TransactionError> {
        if self.entry(hash).valid {
            Ok(())
        } else {
            Err(TransactionError::BlockhashExpired)
        }
    }
}

impl Default for BlockhashRegistry {
    fn default() -> Self {
        Self::new("genesis")
    }
}
