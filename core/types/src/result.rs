use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::account::Account;
use crate::error::{TransactionError, TransactionResult};

/// Outcome of a single submission, handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub signature: Signature,
    pub result: TransactionResult<()>,
    pub fee: u64,
    pub logs: Vec<String>,
    /// State committed for every account the transaction loaded. Empty when
    /// the transaction failed.
    pub post_accounts: Vec<(Pubkey, Account)>,
}

impl Receipt {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn err(&self) -> Option<&TransactionError> {
        self.result.as_ref().err()
    }

    pub fn post_account(&self, pubkey: &Pubkey) -> Option<&Account> {
        self.post_accounts
            .iter()
            .find(|(key, _)| key == pubkey)
            .map(|(_, account)| account)
    }

    /// Converts a failed receipt into its error, keeping successful ones.
    pub fn into_result(self) -> TransactionResult<Self> {
        match &self.result {
            Ok(()) => Ok(self),
            Err(error) => Err(error.clone()),
        }
    }
}

/// Entry of the simulator's in-memory execution log.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    #[serde_as(as = "DisplayFromStr")]
    pub signature: Signature,
    pub error: Option<TransactionError>,
    pub fee: u64,
    pub logs: Vec<String>,
}

impl From<&Receipt> for TransactionRecord {
    fn from(receipt: &Receipt) -> Self {
        Self {
            signature: receipt.signature,
            error: receipt.err().cloned(),
            fee: receipt.fee,
            logs: receipt.logs.clone(),
        }
    }
}
