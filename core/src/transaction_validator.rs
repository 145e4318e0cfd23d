use std::collections::HashSet;

use log::debug;
use solana_program::system_program;
use solana_sdk::signature::Signature;

use pocket_svm_types::error::{TransactionError, TransactionResult};

use crate::accounts_db::AccountsDb;
use crate::blockhash_registry::BlockhashRegistry;
use crate::sanitized_transaction::SanitizedTransaction;

/// Admission checks run before a transaction touches any state.
#[derive(Debug, Clone, Copy)]
pub struct TransactionValidator<'a> {
    accounts: &'a AccountsDb,
    blockhashes: &'a BlockhashRegistry,
    processed_signatures: &'a HashSet<Signature>,
    lamports_per_signature: u64,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(
        accounts: &'a AccountsDb,
        blockhashes: &'a BlockhashRegistry,
        processed_signatures: &'a HashSet<Signature>,
        lamports_per_signature: u64,
    ) -> Self {
        Self {
            accounts,
            blockhashes,
            processed_signatures,
            lamports_per_signature,
        }
    }

    pub fn calculate_fee(&self, tx: &SanitizedTransaction) -> u64 {
        self.lamports_per_signature
            .saturating_mul(tx.num_signatures())
    }

    /// Runs every check in order and returns the fee the transaction owes.
    /// Only system accounts without data can pay it.
    pub fn validate(&self, tx: &SanitizedTransaction) -> TransactionResult<u64> {
        self.check_signatures(tx)?;
        self.blockhashes.check(tx.recent_blockhash())?;
        self.check_not_processed(tx.signature())?;
        let fee = self.calculate_fee(tx);
        self.check_fee_payer(tx, fee)?;
        debug!("validated transaction {}: fee={fee}", tx.signature());
        Ok(fee)
    }

    fn check_signatures(&self, tx: &SanitizedTransaction) -> TransactionResult<()> {
        let required = std::iter::once(tx.fee_payer()).chain(
            tx.instructions()
                .iter()
                .flat_map(|instruction| instruction.accounts.iter())
                .filter(|meta| meta.is_signer)
                .map(|meta| &meta.pubkey),
        );

        for pubkey in required {
            if !tx.signers().contains(pubkey) {
                return Err(TransactionError::MissingSignature(*pubkey));
            }
        }
        Ok(())
    }

    fn check_not_processed(&self, signature: &Signature) -> TransactionResult<()> {
        if *signature != Signature::default() && self.processed_signatures.contains(signature) {
            return Err(TransactionError::AlreadyProcessed);
        }
        Ok(())
    }

    fn check_fee_payer(&self, tx: &SanitizedTransaction, fee: u64) -> TransactionResult<()> {
        let fee_payer = tx.fee_payer();
        let account = self
            .accounts
            .get_account(fee_payer)
            .ok_or(TransactionError::NotFound(*fee_payer))?;
        if account.owner != system_program::id() || !account.data.is_empty() {
            return Err(TransactionError::InvalidAccountForFee(*fee_payer));
        }
        if account.lamports < fee {
            return Err(TransactionError::InsufficientFunds(*fee_payer));
        }
        Ok(())
    }
}
