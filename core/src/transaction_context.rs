use std::{cell::RefCell, rc::Rc};

use solana_program::pubkey::Pubkey;
use solana_program_runtime::log_collector::LogCollector;

use pocket_svm_types::account::Account;
use pocket_svm_types::error::InstructionError;

use crate::accounts_db::AccountsDb;

/// Working state of one transaction: private copies of every account it
/// loaded plus its program logs. Nothing here reaches the ledger unless the
/// whole transaction succeeds.
pub struct TransactionContext {
    accounts: AccountsDb,
    log_collector: Option<Rc<RefCell<LogCollector>>>,
}

/// Mutation set produced by running a transaction to completion.
#[derive(Debug)]
pub struct ExecutionRecord {
    pub accounts: Vec<(Pubkey, Account)>,
    pub logs: Vec<String>,
}

impl TransactionContext {
    /// `log_messages_bytes_limit` caps the bytes of program logs kept; `None`
    /// keeps everything.
    pub fn new(accounts: AccountsDb, log_messages_bytes_limit: Option<usize>) -> Self {
        Self {
            accounts,
            log_collector: Some(LogCollector::new_ref_with_limit(log_messages_bytes_limit)),
        }
    }

    pub fn accounts(&self) -> &AccountsDb {
        &self.accounts
    }

    pub(crate) fn accounts_mut(&mut self) -> &mut AccountsDb {
        &mut self.accounts
    }

    pub fn log_collector(&self) -> &Option<Rc<RefCell<LogCollector>>> {
        &self.log_collector
    }

    /// Log lines recorded so far.
    pub fn logs(&self) -> Vec<String> {
        self.log_collector
            .as_ref()
            .map(|log_collector| log_collector.borrow().get_recorded_content().to_vec())
            .unwrap_or_default()
    }

    /// Takes the transaction fee out of the fee payer's working copy.
    pub fn withdraw_fee(&mut self, fee_payer: &Pubkey, fee: u64) -> Result<(), InstructionError> {
        let account = self.accounts.get_mut(fee_payer)?;
        account.lamports = account
            .lamports
            .checked_sub(fee)
            .ok_or(InstructionError::InsufficientFunds(*fee_payer))?;
        Ok(())
    }

    pub fn lamports_sum(&self) -> Option<u128> {
        self.accounts.lamports_sum()
    }

    /// Drops the working accounts and keeps only the logs.
    pub fn into_logs(self) -> Vec<String> {
        into_messages(self.log_collector)
    }
}

fn into_messages(log_collector: Option<Rc<RefCell<LogCollector>>>) -> Vec<String> {
    log_collector
        .and_then(|log_collector| Rc::try_unwrap(log_collector).ok())
        .map(|log_collector| log_collector.into_inner().into_messages())
        .unwrap_or_default()
}

impl From<TransactionContext> for ExecutionRecord {
    fn from(context: TransactionContext) -> Self {
        Self {
            accounts: context.accounts.into_iter().collect(),
            logs: into_messages(context.log_collector),
        }
    }
}
