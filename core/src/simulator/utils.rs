use solana_program::pubkey::Pubkey;
use solana_sdk::native_loader;

use pocket_svm_types::account::Account;

use crate::accounts_db::AccountsDb;
use crate::sanitized_transaction::SanitizedTransaction;

/// Copies every account the transaction references out of the ledger. Keys
/// the ledger does not know stay absent so programs can create them.
pub fn load_transaction_accounts(accounts_db: &AccountsDb, tx: &SanitizedTransaction) -> AccountsDb {
    let mut working_set = AccountsDb::new(accounts_db.rent().clone());
    for key in tx.account_keys() {
        if let Some(account) = accounts_db.get_account(&key) {
            working_set.store(key, account.clone());
        }
    }
    working_set
}

/// Executable placeholder stored under a registered program id. Funded to be
/// rent exempt for the name it carries.
pub fn program_account(accounts_db: &AccountsDb, name: &str) -> Account {
    let lamports = accounts_db.minimum_balance_for_rent_exemption(name.len()).unwrap_or_default();
    Account::new_executable(lamports, name.as_bytes().to_vec(), &native_loader::id())
}
