use std::collections::HashSet;

use log::{debug, warn};
use solana_program::hash::Hash;
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use pocket_svm_types::account::Account;
use pocket_svm_types::error::{TransactionError, TransactionResult};
use pocket_svm_types::result::{Receipt, TransactionRecord};

use crate::accounts_db::AccountsDb;
use crate::blockhash_registry::BlockhashRegistry;
use crate::builtins::BUILTINS;
use crate::config::SimulatorConfig;
use crate::loaded_programs::{ProcessInstruction, ProgramCache};
use crate::message_processor;
use crate::sanitized_transaction::SanitizedTransaction;
use crate::transaction_context::{ExecutionRecord, TransactionContext};
use crate::transaction_validator::TransactionValidator;

mod utils;

/// Single-process ledger that validates and executes transactions one at a
/// time. Every transaction either commits all of its effects or none.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    accounts_db: AccountsDb,
    blockhashes: BlockhashRegistry,
    programs: ProgramCache,
    processed_signatures: HashSet<Signature>,
    history: Vec<TransactionRecord>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new_with_config(SimulatorConfig::default())
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_config(config: SimulatorConfig) -> Self {
        let mut accounts_db = AccountsDb::new(config.rent.clone());
        for builtin in BUILTINS {
            let account = utils::program_account(&accounts_db, builtin.name);
            accounts_db.store(builtin.program_id, account);
        }

        Self {
            blockhashes: BlockhashRegistry::new(&config.blockhash_seed),
            programs: ProgramCache::new_with_builtins(),
            processed_signatures: HashSet::new(),
            history: Vec::new(),
            accounts_db,
            config,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Registers `entrypoint` under `program_id` and stores its executable
    /// account. Each id can be registered once.
    pub fn add_program(
        &mut self,
        program_id: Pubkey,
        name: &str,
        entrypoint: ProcessInstruction,
    ) -> TransactionResult<()> {
        if self.accounts_db.contains(&program_id) || !self.programs.replenish(program_id, name, entrypoint) {
            return Err(TransactionError::AlreadyExists(program_id));
        }

        let account = utils::program_account(&self.accounts_db, name);
        self.accounts_db.store(program_id, account);
        debug!("add_program: {name} at {program_id}");
        Ok(())
    }

    /// Credits `pubkey` outside of any transaction. Returns the new balance.
    pub fn airdrop(&mut self, pubkey: &Pubkey, lamports: u64) -> TransactionResult<u64> {
        // crediting only fails when the balance overflows
        let balance = self
            .accounts_db
            .credit(pubkey, lamports)
            .map_err(|_| TransactionError::BalanceOverflow(*pubkey))?;
        debug!("airdrop: {pubkey} +{lamports} = {balance}");
        Ok(balance)
    }

    /// Seeds the ledger with an arbitrary account.
    pub fn set_account(&mut self, pubkey: Pubkey, account: Account) {
        self.accounts_db.store(pubkey, account);
    }

    pub fn get_account(&self, pubkey: &Pubkey) -> Option<Account> {
        self.accounts_db.get_account(pubkey).cloned()
    }

    pub fn get_balance(&self, pubkey: &Pubkey) -> u64 {
        self.accounts_db
            .get_account(pubkey)
            .map_or(0, |account| account.lamports)
    }

    /// `None` when no account of `space` bytes can exist.
    pub fn minimum_balance_for_rent_exemption(&self, space: usize) -> Option<u64> {
        self.accounts_db.minimum_balance_for_rent_exemption(space)
    }

    pub fn accounts(&self) -> &AccountsDb {
        &self.accounts_db
    }

    pub fn latest_blockhash(&self) -> Hash {
        self.blockhashes.current()
    }

    /// Moves to a fresh blockhash. Transactions signed against the previous
    /// one are rejected from now on.
    pub fn expire_blockhash(&mut self) -> Hash {
        let blockhash = self.blockhashes.advance();
        debug!("expire_blockhash: height={} current={blockhash}", self.blockhashes.height());
        blockhash
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    /// Most recent record stored for `signature`.
    pub fn get_transaction(&self, signature: &Signature) -> Option<&TransactionRecord> {
        self.history
            .iter()
            .rev()
            .find(|record| record.signature == *signature)
    }

    pub fn sanitize_transaction(&self, tx: &Transaction) -> TransactionResult<SanitizedTransaction> {
        SanitizedTransaction::try_from_legacy(tx, self.config.sig_verify)
    }

    /// Sanitizes and processes a signed transaction.
    pub fn send_transaction(&mut self, tx: &Transaction) -> Receipt {
        match self.sanitize_transaction(tx) {
            Ok(sanitized) => self.process_transaction(&sanitized),
            Err(err) => {
                let signature = tx.signatures.first().copied().unwrap_or_default();
                self.reject(signature, err, Vec::new())
            }
        }
    }

    pub fn process_transaction(&mut self, tx: &SanitizedTransaction) -> Receipt {
        let validator = TransactionValidator::new(
            &self.accounts_db,
            &self.blockhashes,
            &self.processed_signatures,
            self.config.lamports_per_signature,
        );
        let fee = match validator.validate(tx) {
            Ok(fee) => fee,
            Err(err) => return self.reject(*tx.signature(), err, Vec::new()),
        };

        let mut transaction_context = TransactionContext::new(
            utils::load_transaction_accounts(&self.accounts_db, tx),
            self.config.log_messages_bytes_limit,
        );

        match self.execute(tx, fee, &mut transaction_context) {
            Ok(()) => self.commit(tx, fee, transaction_context.into()),
            Err(err) => {
                let logs = transaction_context.into_logs();
                self.reject(*tx.signature(), err, logs)
            }
        }
    }

    fn execute(
        &self,
        tx: &SanitizedTransaction,
        fee: u64,
        transaction_context: &mut TransactionContext,
    ) -> TransactionResult<()> {
        transaction_context
            .withdraw_fee(tx.fee_payer(), fee)
            .map_err(|err| TransactionError::from_instruction_error(0, err))?;

        let lamports_before_tx = transaction_context.lamports_sum();
        message_processor::process_message(tx, &self.programs, transaction_context)?;

        if lamports_before_tx.is_none() || transaction_context.lamports_sum() != lamports_before_tx {
            return Err(TransactionError::UnbalancedTransaction);
        }
        Ok(())
    }

    fn commit(&mut self, tx: &SanitizedTransaction, fee: u64, record: ExecutionRecord) -> Receipt {
        let ExecutionRecord { accounts, logs } = record;
        for (pubkey, account) in &accounts {
            self.accounts_db.store(*pubkey, account.clone());
        }

        let signature = *tx.signature();
        if signature != Signature::default() {
            self.processed_signatures.insert(signature);
        }
        debug!("commit: {signature} fee={fee} accounts={}", accounts.len());

        let receipt = Receipt {
            signature,
            result: Ok(()),
            fee,
            logs,
            post_accounts: accounts,
        };
        self.history.push(TransactionRecord::from(&receipt));
        receipt
    }

    fn reject(&mut self, signature: Signature, err: TransactionError, logs: Vec<String>) -> Receipt {
        warn!("transaction {signature} rejected: {err}");
        let receipt = Receipt {
            signature,
            result: Err(err),
            fee: 0,
            logs,
            post_accounts: Vec::new(),
        };
        self.history.push(TransactionRecord::from(&receipt));
        receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke_context::InvokeContext;
    use assert_matches::assert_matches;
    use pocket_svm_types::error::InstructionError;
    use solana_program::instruction::{AccountMeta, Instruction};
    use solana_program::system_instruction;
    use solana_sdk::signature::{Keypair, Signer};

    const PAYER_LAMPORTS: u64 = 10_000_000_000;

    /// Sets byte 0 of account 0 to the payload's first byte; a payload of
    /// `[0xff]` fails after writing.
    fn poke(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
        let value = *invoke_context
            .instruction_data()
            .first()
            .ok_or(InstructionError::InvalidInstructionData)?;
        invoke_context.data_mut(0)?[0] = value;
        if value == 0xff {
            return Err(InstructionError::Custom(1));
        }
        Ok(())
    }

    /// Logs `count` lines of one hundred bytes, `count` being the first byte
    /// of the payload.
    fn chatter(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
        let count = invoke_context.instruction_data().first().copied().unwrap_or_default();
        let line = "x".repeat(100);
        for _ in 0..count {
            invoke_context.log(&line);
        }
        Ok(())
    }

    /// Mints one lamport out of nothing.
    fn mint(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
        let key = *invoke_context.key(0)?;
        invoke_context.accounts_db_mut().credit(&key, 1)?;
        Ok(())
    }

    struct Fixture {
        simulator: Simulator,
        payer: Keypair,
        program_id: Pubkey,
        target: Keypair,
    }

    impl Fixture {
        fn new() -> Self {
            let mut simulator = Simulator::new();
            let payer = Keypair::new();
            simulator.airdrop(&payer.pubkey(), PAYER_LAMPORTS).unwrap();

            let program_id = Pubkey::new_unique();
            simulator.add_program(program_id, "poke", poke).unwrap();

            let target = Keypair::new();
            let rent = simulator.minimum_balance_for_rent_exemption(1).unwrap();
            let create = system_instruction::create_account(
                &payer.pubkey(),
                &target.pubkey(),
                rent,
                1,
                &program_id,
            );
            let tx = Transaction::new_signed_with_payer(
                &[create],
                Some(&payer.pubkey()),
                &[&payer, &target],
                simulator.latest_blockhash(),
            );
            let receipt = simulator.send_transaction(&tx);
            assert!(receipt.is_ok(), "{receipt:?}");

            Self {
                simulator,
                payer,
                program_id,
                target,
            }
        }

        fn send(&mut self, instructions: &[Instruction]) -> Receipt {
            let tx = Transaction::new_signed_with_payer(
                instructions,
                Some(&self.payer.pubkey()),
                &[&self.payer],
                self.simulator.latest_blockhash(),
            );
            self.simulator.send_transaction(&tx)
        }

        fn poke(&self, value: u8) -> Instruction {
            Instruction::new_with_bytes(
                self.program_id,
                &[value],
                vec![AccountMeta::new(self.target.pubkey(), false)],
            )
        }

        fn target_data(&self) -> Vec<u8> {
            self.simulator.get_account(&self.target.pubkey()).unwrap().data
        }
    }

    #[test]
    fn program_registration_happens_once() {
        let mut fixture = Fixture::new();
        let program_id = fixture.program_id;
        let account = fixture.simulator.get_account(&program_id).unwrap();
        assert!(account.executable);

        assert_eq!(
            fixture.simulator.add_program(program_id, "again", poke),
            Err(TransactionError::AlreadyExists(program_id))
        );
        assert_eq!(
            fixture.simulator.add_program(fixture.payer.pubkey(), "payer", poke),
            Err(TransactionError::AlreadyExists(fixture.payer.pubkey()))
        );
    }

    #[test]
    fn successful_transaction_commits_and_charges_fee() {
        let mut fixture = Fixture::new();
        let balance = fixture.simulator.get_balance(&fixture.payer.pubkey());

        let receipt = fixture.send(&[fixture.poke(7)]);
        assert!(receipt.is_ok());
        assert_eq!(receipt.fee, 5000);
        assert_eq!(fixture.target_data(), vec![7]);
        assert_eq!(fixture.simulator.get_balance(&fixture.payer.pubkey()), balance - 5000);
        assert_eq!(
            receipt.post_account(&fixture.target.pubkey()).unwrap().data,
            vec![7]
        );
        assert_eq!(
            fixture.simulator.get_transaction(&receipt.signature),
            Some(&TransactionRecord::from(&receipt))
        );
    }

    #[test]
    fn failing_second_instruction_rolls_back_the_first() {
        let mut fixture = Fixture::new();
        let balance = fixture.simulator.get_balance(&fixture.payer.pubkey());

        let receipt = fixture.send(&[fixture.poke(7), fixture.poke(0xff)]);
        assert_eq!(
            receipt.result,
            Err(TransactionError::ProgramExecutionFailure {
                instruction: 1,
                reason: InstructionError::Custom(1),
            })
        );
        assert!(receipt.post_accounts.is_empty());
        assert_eq!(receipt.fee, 0);
        assert!(!receipt.logs.is_empty());
        assert_eq!(fixture.target_data(), vec![0]);
        assert_eq!(fixture.simulator.get_balance(&fixture.payer.pubkey()), balance);
    }

    #[test]
    fn expired_blockhash_leaves_store_unchanged() {
        let mut fixture = Fixture::new();
        let tx = Transaction::new_signed_with_payer(
            &[fixture.poke(9)],
            Some(&fixture.payer.pubkey()),
            &[&fixture.payer],
            fixture.simulator.latest_blockhash(),
        );
        let before = fixture.simulator.accounts().clone();

        fixture.simulator.expire_blockhash();
        let receipt = fixture.simulator.send_transaction(&tx);
        assert_eq!(receipt.result, Err(TransactionError::BlockhashExpired));
        assert_eq!(fixture.simulator.accounts(), &before);
    }

    #[test]
    fn unsigned_signer_is_rejected() {
        let mut fixture = Fixture::new();
        let other = Keypair::new();
        let mut instruction = fixture.poke(1);
        instruction.accounts.push(AccountMeta::new_readonly(other.pubkey(), true));

        let mut tx = Transaction::new_with_payer(&[instruction], Some(&fixture.payer.pubkey()));
        tx.partial_sign(&[&fixture.payer], fixture.simulator.latest_blockhash());

        let receipt = fixture.simulator.send_transaction(&tx);
        assert_eq!(receipt.result, Err(TransactionError::MissingSignature(other.pubkey())));
        assert_eq!(fixture.target_data(), vec![0]);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut fixture = Fixture::new();
        let tx = Transaction::new_signed_with_payer(
            &[fixture.poke(3)],
            Some(&fixture.payer.pubkey()),
            &[&fixture.payer],
            fixture.simulator.latest_blockhash(),
        );
        assert!(fixture.simulator.send_transaction(&tx).is_ok());
        assert_eq!(
            fixture.simulator.send_transaction(&tx).result,
            Err(TransactionError::AlreadyProcessed)
        );
        assert_eq!(fixture.simulator.history().len(), 3);
    }

    #[test]
    fn unknown_program_is_reported() {
        let mut fixture = Fixture::new();
        let unknown = Pubkey::new_unique();
        let receipt = fixture.send(&[Instruction::new_with_bytes(unknown, &[], vec![])]);
        assert_eq!(receipt.result, Err(TransactionError::ProgramNotFound(unknown)));
    }

    #[test]
    fn minted_lamports_unbalance_the_transaction() {
        let mut fixture = Fixture::new();
        let mint_id = Pubkey::new_unique();
        fixture.simulator.add_program(mint_id, "mint", mint).unwrap();

        let target = fixture.target.pubkey();
        let before = fixture.simulator.get_balance(&target);
        let receipt = fixture.send(
            &[Instruction::new_with_bytes(mint_id, &[], vec![AccountMeta::new(target, false)])],
        );
        assert_eq!(receipt.result, Err(TransactionError::UnbalancedTransaction));
        assert_eq!(fixture.simulator.get_balance(&target), before);
    }

    #[test]
    fn fee_payer_without_funds_is_rejected() {
        let mut simulator = Simulator::new();
        let payer = Keypair::new();
        let tx = Transaction::new_signed_with_payer(
            &[system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1)],
            Some(&payer.pubkey()),
            &[&payer],
            simulator.latest_blockhash(),
        );
        assert_matches!(
            simulator.send_transaction(&tx).result,
            Err(TransactionError::NotFound(key)) if key == payer.pubkey()
        );

        simulator.airdrop(&payer.pubkey(), 4_999).unwrap();
        assert_matches!(
            simulator.send_transaction(&tx).result,
            Err(TransactionError::InsufficientFunds(key)) if key == payer.pubkey()
        );
        assert_eq!(simulator.get_balance(&payer.pubkey()), 4_999);
    }

    #[test]
    fn unverified_signatures_fail_when_verification_is_enabled() {
        let mut fixture = Fixture::new();
        let mut tx = Transaction::new_signed_with_payer(
            &[fixture.poke(5)],
            Some(&fixture.payer.pubkey()),
            &[&fixture.payer],
            fixture.simulator.latest_blockhash(),
        );
        tx.signatures[0] = Signature::new_unique();
        assert_eq!(
            fixture.simulator.send_transaction(&tx).result,
            Err(TransactionError::MissingSignature(fixture.payer.pubkey()))
        );

        let mut lenient = Simulator::new_with_config(SimulatorConfig {
            sig_verify: false,
            ..SimulatorConfig::default()
        });
        lenient.airdrop(&fixture.payer.pubkey(), PAYER_LAMPORTS).unwrap();
        let transfer = system_instruction::transfer(&fixture.payer.pubkey(), &Pubkey::new_unique(), 1);
        let mut tx = Transaction::new_signed_with_payer(
            &[transfer],
            Some(&fixture.payer.pubkey()),
            &[&fixture.payer],
            lenient.latest_blockhash(),
        );
        tx.signatures[0] = Signature::new_unique();
        assert!(lenient.send_transaction(&tx).is_ok());
    }

    #[test]
    fn program_owned_fee_payer_is_rejected() {
        let mut fixture = Fixture::new();
        let target = fixture.target.pubkey();
        let before = fixture.simulator.get_balance(&target);

        let mut tx = Transaction::new_with_payer(&[fixture.poke(1)], Some(&target));
        tx.sign(&[&fixture.target], fixture.simulator.latest_blockhash());
        assert_eq!(
            fixture.simulator.send_transaction(&tx).result,
            Err(TransactionError::InvalidAccountForFee(target))
        );
        assert_eq!(fixture.simulator.get_balance(&target), before);
        assert_eq!(fixture.target_data(), vec![0]);
    }

    #[test]
    fn airdrop_overflow_names_the_account() {
        let mut simulator = Simulator::new();
        let key = Pubkey::new_unique();
        assert_eq!(simulator.airdrop(&key, u64::MAX), Ok(u64::MAX));
        assert_eq!(
            simulator.airdrop(&key, 1),
            Err(TransactionError::BalanceOverflow(key))
        );
        assert_eq!(simulator.get_balance(&key), u64::MAX);
    }

    #[test]
    fn rent_query_covers_only_permitted_sizes() {
        let simulator = Simulator::new();
        assert_eq!(simulator.minimum_balance_for_rent_exemption(4), Some(918_720));
        assert_eq!(simulator.minimum_balance_for_rent_exemption(usize::MAX), None);
    }

    #[test]
    fn default_config_keeps_long_program_logs() {
        let mut fixture = Fixture::new();
        let chatter_id = Pubkey::new_unique();
        fixture.simulator.add_program(chatter_id, "chatter", chatter).unwrap();

        let receipt = fixture.send(&[Instruction::new_with_bytes(chatter_id, &[200], vec![])]);
        assert!(receipt.is_ok(), "{receipt:?}");
        assert_eq!(receipt.logs.len(), 202);
        assert!(!receipt.logs.contains(&"Log truncated".to_string()));
    }
}
