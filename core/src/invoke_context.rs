use std::{cell::RefCell, rc::Rc};

use solana_program::instruction::{AccountMeta, Instruction, TRANSACTION_LEVEL_STACK_HEIGHT};
use solana_program::pubkey::Pubkey;
use solana_program_runtime::log_collector::LogCollector;
use solana_program_runtime::stable_log;

use pocket_svm_types::account::Account;
use pocket_svm_types::error::InstructionError;

use crate::accounts_db::AccountsDb;
use crate::builtins::BUILTINS;

/// The view a program gets of the instruction it is processing.
///
/// Accounts are addressed by their position in the instruction's account
/// list. Reads are unrestricted; writes go through checks that the account is
/// marked writable and, for data and debits, owned by the running program.
pub struct InvokeContext<'a> {
    program_id: Pubkey,
    instruction_accounts: &'a [AccountMeta],
    instruction_data: &'a [u8],
    accounts: &'a mut AccountsDb,
    log_collector: Option<Rc<RefCell<LogCollector>>>,
    stack_height: usize,
}

impl<'a> InvokeContext<'a> {
    pub fn new(
        program_id: Pubkey,
        instruction_accounts: &'a [AccountMeta],
        instruction_data: &'a [u8],
        accounts: &'a mut AccountsDb,
        log_collector: Option<Rc<RefCell<LogCollector>>>,
    ) -> Self {
        Self {
            program_id,
            instruction_accounts,
            instruction_data,
            accounts,
            log_collector,
            stack_height: TRANSACTION_LEVEL_STACK_HEIGHT,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn instruction_data(&self) -> &[u8] {
        self.instruction_data
    }

    pub fn get_stack_height(&self) -> usize {
        self.stack_height
    }

    pub fn number_of_accounts(&self) -> usize {
        self.instruction_accounts.len()
    }

    fn meta(&self, index: usize) -> Result<&AccountMeta, InstructionError> {
        self.instruction_accounts
            .get(index)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    pub fn key(&self, index: usize) -> Result<&Pubkey, InstructionError> {
        Ok(&self.meta(index)?.pubkey)
    }

    pub fn is_signer(&self, index: usize) -> Result<bool, InstructionError> {
        Ok(self.meta(index)?.is_signer)
    }

    pub fn is_writable(&self, index: usize) -> Result<bool, InstructionError> {
        Ok(self.meta(index)?.is_writable)
    }

    /// Returns the key at `index` if it signed the transaction.
    pub fn check_signer(&self, index: usize) -> Result<Pubkey, InstructionError> {
        let meta = self.meta(index)?;
        if !meta.is_signer {
            return Err(InstructionError::MissingRequiredSignature(meta.pubkey));
        }
        Ok(meta.pubkey)
    }

    pub fn account(&self, index: usize) -> Result<&Account, InstructionError> {
        let key = self.meta(index)?.pubkey;
        self.accounts.get(&key)
    }

    /// Balance of the account at `index`, zero if it does not exist yet.
    pub fn lamports(&self, index: usize) -> Result<u64, InstructionError> {
        let key = self.meta(index)?.pubkey;
        Ok(self
            .accounts
            .get_account(&key)
            .map_or(0, |account| account.lamports))
    }

    fn writable_key(&self, index: usize) -> Result<Pubkey, InstructionError> {
        let meta = self.meta(index)?;
        if !meta.is_writable {
            return Err(InstructionError::AccessViolation(meta.pubkey));
        }
        Ok(meta.pubkey)
    }

    fn owned_account_mut(&mut self, index: usize) -> Result<&mut Account, InstructionError> {
        let key = self.writable_key(index)?;
        let program_id = self.program_id;
        let account = self.accounts.get_mut(&key)?;
        if account.owner != program_id || account.executable {
            return Err(InstructionError::AccessViolation(key));
        }
        Ok(account)
    }

    /// Mutable access to the data of a writable account owned by the running
    /// program. The slice length is the account's fixed size.
    pub fn data_mut(&mut self, index: usize) -> Result<&mut [u8], InstructionError> {
        Ok(self.owned_account_mut(index)?.data.as_mut_slice())
    }

    /// Moves lamports between two writable accounts. The source must be owned
    /// by the running program; the destination is created if missing.
    pub fn transfer_lamports(
        &mut self,
        from_index: usize,
        to_index: usize,
        lamports: u64,
    ) -> Result<(), InstructionError> {
        let to = self.writable_key(to_index)?;
        let from = *self.key(from_index)?;
        let from_account = self.owned_account_mut(from_index)?;
        from_account.lamports = from_account
            .lamports
            .checked_sub(lamports)
            .ok_or(InstructionError::InsufficientFunds(from))?;
        self.accounts.credit(&to, lamports)?;
        Ok(())
    }

    /// Lamports an account of `space` bytes needs to be rent exempt.
    pub fn minimum_balance_for_rent_exemption(&self, space: usize) -> Result<u64, InstructionError> {
        self.accounts
            .minimum_balance_for_rent_exemption(space)
            .ok_or(InstructionError::InvalidArgument)
    }

    pub fn log(&self, message: &str) {
        stable_log::program_log(&self.log_collector, message);
    }

    /// Runs `instruction` against a builtin program on behalf of the running
    /// program. Every account it names must be passed to the current
    /// instruction and keeps at most the privileges it has here, except that
    /// addresses derived from `signers_seeds` under the running program id
    /// may sign.
    pub fn invoke_signed(
        &mut self,
        instruction: &Instruction,
        signers_seeds: &[&[&[u8]]],
    ) -> Result<(), InstructionError> {
        let callee_id = instruction.program_id;
        let builtin = BUILTINS
            .iter()
            .find(|builtin| builtin.program_id == callee_id)
            .ok_or(InstructionError::UnsupportedProgramId(callee_id))?;
        if !self.instruction_accounts.iter().any(|meta| meta.pubkey == callee_id) {
            return Err(InstructionError::MissingAccount(callee_id));
        }

        let signers = signers_seeds
            .iter()
            .map(|seeds| Pubkey::create_program_address(seeds, &self.program_id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InstructionError::InvalidSeeds)?;

        for requested in &instruction.accounts {
            let granted = self
                .instruction_accounts
                .iter()
                .find(|meta| meta.pubkey == requested.pubkey)
                .ok_or(InstructionError::MissingAccount(requested.pubkey))?;
            let may_sign = granted.is_signer || signers.contains(&requested.pubkey);
            if (requested.is_signer && !may_sign) || (requested.is_writable && !granted.is_writable) {
                return Err(InstructionError::PrivilegeEscalation(requested.pubkey));
            }
        }

        let stack_height = self.stack_height.saturating_add(1);
        stable_log::program_invoke(&self.log_collector, &callee_id, stack_height);
        let mut callee = InvokeContext {
            program_id: callee_id,
            instruction_accounts: &instruction.accounts,
            instruction_data: &instruction.data,
            accounts: &mut *self.accounts,
            log_collector: self.log_collector.clone(),
            stack_height,
        };
        match (builtin.entrypoint)(&mut callee) {
            Ok(()) => {
                stable_log::program_success(&self.log_collector, &callee_id);
                Ok(())
            }
            Err(err) => {
                stable_log::program_failure(&self.log_collector, &callee_id, &err);
                Err(err)
            }
        }
    }

    /// Unchecked access for privileged builtins.
    pub(crate) fn accounts_db_mut(&mut self) -> &mut AccountsDb {
        self.accounts
    }
}
