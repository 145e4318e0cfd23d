use std::collections::BTreeMap;

use log::trace;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_program::pubkey::Pubkey;
use solana_program::rent::{Rent, ACCOUNT_STORAGE_OVERHEAD};
use solana_program::system_instruction::MAX_PERMITTED_DATA_LENGTH;
use solana_program::system_program;

use pocket_svm_types::account::Account;
use pocket_svm_types::error::InstructionError;

/// In-memory account store. The simulator keeps one as the ledger and every
/// transaction executes against a scratch copy holding just the keys it loads.
#[serde_as]
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountsDb {
    #[serde_as(as = "Vec<(DisplayFromStr, _)>")]
    accounts: BTreeMap<Pubkey, Account>,
    rent: Rent,
}

impl AccountsDb {
    pub fn new(rent: Rent) -> Self {
        Self {
            accounts: BTreeMap::new(),
            rent,
        }
    }

    pub fn rent(&self) -> &Rent {
        &self.rent
    }

    /// Lamports an account of `space` bytes needs to be rent exempt. `None`
    /// when `space` is larger than any account may be or the rent parameters
    /// overflow for it.
    pub fn minimum_balance_for_rent_exemption(&self, space: usize) -> Option<u64> {
        let bytes = u64::try_from(space)
            .ok()
            .filter(|bytes| *bytes <= MAX_PERMITTED_DATA_LENGTH)?;
        ACCOUNT_STORAGE_OVERHEAD
            .checked_add(bytes)?
            .checked_mul(self.rent.lamports_per_byte_year)?;
        Some(self.rent.minimum_balance(space))
    }

    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.accounts.contains_key(pubkey)
    }

    pub fn get(&self, pubkey: &Pubkey) -> Result<&Account, InstructionError> {
        self.accounts
            .get(pubkey)
            .ok_or(InstructionError::AccountNotFound(*pubkey))
    }

    pub fn get_account(&self, pubkey: &Pubkey) -> Option<&Account> {
        self.accounts.get(pubkey)
    }

    pub(crate) fn get_mut(&mut self, pubkey: &Pubkey) -> Result<&mut Account, InstructionError> {
        self.accounts
            .get_mut(pubkey)
            .ok_or(InstructionError::AccountNotFound(*pubkey))
    }

    /// Creates a zero-filled, rent-exempt account of `space` bytes.
    pub fn create(
        &mut self,
        pubkey: &Pubkey,
        owner: &Pubkey,
        lamports: u64,
        space: usize,
    ) -> Result<&Account, InstructionError> {
        if self.accounts.contains_key(pubkey) {
            return Err(InstructionError::AccountAlreadyInUse(*pubkey));
        }
        let minimum = self
            .minimum_balance_for_rent_exemption(space)
            .ok_or(InstructionError::InvalidArgument)?;
        if lamports < minimum {
            return Err(InstructionError::InsufficientFunds(*pubkey));
        }

        trace!("create_account: key={pubkey} owner={owner} lamports={lamports} space={space}");
        Ok(self
            .accounts
            .entry(*pubkey)
            .or_insert_with(|| Account::new(lamports, space, owner)))
    }

    pub fn set_balance(&mut self, pubkey: &Pubkey, lamports: u64) -> Result<(), InstructionError> {
        self.get_mut(pubkey)?.lamports = lamports;
        Ok(())
    }

    /// Overwrites `bytes.len()` bytes of the account data starting at `offset`
    /// on behalf of `caller`, which must own the account.
    pub fn write_data(
        &mut self,
        caller: &Pubkey,
        pubkey: &Pubkey,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), InstructionError> {
        let account = self.get_mut(pubkey)?;
        if account.owner != *caller || account.executable {
            return Err(InstructionError::AccessViolation(*pubkey));
        }
        let end = offset
            .checked_add(bytes.len())
            .ok_or(InstructionError::AccountDataTooSmall)?;
        let target = account
            .data
            .get_mut(offset..end)
            .ok_or(InstructionError::AccountDataTooSmall)?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Adds lamports to `pubkey`, creating an empty system account if needed.
    pub fn credit(&mut self, pubkey: &Pubkey, lamports: u64) -> Result<u64, InstructionError> {
        let account = self
            .accounts
            .entry(*pubkey)
            .or_insert_with(|| Account::new(0, 0, &system_program::id()));
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(InstructionError::ArithmeticOverflow)?;
        Ok(account.lamports)
    }

    pub fn store(&mut self, pubkey: Pubkey, account: Account) {
        trace!(
            "store: key={pubkey} lamports={} owner={} data={}",
            account.lamports,
            account.owner,
            hex::encode(&account.data)
        );
        self.accounts.insert(pubkey, account);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pubkey, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn lamports_sum(&self) -> Option<u128> {
        self.accounts
            .values()
            .try_fold(0u128, |sum, account| sum.checked_add(u128::from(account.lamports)))
    }
}

impl IntoIterator for AccountsDb {
    type Item = (Pubkey, Account);
    type IntoIter = std::collections::btree_map::IntoIter<Pubkey, Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.accounts.into_iter()
    }
}
