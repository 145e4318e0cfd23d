use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_program::clock::Epoch;
use solana_program::pubkey::Pubkey;

/// Rent epoch assigned to accounts that are rent exempt.
pub const RENT_EXEMPT_RENT_EPOCH: Epoch = Epoch::MAX;

/// A ledger record. The length of `data` is chosen when the account is created
/// and stays fixed afterwards.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Account {
    pub lamports: u64,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub data: Vec<u8>,
    #[serde_as(as = "DisplayFromStr")]
    pub owner: Pubkey,
    pub executable: bool,
    pub rent_epoch: Epoch,
}

impl Account {
    pub fn new(lamports: u64, space: usize, owner: &Pubkey) -> Self {
        Self {
            lamports,
            data: vec![0; space],
            owner: *owner,
            executable: false,
            rent_epoch: RENT_EXEMPT_RENT_EPOCH,
        }
    }

    pub fn new_executable(lamports: u64, data: Vec<u8>, owner: &Pubkey) -> Self {
        Self {
            lamports,
            data,
            owner: *owner,
            executable: true,
            rent_epoch: RENT_EXEMPT_RENT_EPOCH,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
