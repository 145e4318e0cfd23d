//! Doubles a stored `u32` on every call, seeding it with 1 the first time.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;

use pocket_svm_core::{InstructionError, InvokeContext};

use crate::{load_state, store_state};

solana_program::declare_id!("Doub1er111111111111111111111111111111111111");

#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DoublerState {
    pub count: u32,
}

impl DoublerState {
    pub const LEN: usize = 4;
}

/// The payload is ignored; any bytes may be passed to make the transaction
/// signature unique.
pub fn double(account: &Pubkey, nonce: &[u8]) -> Instruction {
    Instruction::new_with_bytes(ID, nonce, vec![AccountMeta::new(*account, false)])
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let data = invoke_context.data_mut(0)?;
    let mut state: DoublerState = load_state(data)?;

    state.count = match state.count {
        0 => 1,
        count => count.wrapping_mul(2),
    };
    store_state(&state, data)?;

    invoke_context.log(&format!("count = {}", state.count));
    Ok(())
}
