//! Stores a single UTF-8 string in a fixed-size account.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;

use pocket_svm_core::{InstructionError, InvokeContext};

use crate::{decode_instruction, load_state, store_state};

solana_program::declare_id!("StringStore11111111111111111111111111111111");

/// Payload: tag `0`, then the string as a little-endian `u32` length and its
/// UTF-8 bytes.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum StringStoreInstruction {
    InputString(String),
}

/// Account layout: the same length-prefixed string, zero padded to the
/// account size.
#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct StoredString {
    pub value: String,
}

impl StoredString {
    /// Account size needed to hold a string of `len` bytes.
    pub fn space(len: usize) -> usize {
        4 + len
    }

    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        load_state(data)
    }
}

pub fn input_string(account: &Pubkey, value: &str) -> std::io::Result<Instruction> {
    let instruction = StringStoreInstruction::InputString(value.to_string());
    Ok(Instruction::new_with_bytes(
        ID,
        &borsh::to_vec(&instruction)?,
        vec![AccountMeta::new(*account, false)],
    ))
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let instruction: StringStoreInstruction = decode_instruction(invoke_context.instruction_data())?;

    match instruction {
        StringStoreInstruction::InputString(value) => {
            let stored = StoredString { value };
            store_state(&stored, invoke_context.data_mut(0)?)?;
            invoke_context.log(&format!("Storing string: {}", stored.value));
        }
    }
    Ok(())
}
