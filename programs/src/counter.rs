//! A `u32` counter that can be moved up or down by an arbitrary step.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;

use pocket_svm_core::{InstructionError, InvokeContext};

use crate::{decode_instruction, load_state, store_state};

solana_program::declare_id!("Counter111111111111111111111111111111111111");

/// Payload: one tag byte followed by the step as a little-endian `u32`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterInstruction {
    Increment(u32),
    Decrement(u32),
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u32,
}

impl Counter {
    pub const LEN: usize = 4;
}

pub fn increment(counter: &Pubkey, step: u32) -> std::io::Result<Instruction> {
    instruction(counter, CounterInstruction::Increment(step))
}

pub fn decrement(counter: &Pubkey, step: u32) -> std::io::Result<Instruction> {
    instruction(counter, CounterInstruction::Decrement(step))
}

fn instruction(counter: &Pubkey, instruction: CounterInstruction) -> std::io::Result<Instruction> {
    Ok(Instruction::new_with_bytes(
        ID,
        &borsh::to_vec(&instruction)?,
        vec![AccountMeta::new(*counter, false)],
    ))
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let instruction: CounterInstruction = decode_instruction(invoke_context.instruction_data())?;
    let data = invoke_context.data_mut(0)?;
    let mut counter: Counter = load_state(data)?;

    let message = match instruction {
        CounterInstruction::Increment(step) => {
            counter.count = counter.count.wrapping_add(step);
            "Executing Increment"
        }
        CounterInstruction::Decrement(step) => {
            counter.count = counter.count.wrapping_sub(step);
            "Executing Decrement"
        }
    };
    store_state(&counter, data)?;

    invoke_context.log(message);
    invoke_context.log(&format!("count = {}", counter.count));
    Ok(())
}
