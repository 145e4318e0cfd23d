//! A `u32` register supporting half, double, add and subtract. All arithmetic
//! wraps modulo 2^32.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;

use pocket_svm_core::{InstructionError, InvokeContext};

use crate::{decode_instruction, load_state, store_state};

solana_program::declare_id!("Ca1cu1ator111111111111111111111111111111111");

/// Payload: `[0]` half, `[1]` double, `[2, u32 LE]` add, `[3, u32 LE]` subtract.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorInstruction {
    Half,
    Double,
    Add(u32),
    Subtract(u32),
}

impl CalculatorInstruction {
    pub fn apply(self, value: u32) -> u32 {
        match self {
            Self::Half => value / 2,
            Self::Double => value.wrapping_mul(2),
            Self::Add(operand) => value.wrapping_add(operand),
            Self::Subtract(operand) => value.wrapping_sub(operand),
        }
    }

    pub(crate) fn describe(self) -> String {
        match self {
            Self::Half => "Dividing the value by 2".to_string(),
            Self::Double => "Doubling the value".to_string(),
            Self::Add(operand) => format!("Adding the value {operand}"),
            Self::Subtract(operand) => format!("Subtracting the value {operand}"),
        }
    }

    pub fn to_instruction(self, register: &Pubkey) -> std::io::Result<Instruction> {
        Ok(Instruction::new_with_bytes(
            ID,
            &borsh::to_vec(&self)?,
            vec![AccountMeta::new(*register, false)],
        ))
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub value: u32,
}

impl Register {
    pub const LEN: usize = 4;
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let instruction: CalculatorInstruction = decode_instruction(invoke_context.instruction_data())?;
    let data = invoke_context.data_mut(0)?;
    let mut register: Register = load_state(data)?;

    register.value = instruction.apply(register.value);
    store_state(&register, data)?;

    invoke_context.log(&instruction.describe());
    invoke_context.log(&format!("value = {}", register.value));
    Ok(())
}
