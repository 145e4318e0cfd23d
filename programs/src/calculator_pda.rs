//! The calculator with its register at an address derived from the payer.
//! The first instruction a payer sends creates the register through the
//! system program, signing for the derived address.

use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;
use solana_program::{system_instruction, system_program};

use pocket_svm_core::{InstructionError, InvokeContext};

use crate::calculator::{CalculatorInstruction, Register};
use crate::{decode_instruction, load_state, store_state};

solana_program::declare_id!("Ca1cu1atorPda111111111111111111111111111111");

pub const SEED: &[u8] = b"client1";

/// Register address of `payer` and its bump seed.
pub fn register_address(payer: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED, payer.as_ref()], &ID)
}

/// Accounts: `[payer (signer, writable), register (writable), system program]`.
pub fn to_instruction(instruction: CalculatorInstruction, payer: &Pubkey) -> std::io::Result<Instruction> {
    let (register, _) = register_address(payer);
    Ok(Instruction::new_with_bytes(
        ID,
        &borsh::to_vec(&instruction)?,
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(register, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let instruction: CalculatorInstruction = decode_instruction(invoke_context.instruction_data())?;
    let payer = invoke_context.check_signer(0)?;
    let register = *invoke_context.key(1)?;
    let (expected, bump) = Pubkey::find_program_address(&[SEED, payer.as_ref()], invoke_context.program_id());
    if register != expected {
        return Err(InstructionError::InvalidArgument);
    }

    if invoke_context.lamports(1)? == 0 {
        let lamports = invoke_context.minimum_balance_for_rent_exemption(Register::LEN)?;
        let create = system_instruction::create_account(
            &payer,
            &register,
            lamports,
            Register::LEN as u64,
            invoke_context.program_id(),
        );
        invoke_context.invoke_signed(&create, &[&[SEED, payer.as_ref(), &[bump]]])?;
        invoke_context.log(&format!("Created register {register}"));
    }

    let data = invoke_context.data_mut(1)?;
    let mut state: Register = load_state(data)?;
    state.value = instruction.apply(state.value);
    store_state(&state, data)?;

    invoke_context.log(&instruction.describe());
    invoke_context.log(&format!("value = {}", state.value));
    Ok(())
}
