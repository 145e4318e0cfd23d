//! The builtin that creates accounts and moves lamports between
//! system-owned accounts.

use bincode::Options;
use log::trace;
use solana_program::pubkey::Pubkey;
use solana_program::system_instruction::SystemInstruction;
use solana_program::system_program;

use pocket_svm_types::error::InstructionError;

use crate::invoke_context::InvokeContext;

const MAX_INSTRUCTION_DATA_LEN: u64 = 1232;

fn decode_instruction(data: &[u8]) -> Result<SystemInstruction, InstructionError> {
    bincode::options()
        .with_limit(MAX_INSTRUCTION_DATA_LEN)
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize(data)
        .map_err(|_| InstructionError::InvalidInstructionData)
}

fn check_writable_signer(
    invoke_context: &InvokeContext,
    index: usize,
) -> Result<Pubkey, InstructionError> {
    let key = invoke_context.check_signer(index)?;
    if !invoke_context.is_writable(index)? {
        return Err(InstructionError::AccessViolation(key));
    }
    Ok(key)
}

pub fn process_instruction(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
    let instruction = decode_instruction(invoke_context.instruction_data())?;
    trace!("process_instruction: {instruction:?}");

    match instruction {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => create_account(invoke_context, lamports, space, &owner),
        SystemInstruction::Transfer { lamports } => transfer(invoke_context, lamports),
        SystemInstruction::Assign { owner } => assign(invoke_context, &owner),
        _ => Err(InstructionError::InvalidInstructionData),
    }
}

fn create_account(
    invoke_context: &mut InvokeContext,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Result<(), InstructionError> {
    let from = check_writable_signer(invoke_context, 0)?;
    let to = check_writable_signer(invoke_context, 1)?;
    let space = usize::try_from(space).map_err(|_| InstructionError::InvalidArgument)?;

    let accounts = invoke_context.accounts_db_mut();
    if accounts.contains(&to) {
        return Err(InstructionError::AccountAlreadyInUse(to));
    }

    let funder = accounts.get(&from)?;
    if funder.owner != system_program::id() || !funder.data.is_empty() {
        return Err(InstructionError::AccessViolation(from));
    }
    let remaining = funder
        .lamports
        .checked_sub(lamports)
        .ok_or(InstructionError::InsufficientFunds(from))?;

    accounts.create(&to, owner, lamports, space)?;
    accounts.set_balance(&from, remaining)?;
    invoke_context.log(&format!("Create account {to}: {space} bytes owned by {owner}"));
    Ok(())
}

fn transfer(invoke_context: &mut InvokeContext, lamports: u64) -> Result<(), InstructionError> {
    let from = invoke_context.check_signer(0)?;
    if !invoke_context.account(0)?.data.is_empty() {
        return Err(InstructionError::InvalidArgument);
    }
    invoke_context.transfer_lamports(0, 1, lamports)?;
    trace!("transfer: from={from} to={} lamports={lamports}", invoke_context.key(1)?);
    Ok(())
}

fn assign(invoke_context: &mut InvokeContext, owner: &Pubkey) -> Result<(), InstructionError> {
    let key = check_writable_signer(invoke_context, 0)?;
    let account = invoke_context.accounts_db_mut().get_mut(&key)?;
    if account.owner != system_program::id() {
        return Err(InstructionError::AccessViolation(key));
    }
    account.owner = *owner;
    Ok(())
}
