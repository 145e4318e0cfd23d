use log::debug;
use solana_program::instruction::TRANSACTION_LEVEL_STACK_HEIGHT;
use solana_program_runtime::stable_log;

use pocket_svm_types::error::{TransactionError, TransactionResult};

use crate::invoke_context::InvokeContext;
use crate::loaded_programs::ProgramCache;
use crate::sanitized_transaction::SanitizedTransaction;
use crate::transaction_context::TransactionContext;

/// Runs every instruction of `tx` in order against the working set held by
/// `transaction_context`, stopping at the first failure.
pub fn process_message(
    tx: &SanitizedTransaction,
    programs: &ProgramCache,
    transaction_context: &mut TransactionContext,
) -> TransactionResult<()> {
    for (index, instruction) in tx.instructions().iter().enumerate() {
        let instruction_index = u8::try_from(index).map_err(|_| TransactionError::SanitizeFailure)?;
        let program_id = instruction.program_id;
        let program = programs
            .find(&program_id)
            .ok_or(TransactionError::ProgramNotFound(program_id))?;

        let log_collector = transaction_context.log_collector().clone();
        stable_log::program_invoke(&log_collector, &program_id, TRANSACTION_LEVEL_STACK_HEIGHT);

        let mut invoke_context = InvokeContext::new(
            program_id,
            &instruction.accounts,
            &instruction.data,
            transaction_context.accounts_mut(),
            log_collector.clone(),
        );
        match (program.entrypoint)(&mut invoke_context) {
            Ok(()) => stable_log::program_success(&log_collector, &program_id),
            Err(err) => {
                stable_log::program_failure(&log_collector, &program_id, &err);
                debug!("instruction {index} of {} failed: {err}", tx.signature());
                return Err(TransactionError::from_instruction_error(instruction_index, err));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts_db::AccountsDb;
    use crate::config::DEFAULT_LOG_MESSAGES_BYTES_LIMIT;
    use assert_matches::assert_matches;
    use pocket_svm_types::error::InstructionError;
    use solana_program::hash::Hash;
    use solana_program::instruction::{AccountMeta, Instruction};
    use solana_program::pubkey::Pubkey;
    use solana_sdk::signature::Signature;

    fn write_first_byte(invoke_context: &mut InvokeContext) -> Result<(), InstructionError> {
        let value = *invoke_context
            .instruction_data()
            .first()
            .ok_or(InstructionError::InvalidInstructionData)?;
        invoke_context.data_mut(0)?[0] = value;
        invoke_context.log("wrote");
        Ok(())
    }

    struct Fixture {
        program_id: Pubkey,
        target: Pubkey,
        programs: ProgramCache,
        context: TransactionContext,
    }

    impl Fixture {
        fn new() -> Self {
            let program_id = Pubkey::new_unique();
            let target = Pubkey::new_unique();
            let mut programs = ProgramCache::new_with_builtins();
            programs.replenish(program_id, "write_first_byte", write_first_byte);
            let mut accounts = AccountsDb::default();
            let lamports = accounts.minimum_balance_for_rent_exemption(1).unwrap();
            accounts.create(&target, &program_id, lamports, 1).unwrap();
            Self {
                program_id,
                target,
                programs,
                context: TransactionContext::new(accounts, Some(DEFAULT_LOG_MESSAGES_BYTES_LIMIT)),
            }
        }

        fn instruction(&self, data: &[u8]) -> Instruction {
            Instruction::new_with_bytes(self.program_id, data, vec![AccountMeta::new(self.target, false)])
        }

        fn process(&mut self, instructions: Vec<Instruction>) -> TransactionResult<()> {
            let tx = SanitizedTransaction::new(
                Signature::new_unique(),
                Pubkey::new_unique(),
                Hash::default(),
                instructions,
                Default::default(),
            );
            process_message(&tx, &self.programs, &mut self.context)
        }
    }

    #[test]
    fn runs_instructions_in_order() {
        let mut fixture = Fixture::new();
        let instructions = vec![fixture.instruction(&[1]), fixture.instruction(&[2])];
        fixture.process(instructions).unwrap();

        assert_eq!(fixture.context.accounts().get(&fixture.target).unwrap().data, vec![2]);
        let program_id = fixture.program_id;
        assert_eq!(
            fixture.context.logs(),
            vec![
                format!("Program {program_id} invoke [1]"),
                "Program log: wrote".to_string(),
                format!("Program {program_id} success"),
                format!("Program {program_id} invoke [1]"),
                "Program log: wrote".to_string(),
                format!("Program {program_id} success"),
            ]
        );
    }

    #[test]
    fn failure_carries_instruction_index() {
        let mut fixture = Fixture::new();
        let instructions = vec![fixture.instruction(&[1]), fixture.instruction(&[])];
        assert_eq!(
            fixture.process(instructions),
            Err(TransactionError::ProgramExecutionFailure {
                instruction: 1,
                reason: InstructionError::InvalidInstructionData,
            })
        );
        let logs = fixture.context.logs();
        assert!(logs
            .last()
            .unwrap()
            .ends_with("failed: invalid instruction data"));
    }

    #[test]
    fn unknown_program_stops_dispatch() {
        let mut fixture = Fixture::new();
        let unknown = Pubkey::new_unique();
        let instructions = vec![
            Instruction::new_with_bytes(unknown, &[], vec![]),
            fixture.instruction(&[7]),
        ];
        assert_matches!(
            fixture.process(instructions),
            Err(TransactionError::ProgramNotFound(key)) if key == unknown
        );
        assert_eq!(fixture.context.accounts().get(&fixture.target).unwrap().data, vec![0]);
    }

    #[test]
    fn store_errors_keep_their_kind() {
        let mut fixture = Fixture::new();
        let readonly = Instruction::new_with_bytes(
            fixture.program_id,
            &[1],
            vec![AccountMeta::new_readonly(fixture.target, false)],
        );
        assert_eq!(
            fixture.process(vec![readonly]),
            Err(TransactionError::AccessViolation(fixture.target))
        );
    }
}
