//! Example programs that run inside the simulator. Each keeps its state as a
//! borsh-encoded record at the start of its first account and decodes its
//! instruction payload once into a borsh enum.

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;

use pocket_svm_core::builtins::BuiltinPrototype;
use pocket_svm_core::{InstructionError, Simulator, TransactionResult};

pub mod calculator;
pub mod calculator_pda;
pub mod counter;
pub mod doubler;
pub mod string_store;

pub static EXAMPLE_PROGRAMS: &[BuiltinPrototype] = &[
    BuiltinPrototype {
        program_id: counter::ID,
        name: "counter",
        entrypoint: counter::process_instruction,
    },
    BuiltinPrototype {
        program_id: doubler::ID,
        name: "doubler",
        entrypoint: doubler::process_instruction,
    },
    BuiltinPrototype {
        program_id: calculator::ID,
        name: "calculator",
        entrypoint: calculator::process_instruction,
    },
    BuiltinPrototype {
        program_id: calculator_pda::ID,
        name: "calculator_pda",
        entrypoint: calculator_pda::process_instruction,
    },
    BuiltinPrototype {
        program_id: string_store::ID,
        name: "string_store",
        entrypoint: string_store::process_instruction,
    },
];

/// Registers every example program with `simulator`.
pub fn register_all(simulator: &mut Simulator) -> TransactionResult<()> {
    for program in EXAMPLE_PROGRAMS {
        simulator.add_program(program.program_id, program.name, program.entrypoint)?;
        debug!("registered {} at {}", program.name, program.program_id);
    }
    Ok(())
}

pub(crate) fn decode_instruction<T: BorshDeserialize>(data: &[u8]) -> Result<T, InstructionError> {
    T::try_from_slice(data).map_err(|_| InstructionError::InvalidInstructionData)
}

/// Reads a state record from the front of `data`. Trailing bytes are ignored.
pub(crate) fn load_state<T: BorshDeserialize>(data: &[u8]) -> Result<T, InstructionError> {
    T::deserialize(&mut &data[..]).map_err(|_| InstructionError::InvalidAccountData)
}

/// Writes a state record to the front of `data` and zeroes the rest.
pub(crate) fn store_state<T: BorshSerialize>(state: &T, data: &mut [u8]) -> Result<(), InstructionError> {
    let bytes = borsh::to_vec(state).map_err(|_| InstructionError::InvalidAccountData)?;
    if bytes.len() > data.len() {
        return Err(InstructionError::AccountDataTooSmall);
    }
    let (head, tail) = data.split_at_mut(bytes.len());
    head.copy_from_slice(&bytes);
    tail.fill(0);
    Ok(())
}
