use std::collections::BTreeMap;
use std::fmt;

use solana_program::pubkey::Pubkey;

use pocket_svm_types::error::InstructionError;

use crate::builtins::BUILTINS;
use crate::invoke_context::InvokeContext;

/// Entrypoint signature every registered program implements.
pub type ProcessInstruction = fn(&mut InvokeContext) -> Result<(), InstructionError>;

#[derive(Clone)]
pub struct LoadedProgram {
    pub name: String,
    pub entrypoint: ProcessInstruction,
}

impl fmt::Debug for LoadedProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoadedProgram")
            .field("name", &self.name)
            .finish()
    }
}

/// Program id to entrypoint table consulted by the message processor.
#[derive(Debug, Clone, Default)]
pub struct ProgramCache {
    entries: BTreeMap<Pubkey, LoadedProgram>,
}

impl ProgramCache {
    pub fn new_with_builtins() -> Self {
        let mut cache = Self::default();
        for builtin in BUILTINS {
            cache.replenish(builtin.program_id, builtin.name, builtin.entrypoint);
        }
        cache
    }

    /// Registers `entrypoint` under `program_id`. Returns `false` without
    /// touching the existing entry if the id is already taken.
    pub fn replenish(
        &mut self,
        program_id: Pubkey,
        name: impl Into<String>,
        entrypoint: ProcessInstruction,
    ) -> bool {
        if self.entries.contains_key(&program_id) {
            return false;
        }
        self.entries.insert(
            program_id,
            LoadedProgram {
                name: name.into(),
                entrypoint,
            },
        );
        true
    }

    pub fn find(&self, program_id: &Pubkey) -> Option<&LoadedProgram> {
        self.entries.get(program_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
