use solana_program::pubkey::Pubkey;
use solana_program::system_program;

use crate::loaded_programs::ProcessInstruction;

pub struct BuiltinPrototype {
    pub program_id: Pubkey,
    pub name: &'static str,
    pub entrypoint: ProcessInstruction,
}

impl std::fmt::Debug for BuiltinPrototype {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut builder = f.debug_struct("BuiltinPrototype");
        builder.field("program_id", &self.program_id);
        builder.field("name", &self.name);
        builder.finish()
    }
}

/// Programs every simulator starts with.
pub static BUILTINS: &[BuiltinPrototype] = &[BuiltinPrototype {
    program_id: system_program::id(),
    name: "system_program",
    entrypoint: crate::system_program::process_instruction,
}];
