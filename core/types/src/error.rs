use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

pub type TransactionResult<T> = Result<T, TransactionError>;

/// Failures a program (or the runtime acting on its behalf) can report while
/// processing a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, thiserror::Error)]
pub enum InstructionError {
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),
    #[error("account {0} already in use")]
    AccountAlreadyInUse(Pubkey),
    #[error("instruction modified account {0} without permission")]
    AccessViolation(Pubkey),
    #[error("account {0} has insufficient funds")]
    InsufficientFunds(Pubkey),
    #[error("missing required signature for account {0}")]
    MissingRequiredSignature(Pubkey),
    #[error("insufficient account keys for instruction")]
    NotEnoughAccountKeys,
    #[error("invalid instruction data")]
    InvalidInstructionData,
    #[error("invalid account data for instruction")]
    InvalidAccountData,
    #[error("account data too small for instruction")]
    AccountDataTooSmall,
    #[error("invalid program argument")]
    InvalidArgument,
    #[error("arithmetic overflowed")]
    ArithmeticOverflow,
    #[error("program {0} cannot be invoked from another program")]
    UnsupportedProgramId(Pubkey),
    #[error("invoked instruction references account {0} the caller did not pass")]
    MissingAccount(Pubkey),
    #[error("cross-program invocation escalates privileges of account {0}")]
    PrivilegeEscalation(Pubkey),
    #[error("seeds do not derive a valid program address")]
    InvalidSeeds,
    #[error("custom program error: {0:#x}")]
    Custom(u32),
}

/// Reasons a transaction was rejected or rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, thiserror::Error)]
pub enum TransactionError {
    #[error("account {0} not found")]
    NotFound(Pubkey),
    #[error("account {0} already exists")]
    AlreadyExists(Pubkey),
    #[error("access violation on account {0}")]
    AccessViolation(Pubkey),
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(Pubkey),
    #[error("missing signature for account {0}")]
    MissingSignature(Pubkey),
    #[error("blockhash expired")]
    BlockhashExpired,
    #[error("program {0} not found")]
    ProgramNotFound(Pubkey),
    #[error("instruction {instruction} failed: {reason}")]
    ProgramExecutionFailure {
        instruction: u8,
        reason: InstructionError,
    },
    #[error("transaction already processed")]
    AlreadyProcessed,
    #[error("transaction failed to sanitize")]
    SanitizeFailure,
    #[error("sum of account balances before and after transaction do not match")]
    UnbalancedTransaction,
    #[error("account {0} cannot pay fees")]
    InvalidAccountForFee(Pubkey),
    #[error("balance of account {0} would overflow")]
    BalanceOverflow(Pubkey),
}

impl TransactionError {
    /// Lifts an error raised while executing instruction `instruction` into
    /// the transaction-level error reported to callers.
    pub fn from_instruction_error(instruction: u8, error: InstructionError) -> Self {
        match error {
            InstructionError::AccountNotFound(key) => Self::NotFound(key),
            InstructionError::AccountAlreadyInUse(key) => Self::AlreadyExists(key),
            InstructionError::AccessViolation(key) => Self::AccessViolation(key),
            InstructionError::InsufficientFunds(key) => Self::InsufficientFunds(key),
            InstructionError::MissingRequiredSignature(key) => Self::MissingSignature(key),
            reason => Self::ProgramExecutionFailure {
                instruction,
                reason,
            },
        }
    }
}
