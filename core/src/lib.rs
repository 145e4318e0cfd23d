pub mod accounts_db;
pub mod blockhash_registry;
pub mod builtins;
pub mod config;
pub mod invoke_context;
pub mod loaded_programs;
pub mod message_processor;
pub mod sanitized_transaction;
pub mod simulator;
pub mod system_program;
pub mod transaction_context;
pub mod transaction_validator;

pub use pocket_svm_types::account::Account;
pub use pocket_svm_types::error::{InstructionError, TransactionError, TransactionResult};
pub use pocket_svm_types::result::{Receipt, TransactionRecord};

pub use crate::config::SimulatorConfig;
pub use crate::invoke_context::InvokeContext;
pub use crate::loaded_programs::ProcessInstruction;
pub use crate::sanitized_transaction::SanitizedTransaction;
pub use crate::simulator::Simulator;
