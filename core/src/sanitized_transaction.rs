use std::collections::HashSet;

use solana_program::hash::Hash;
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;
use solana_program::sanitize::Sanitize;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use pocket_svm_types::error::TransactionError;

/// A transaction in the shape the validator and dispatcher work with: the
/// fee payer, the referenced blockhash, fully expanded instructions and the
/// set of keys whose signatures were verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedTransaction {
    signature: Signature,
    fee_payer: Pubkey,
    recent_blockhash: Hash,
    instructions: Vec<Instruction>,
    signers: HashSet<Pubkey>,
    num_signatures: u64,
}

impl SanitizedTransaction {
    /// Builds a transaction from parts whose signatures were already checked
    /// by the caller.
    pub fn new(
        signature: Signature,
        fee_payer: Pubkey,
        recent_blockhash: Hash,
        instructions: Vec<Instruction>,
        signers: HashSet<Pubkey>,
    ) -> Self {
        let num_signatures = signers.len().max(1) as u64;
        Self {
            signature,
            fee_payer,
            recent_blockhash,
            instructions,
            signers,
            num_signatures,
        }
    }

    /// Checks the structure of a signed legacy transaction, verifies its
    /// signatures when `verify` is set and expands its compiled instructions.
    pub fn try_from_legacy(tx: &Transaction, verify: bool) -> Result<Self, TransactionError> {
        tx.sanitize().map_err(|_| TransactionError::SanitizeFailure)?;
        let message = &tx.message;

        let num_required = usize::from(message.header.num_required_signatures);
        if tx.signatures.len() != num_required {
            return Err(TransactionError::SanitizeFailure);
        }

        let signers: HashSet<Pubkey> = if verify {
            message
                .account_keys
                .iter()
                .zip(tx.verify_with_results())
                .filter_map(|(key, verified)| verified.then_some(*key))
                .collect()
        } else {
            message.account_keys[..num_required].iter().copied().collect()
        };

        let instructions = message
            .instructions
            .iter()
            .map(|compiled| Instruction {
                program_id: message.account_keys[usize::from(compiled.program_id_index)],
                accounts: compiled
                    .accounts
                    .iter()
                    .map(|index| {
                        let index = usize::from(*index);
                        AccountMeta {
                            pubkey: message.account_keys[index],
                            is_signer: message.is_signer(index),
                            is_writable: message.is_maybe_writable(index, None),
                        }
                    })
                    .collect(),
                data: compiled.data.clone(),
            })
            .collect();

        Ok(Self {
            signature: tx.signatures[0],
            fee_payer: message.account_keys[0],
            recent_blockhash: message.recent_blockhash,
            instructions,
            signers,
            num_signatures: num_required as u64,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.recent_blockhash
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signers(&self) -> &HashSet<Pubkey> {
        &self.signers
    }

    pub fn num_signatures(&self) -> u64 {
        self.num_signatures
    }

    /// Every key the transaction touches, fee payer first, without duplicates.
    pub fn account_keys(&self) -> Vec<Pubkey> {
        let mut seen = HashSet::new();
        std::iter::once(self.fee_payer)
            .chain(self.instructions.iter().flat_map(|instruction| {
                instruction
                    .accounts
                    .iter()
                    .map(|meta| meta.pubkey)
                    .chain(std::iter::once(instruction.program_id))
            }))
            .filter(|key| seen.insert(*key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};
    use solana_sdk::system_instruction;

    fn signed_transfer(payer: &Keypair, to: &Pubkey) -> Transaction {
        Transaction::new_signed_with_payer(
            &[system_instruction::transfer(&payer.pubkey(), to, 10)],
            Some(&payer.pubkey()),
            &[payer],
            Hash::new_unique(),
        )
    }

    #[test]
    fn expands_compiled_instructions() {
        let payer = Keypair::new();
        let to = Pubkey::new_unique();
        let tx = signed_transfer(&payer, &to);

        let sanitized = SanitizedTransaction::try_from_legacy(&tx, true).unwrap();
        assert_eq!(sanitized.fee_payer(), &payer.pubkey());
        assert_eq!(sanitized.recent_blockhash(), &tx.message.recent_blockhash);
        assert_eq!(sanitized.signature(), &tx.signatures[0]);
        assert_eq!(sanitized.num_signatures(), 1);
        assert_eq!(
            sanitized.instructions(),
            &[system_instruction::transfer(&payer.pubkey(), &to, 10)]
        );
        assert!(sanitized.signers().contains(&payer.pubkey()));
        assert_eq!(
            sanitized.account_keys(),
            vec![payer.pubkey(), to, solana_program::system_program::id()]
        );
    }

    #[test]
    fn drops_signers_whose_signature_fails() {
        let payer = Keypair::new();
        let mut tx = signed_transfer(&payer, &Pubkey::new_unique());
        tx.signatures[0] = Signature::default();

        let sanitized = SanitizedTransaction::try_from_legacy(&tx, true).unwrap();
        assert!(sanitized.signers().is_empty());

        let unverified = SanitizedTransaction::try_from_legacy(&tx, false).unwrap();
        assert!(unverified.signers().contains(&payer.pubkey()));
    }

    #[test]
    fn rejects_malformed_messages() {
        let payer = Keypair::new();
        let tx = signed_transfer(&payer, &Pubkey::new_unique());

        let mut missing_signature = tx.clone();
        missing_signature.signatures.clear();
        assert_eq!(
            SanitizedTransaction::try_from_legacy(&missing_signature, true),
            Err(TransactionError::SanitizeFailure)
        );

        let mut bad_index = tx.clone();
        bad_index.message.instructions[0].accounts[1] = 9;
        assert_eq!(
            SanitizedTransaction::try_from_legacy(&bad_index, false),
            Err(TransactionError::SanitizeFailure)
        );

        let mut payer_as_program = tx.clone();
        payer_as_program.message.instructions[0].program_id_index = 0;
        assert_eq!(
            SanitizedTransaction::try_from_legacy(&payer_as_program, false),
            Err(TransactionError::SanitizeFailure)
        );

        let mut bad_header = tx;
        bad_header.message.header.num_required_signatures = 0;
        assert_eq!(
            SanitizedTransaction::try_from_legacy(&bad_header, false),
            Err(TransactionError::SanitizeFailure)
        );
    }

    #[test]
    fn invoked_programs_are_demoted_to_readonly() {
        let payer = Keypair::new();
        let program_id = Pubkey::new_unique();
        let target = Pubkey::new_unique();
        let instruction = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(target, false), AccountMeta::new(program_id, false)],
        );
        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&payer.pubkey()),
            &[&payer],
            Hash::new_unique(),
        );

        let sanitized = SanitizedTransaction::try_from_legacy(&tx, true).unwrap();
        let metas = &sanitized.instructions()[0].accounts;
        assert_eq!(metas[0], AccountMeta::new(target, false));
        assert_eq!(metas[1], AccountMeta::new_readonly(program_id, false));
    }
}
