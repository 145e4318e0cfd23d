use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use log::{debug, info};
use serde::Deserialize;
use serde_with::serde_as;
use solana_sdk::hash::hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{keypair_from_seed, Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;

use pocket_svm_core::{Account, Receipt, Simulator, SimulatorConfig, TransactionError, TransactionRecord};
use pocket_svm_programs::{register_all, EXAMPLE_PROGRAMS};

fn default_payer() -> String {
    "payer".to_string()
}

fn default_true() -> bool {
    true
}

/// A replayable list of steps run against a fresh simulator.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Name of the keypair paying for every transaction.
    #[serde(default = "default_payer")]
    pub payer: String,
    #[serde(default)]
    pub genesis: Vec<GenesisAccount>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing scenario {}", path.display()))
    }
}

/// Account stored in the ledger before the first step runs.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct GenesisAccount {
    pub name: String,
    pub lamports: u64,
    #[serde_as(as = "serde_with::hex::Hex")]
    #[serde(default)]
    pub data: Vec<u8>,
    /// Program name or base58 key; the system program when omitted.
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccountRef {
    pub name: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Airdrop {
        to: String,
        lamports: u64,
    },
    /// Creates `name` owned by `owner`, funded rent exempt unless `lamports`
    /// is given.
    CreateAccount {
        name: String,
        owner: String,
        space: usize,
        #[serde(default)]
        lamports: Option<u64>,
    },
    Invoke {
        program: String,
        #[serde_as(as = "serde_with::hex::Hex")]
        #[serde(default)]
        data: Vec<u8>,
        accounts: Vec<AccountRef>,
    },
    Transfer {
        from: String,
        to: String,
        lamports: u64,
    },
    ExpireBlockhash,
    ExpectData {
        account: String,
        #[serde_as(as = "serde_with::hex::Hex")]
        data: Vec<u8>,
    },
    ExpectBalance {
        account: String,
        lamports: u64,
    },
    /// Checks the error kind of the last transaction.
    ExpectError {
        error: String,
    },
}

/// Variant name of `error`, as written in scenario files.
pub fn error_kind(error: &TransactionError) -> &'static str {
    match error {
        TransactionError::NotFound(_) => "NotFound",
        TransactionError::AlreadyExists(_) => "AlreadyExists",
        TransactionError::AccessViolation(_) => "AccessViolation",
        TransactionError::InsufficientFunds(_) => "InsufficientFunds",
        TransactionError::InvalidAccountForFee(_) => "InvalidAccountForFee",
        TransactionError::BalanceOverflow(_) => "BalanceOverflow",
        TransactionError::MissingSignature(_) => "MissingSignature",
        TransactionError::BlockhashExpired => "BlockhashExpired",
        TransactionError::ProgramNotFound(_) => "ProgramNotFound",
        TransactionError::ProgramExecutionFailure { .. } => "ProgramExecutionFailure",
        TransactionError::AlreadyProcessed => "AlreadyProcessed",
        TransactionError::SanitizeFailure => "SanitizeFailure",
        TransactionError::UnbalancedTransaction => "UnbalancedTransaction",
    }
}

/// Replays scenarios. Names resolve to example programs, base58 keys, or
/// keypairs derived deterministically from the name.
pub struct ScenarioRunner {
    simulator: Simulator,
    keypairs: HashMap<String, Keypair>,
    last_receipt: Option<Receipt>,
}

impl ScenarioRunner {
    pub fn new(config: SimulatorConfig) -> anyhow::Result<Self> {
        let mut simulator = Simulator::new_with_config(config);
        register_all(&mut simulator)?;
        Ok(Self {
            simulator,
            keypairs: HashMap::new(),
            last_receipt: None,
        })
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Runs every step and returns the record of each submitted transaction.
    pub fn run(&mut self, scenario: &Scenario) -> anyhow::Result<Vec<TransactionRecord>> {
        for account in &scenario.genesis {
            let pubkey = self.resolve(&account.name)?;
            let owner = match &account.owner {
                Some(owner) => self.resolve(owner)?,
                None => system_program::id(),
            };
            let mut stored = Account::new(account.lamports, 0, &owner);
            stored.data = account.data.clone();
            self.simulator.set_account(pubkey, stored);
        }

        for (index, step) in scenario.steps.iter().enumerate() {
            debug!("step {index}: {step:?}");
            self.run_step(&scenario.payer, step)
                .with_context(|| format!("step {index} ({step:?}) failed"))?;
        }
        Ok(self.simulator.history().to_vec())
    }

    fn run_step(&mut self, payer: &str, step: &Step) -> anyhow::Result<()> {
        match step {
            Step::Airdrop { to, lamports } => {
                let pubkey = self.resolve(to)?;
                self.simulator.airdrop(&pubkey, *lamports)?;
            }
            Step::CreateAccount {
                name,
                owner,
                space,
                lamports,
            } => {
                let pubkey = self.resolve(name)?;
                let owner = self.resolve(owner)?;
                let lamports = match lamports {
                    Some(lamports) => *lamports,
                    None => self
                        .simulator
                        .minimum_balance_for_rent_exemption(*space)
                        .ok_or_else(|| anyhow!("no account can hold {space} bytes"))?,
                };
                let instruction = system_instruction::create_account(
                    &self.resolve(payer)?,
                    &pubkey,
                    lamports,
                    *space as u64,
                    &owner,
                );
                self.submit(payer, &[instruction], &[name.as_str()])?;
            }
            Step::Invoke {
                program,
                data,
                accounts,
            } => {
                let program_id = self.resolve(program)?;
                let metas = accounts
                    .iter()
                    .map(|account| {
                        let pubkey = self.resolve(&account.name)?;
                        Ok(if account.writable {
                            AccountMeta::new(pubkey, account.signer)
                        } else {
                            AccountMeta::new_readonly(pubkey, account.signer)
                        })
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let signers: Vec<&str> = accounts
                    .iter()
                    .filter(|account| account.signer)
                    .map(|account| account.name.as_str())
                    .collect();
                let instruction = Instruction::new_with_bytes(program_id, data, metas);
                self.submit(payer, &[instruction], &signers)?;
            }
            Step::Transfer { from, to, lamports } => {
                let instruction =
                    system_instruction::transfer(&self.resolve(from)?, &self.resolve(to)?, *lamports);
                self.submit(payer, &[instruction], &[from.as_str()])?;
            }
            Step::ExpireBlockhash => {
                self.simulator.expire_blockhash();
            }
            Step::ExpectData { account, data } => {
                let pubkey = self.resolve(account)?;
                let actual = self
                    .simulator
                    .get_account(&pubkey)
                    .ok_or_else(|| anyhow!("account {account} does not exist"))?
                    .data;
                if actual != *data {
                    bail!(
                        "account {account} holds {}, expected {}",
                        hex::encode(actual),
                        hex::encode(data)
                    );
                }
            }
            Step::ExpectBalance { account, lamports } => {
                let pubkey = self.resolve(account)?;
                let balance = self.simulator.get_balance(&pubkey);
                if balance != *lamports {
                    bail!("account {account} holds {balance} lamports, expected {lamports}");
                }
            }
            Step::ExpectError { error } => {
                let receipt = self
                    .last_receipt
                    .as_ref()
                    .ok_or_else(|| anyhow!("no transaction submitted yet"))?;
                match receipt.err() {
                    Some(actual) if error_kind(actual) == error.as_str() => {}
                    Some(actual) => bail!("expected {error}, transaction failed with {actual:?}"),
                    None => bail!("expected {error}, transaction succeeded"),
                }
            }
        }
        Ok(())
    }

    fn submit(
        &mut self,
        payer: &str,
        instructions: &[Instruction],
        extra_signers: &[&str],
    ) -> anyhow::Result<()> {
        let mut names = vec![payer];
        for name in extra_signers.iter().copied() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        for name in &names {
            self.resolve(name)?;
        }
        let signers = names
            .iter()
            .map(|name| {
                self.keypairs
                    .get(*name)
                    .ok_or_else(|| anyhow!("{name} cannot sign: it is not a keypair"))
            })
            .collect::<anyhow::Result<Vec<&Keypair>>>()?;

        let payer = signers[0].pubkey();
        let mut tx = Transaction::new_with_payer(instructions, Some(&payer));
        tx.try_sign(&signers, self.simulator.latest_blockhash())?;

        let receipt = self.simulator.send_transaction(&tx);
        match receipt.err() {
            Some(err) => info!("transaction {} failed: {err}", receipt.signature),
            None => info!("transaction {} succeeded", receipt.signature),
        }
        self.last_receipt = Some(receipt);
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> anyhow::Result<Pubkey> {
        if let Some(program) = EXAMPLE_PROGRAMS.iter().find(|program| program.name == name) {
            return Ok(program.program_id);
        }
        if name == "system_program" {
            return Ok(system_program::id());
        }
        if let Some(keypair) = self.keypairs.get(name) {
            return Ok(keypair.pubkey());
        }
        if let Ok(pubkey) = Pubkey::from_str(name) {
            return Ok(pubkey);
        }

        let keypair = keypair_from_seed(hash(name.as_bytes()).as_ref())
            .map_err(|err| anyhow!("deriving keypair for {name}: {err}"))?;
        let pubkey = keypair.pubkey();
        self.keypairs.insert(name.to_string(), keypair);
        Ok(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_deterministically() {
        let mut first = ScenarioRunner::new(SimulatorConfig::default()).unwrap();
        let mut second = ScenarioRunner::new(SimulatorConfig::default()).unwrap();
        assert_eq!(first.resolve("alice").unwrap(), second.resolve("alice").unwrap());
        assert_ne!(first.resolve("alice").unwrap(), first.resolve("bob").unwrap());
        assert_eq!(
            first.resolve("counter").unwrap(),
            pocket_svm_programs::counter::id()
        );
        let key = Pubkey::new_unique();
        assert_eq!(first.resolve(&key.to_string()).unwrap(), key);
    }

    #[test]
    fn parses_tagged_steps() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "steps": [
                    { "op": "airdrop", "to": "payer", "lamports": 10 },
                    { "op": "invoke", "program": "calculator", "data": "0232000000",
                      "accounts": [{ "name": "register" }] },
                    { "op": "expire_blockhash" },
                    { "op": "expect_error", "error": "BlockhashExpired" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.payer, "payer");
        assert_eq!(scenario.steps.len(), 4);
        match &scenario.steps[1] {
            Step::Invoke { data, accounts, .. } => {
                assert_eq!(data, &vec![2, 50, 0, 0, 0]);
                assert!(accounts[0].writable);
                assert!(!accounts[0].signer);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn balances_are_checked_by_name() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "steps": [
                    { "op": "airdrop", "to": "alice", "lamports": 42 },
                    { "op": "expect_balance", "account": "alice", "lamports": 42 },
                    { "op": "expect_balance", "account": "bob", "lamports": 0 }
                ]
            }"#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::new(SimulatorConfig::default()).unwrap();
        runner.run(&scenario).unwrap();

        let wrong: Scenario = serde_json::from_str(
            r#"{ "steps": [{ "op": "expect_balance", "account": "alice", "lamports": 1 }] }"#,
        )
        .unwrap();
        let err = runner.run(&wrong).unwrap_err();
        assert!(format!("{err:#}").contains("holds 42 lamports"), "{err:#}");
    }

    #[test]
    fn oversized_account_is_an_error_not_a_panic() {
        let scenario: Scenario = serde_json::from_str(&format!(
            r#"{{
                "steps": [
                    {{ "op": "airdrop", "to": "payer", "lamports": 1000000000 }},
                    {{ "op": "create_account", "name": "huge", "owner": "counter", "space": {} }}
                ]
            }}"#,
            usize::MAX
        ))
        .unwrap();
        let mut runner = ScenarioRunner::new(SimulatorConfig::default()).unwrap();
        let err = runner.run(&scenario).unwrap_err();
        assert!(format!("{err:#}").contains("no account can hold"), "{err:#}");
        assert!(runner.simulator().history().is_empty());
    }

    #[test]
    fn every_error_kind_has_a_name() {
        let key = Pubkey::new_unique();
        assert_eq!(
            error_kind(&TransactionError::InvalidAccountForFee(key)),
            "InvalidAccountForFee"
        );
        assert_eq!(error_kind(&TransactionError::BalanceOverflow(key)), "BalanceOverflow");
    }
}
