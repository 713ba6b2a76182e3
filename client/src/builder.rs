//! Instruction assembly for every escrow lifecycle operation.
//!
//! Account lists are resolved dynamically against the program's declared
//! schema instead of hardcoded per instruction, so an account added in a
//! newer program build only needs a new binding, not a new code path. Each
//! builder method re-checks the lifecycle state machine first; dispatching
//! an instruction the program is guaranteed to refuse wastes a signature
//! and a round trip.

use anchor_lang::prelude::borsh;
use anchor_lang::AnchorSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;

use paylance_core::error::{SchemaError, ValidationError};
use paylance_core::schema::InstructionDef;
use paylance_core::{ContractId, EscrowContract, EscrowOp, ProgramSchema};

use crate::chain::{associated_token_address, ChainReader};
use crate::context::AppContext;
use crate::error::{ClientError, Result};
use crate::pda::{find_escrow_addresses, EscrowAddresses};
use crate::wallet::{map_sign_error, WalletSession};

/// Schema document of the deployed escrow program.
pub const EMBEDDED_SCHEMA: &str = include_str!("../schema/escrow_program.json");

#[derive(AnchorSerialize)]
struct InitializeEscrowArgs {
    contract_id: [u8; 32],
    amount: u64,
    fee_bps: u16,
    admin_one: [u8; 32],
    admin_two: [u8; 32],
}

#[derive(AnchorSerialize)]
struct AdminVoteArgs {
    vote_for_worker: bool,
}

/// Validated terms for escrow initialization.
#[derive(Debug, Clone)]
pub struct InitializeTerms {
    pub initializer: Pubkey,
    pub worker: Pubkey,
    pub contract_id: ContractId,
    /// Base units, already scaled by the mint's decimals.
    pub amount: u64,
    pub fee_bps: u16,
    pub admin1: Pubkey,
    pub admin2: Pubkey,
    pub usdc_mint: Pubkey,
    pub initializer_usdc_ata: Pubkey,
}

pub struct EscrowTransactionBuilder {
    program_id: Pubkey,
    schema: ProgramSchema,
}

impl EscrowTransactionBuilder {
    pub fn new(program_id: Pubkey, schema: ProgramSchema) -> Self {
        Self { program_id, schema }
    }

    /// Builder over the embedded schema document.
    pub fn embedded(program_id: Pubkey) -> Result<Self> {
        let schema = ProgramSchema::from_json(EMBEDDED_SCHEMA)?;
        Ok(Self::new(program_id, schema))
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn addresses(
        &self,
        initializer: &Pubkey,
        worker: &Pubkey,
        contract_id: &ContractId,
    ) -> EscrowAddresses {
        find_escrow_addresses(&self.program_id, initializer, worker, contract_id)
    }

    pub fn initialize_escrow(
        &self,
        terms: &InitializeTerms,
    ) -> Result<(Instruction, EscrowAddresses)> {
        if terms.amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        paylance_core::amount::validate_fee_bps(terms.fee_bps as u32)?;

        let addrs = self.addresses(&terms.initializer, &terms.worker, &terms.contract_id);
        let args = encode_args(&InitializeEscrowArgs {
            contract_id: *terms.contract_id.as_bytes(),
            amount: terms.amount,
            fee_bps: terms.fee_bps,
            admin_one: terms.admin1.to_bytes(),
            admin_two: terms.admin2.to_bytes(),
        })?;
        let ix = self.instruction(
            EscrowOp::InitializeEscrow,
            &[
                ("initializer", terms.initializer),
                ("worker", terms.worker),
                ("escrowState", addrs.escrow_state),
                ("vault", addrs.vault),
                ("initializerUsdcAta", terms.initializer_usdc_ata),
                ("usdcMint", terms.usdc_mint),
            ],
            &args,
        )?;
        Ok((ix, addrs))
    }

    pub fn worker_accept(&self, contract: &EscrowContract, worker: Pubkey) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::WorkerAccept)?;
        self.state_only(EscrowOp::WorkerAccept, contract, "worker", worker)
    }

    pub fn employer_approve_completion(
        &self,
        contract: &EscrowContract,
        initializer: Pubkey,
    ) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::EmployerApproveCompletion)?;
        self.state_only(
            EscrowOp::EmployerApproveCompletion,
            contract,
            "initializer",
            initializer,
        )
    }

    pub fn worker_approve_completion(
        &self,
        contract: &EscrowContract,
        worker: Pubkey,
    ) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::WorkerApproveCompletion)?;
        self.state_only(EscrowOp::WorkerApproveCompletion, contract, "worker", worker)
    }

    /// Either party may open a dispute from `Initialized` or `Accepted`.
    pub fn open_dispute(&self, contract: &EscrowContract, signer: Pubkey) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::OpenDispute)?;
        self.state_only(EscrowOp::OpenDispute, contract, "signer", signer)
    }

    pub fn admin_vote(
        &self,
        contract: &EscrowContract,
        admin: Pubkey,
        vote_for_worker: bool,
    ) -> Result<Instruction> {
        contract.ensure_vote_allowed(&admin.to_bytes())?;
        let args = encode_args(&AdminVoteArgs { vote_for_worker })?;
        self.instruction(
            EscrowOp::AdminVote,
            &[
                ("admin", admin),
                ("escrowState", self.escrow_state_of(contract)),
            ],
            &args,
        )
    }

    /// Mutual release on the happy path, callable by either party.
    pub fn release_if_both_approved(
        &self,
        contract: &EscrowContract,
        caller: Pubkey,
    ) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::ReleaseIfBothApproved)?;
        self.payout(EscrowOp::ReleaseIfBothApproved, contract, "caller", caller)
    }

    /// Post-dispute release, consistent with the on-chain vote tally. The
    /// tally itself is enforced by the program, not re-derived here.
    pub fn release_to_worker(
        &self,
        contract: &EscrowContract,
        admin: Pubkey,
    ) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::ReleaseToWorker)?;
        self.payout(EscrowOp::ReleaseToWorker, contract, "admin", admin)
    }

    pub fn refund_to_employer(
        &self,
        contract: &EscrowContract,
        admin: Pubkey,
    ) -> Result<Instruction> {
        contract.ensure_allowed(EscrowOp::RefundToEmployer)?;
        let mint = Pubkey::new_from_array(contract.usdc_mint);
        let initializer = Pubkey::new_from_array(contract.initializer);
        self.instruction(
            EscrowOp::RefundToEmployer,
            &[
                ("admin", admin),
                ("escrowState", self.escrow_state_of(contract)),
                ("vault", Pubkey::new_from_array(contract.vault)),
                (
                    "initializerUsdcAta",
                    associated_token_address(&initializer, &mint),
                ),
            ],
            &[],
        )
    }

    /// Preconditions on the funding source, checked before any wallet call.
    pub async fn preflight_funding(
        &self,
        reader: &dyn ChainReader,
        owner: &Pubkey,
        mint: &Pubkey,
        source: &Pubkey,
        required: u64,
    ) -> Result<()> {
        let info = reader
            .token_account(source)
            .await?
            .ok_or(ValidationError::MissingSourceAccount)?;
        if info.owner != *owner {
            return Err(ValidationError::OwnerMismatch {
                expected: owner.to_string(),
                found: info.owner.to_string(),
            }
            .into());
        }
        if info.mint != *mint {
            return Err(ValidationError::MintMismatch {
                expected: mint.to_string(),
                found: info.mint.to_string(),
            }
            .into());
        }
        if info.amount < required {
            return Err(ValidationError::InsufficientBalance {
                available: info.amount,
                required,
            }
            .into());
        }
        Ok(())
    }

    fn escrow_state_of(&self, contract: &EscrowContract) -> Pubkey {
        let (address, _) = crate::pda::escrow_state_address(
            &self.program_id,
            &Pubkey::new_from_array(contract.initializer),
            &Pubkey::new_from_array(contract.worker),
            &contract.contract_id,
        );
        address
    }

    fn state_only(
        &self,
        op: EscrowOp,
        contract: &EscrowContract,
        signer_role: &str,
        signer: Pubkey,
    ) -> Result<Instruction> {
        self.instruction(
            op,
            &[
                (signer_role, signer),
                ("escrowState", self.escrow_state_of(contract)),
            ],
            &[],
        )
    }

    fn payout(
        &self,
        op: EscrowOp,
        contract: &EscrowContract,
        signer_role: &str,
        signer: Pubkey,
    ) -> Result<Instruction> {
        let mint = Pubkey::new_from_array(contract.usdc_mint);
        let worker = Pubkey::new_from_array(contract.worker);
        let fee_wallet = Pubkey::new_from_array(contract.fee_wallet);
        self.instruction(
            op,
            &[
                (signer_role, signer),
                ("escrowState", self.escrow_state_of(contract)),
                ("vault", Pubkey::new_from_array(contract.vault)),
                ("workerUsdcAta", associated_token_address(&worker, &mint)),
                (
                    "adminFeeAccount",
                    associated_token_address(&fee_wallet, &mint),
                ),
            ],
            &[],
        )
    }

    /// Resolves bound accounts against the schema's declared order and
    /// flags, then prefixes the discriminator.
    fn instruction(
        &self,
        op: EscrowOp,
        bindings: &[(&str, Pubkey)],
        args: &[u8],
    ) -> Result<Instruction> {
        let def = self.schema.instruction(op.name())?;
        let accounts = resolve_accounts(def, bindings)?;
        let mut data = def.discriminator().to_vec();
        data.extend_from_slice(args);
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}

fn resolve_accounts(
    def: &InstructionDef,
    bindings: &[(&str, Pubkey)],
) -> Result<Vec<AccountMeta>> {
    let mut metas = Vec::with_capacity(def.accounts.len());
    for role in &def.accounts {
        let key = bindings
            .iter()
            .find(|(name, _)| *name == role.name)
            .map(|(_, key)| *key)
            .or_else(|| well_known_account(&role.name))
            .ok_or_else(|| SchemaError::MissingAccount {
                instruction: def.name.clone(),
                account: role.name.clone(),
            })?;
        metas.push(if role.writable {
            AccountMeta::new(key, role.signer)
        } else {
            AccountMeta::new_readonly(key, role.signer)
        });
    }
    Ok(metas)
}

/// Program and sysvar roles every deployment shares; these are filled in
/// automatically when the schema asks for them.
fn well_known_account(name: &str) -> Option<Pubkey> {
    match name {
        "tokenProgram" | "token_program" => Some(spl_token::ID),
        "associatedTokenProgram" | "associated_token_program" => {
            Some(spl_associated_token_account::ID)
        }
        "systemProgram" | "system_program" => Some(system_program::ID),
        "rent" => Some(solana_sdk::sysvar::rent::ID),
        _ => None,
    }
}

fn encode_args<T: AnchorSerialize>(args: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    args.serialize(&mut buf)
        .map_err(|e| ClientError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Signs with the connected wallet session and submits. The signing leg
/// holds the process-wide wallet guard like any other popup-raising call.
pub async fn sign_and_submit(
    ctx: &AppContext,
    reader: &dyn ChainReader,
    session: &WalletSession,
    instructions: &[Instruction],
) -> Result<Signature> {
    let blockhash = reader.latest_blockhash().await?;
    let mut tx = Transaction::new_with_payer(instructions, Some(&session.public_key));
    tx.message.recent_blockhash = blockhash;
    let tx = {
        let _permit = ctx.wallet_flight.acquire()?;
        session
            .provider
            .sign_transaction(tx)
            .await
            .map_err(map_sign_error)?
    };
    reader.send_transaction(&tx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use paylance_core::error::EscrowError;
    use paylance_core::EscrowStatus;

    fn builder() -> EscrowTransactionBuilder {
        EscrowTransactionBuilder::embedded(Pubkey::new_from_array([9; 32])).unwrap()
    }

    fn terms() -> InitializeTerms {
        InitializeTerms {
            initializer: Pubkey::new_from_array([1; 32]),
            worker: Pubkey::new_from_array([2; 32]),
            contract_id: ContractId::new([3; 32]),
            amount: 250_500_000,
            fee_bps: 250,
            admin1: Pubkey::new_from_array([4; 32]),
            admin2: Pubkey::new_from_array([5; 32]),
            usdc_mint: Pubkey::new_from_array([6; 32]),
            initializer_usdc_ata: Pubkey::new_from_array([7; 32]),
        }
    }

    fn accepted_contract() -> EscrowContract {
        EscrowContract {
            initializer: [1; 32],
            worker: [2; 32],
            contract_id: ContractId::new([3; 32]),
            admin1: [4; 32],
            admin2: [5; 32],
            vault: [6; 32],
            usdc_mint: [7; 32],
            amount: 250_500_000,
            fee_bps: 250,
            fee_wallet: [8; 32],
            status: EscrowStatus::Accepted,
            employer_approved: false,
            worker_approved: false,
            admin1_voted: false,
            admin2_voted: false,
            votes_for_worker: 0,
            votes_for_employer: 0,
            finalized: false,
            resolved_for_worker: None,
            bump: 255,
            vault_bump: 254,
        }
    }

    #[test]
    fn initialize_follows_schema_order() {
        let b = builder();
        let t = terms();
        let (ix, addrs) = b.initialize_escrow(&t).unwrap();

        assert_eq!(ix.program_id, b.program_id());
        // Declared order: initializer, worker, escrowState, vault, ata,
        // mint, tokenProgram, systemProgram, rent.
        assert_eq!(ix.accounts.len(), 9);
        assert_eq!(ix.accounts[0].pubkey, t.initializer);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[2].pubkey, addrs.escrow_state);
        assert_eq!(ix.accounts[3].pubkey, addrs.vault);
        assert_eq!(ix.accounts[6].pubkey, spl_token::ID);
        assert_eq!(ix.accounts[7].pubkey, system_program::ID);
        assert_eq!(ix.accounts[8].pubkey, solana_sdk::sysvar::rent::ID);

        // 8-byte discriminator, 32-byte id, u64 amount, u16 fee, 2 admins.
        assert_eq!(ix.data.len(), 8 + 32 + 8 + 2 + 32 + 32);
        assert_eq!(&ix.data[..8], &[243, 160, 77, 153, 11, 92, 48, 209]);
        assert_eq!(&ix.data[8..40], t.contract_id.as_bytes());
        assert_eq!(&ix.data[40..48], &250_500_000u64.to_le_bytes());
        assert_eq!(&ix.data[48..50], &250u16.to_le_bytes());
    }

    #[test]
    fn initialize_rejects_bad_terms() {
        let b = builder();
        let mut t = terms();
        t.fee_bps = 10_001;
        assert!(matches!(
            b.initialize_escrow(&t),
            Err(ClientError::Escrow(EscrowError::Validation(
                ValidationError::FeeOutOfRange(10_001)
            )))
        ));

        let mut t = terms();
        t.amount = 0;
        assert!(matches!(
            b.initialize_escrow(&t),
            Err(ClientError::Escrow(EscrowError::Validation(
                ValidationError::ZeroAmount
            )))
        ));

        // 10000 bps is the inclusive upper bound.
        let mut t = terms();
        t.fee_bps = 10_000;
        assert!(b.initialize_escrow(&t).is_ok());
    }

    #[test]
    fn disputed_contract_rejects_normal_path() {
        let b = builder();
        let mut contract = accepted_contract();
        contract.status = EscrowStatus::Dispute;
        let signer = Pubkey::new_from_array([1; 32]);

        assert!(matches!(
            b.employer_approve_completion(&contract, signer),
            Err(ClientError::Escrow(EscrowError::InvalidTransition { .. }))
        ));
        assert!(matches!(
            b.release_if_both_approved(&contract, signer),
            Err(ClientError::Escrow(EscrowError::InvalidTransition { .. }))
        ));
        // The dispute machinery itself stays available.
        assert!(b
            .admin_vote(&contract, Pubkey::new_from_array([4; 32]), true)
            .is_ok());
    }

    #[test]
    fn payout_binds_derived_token_accounts() {
        let b = builder();
        let mut contract = accepted_contract();
        contract.employer_approved = true;
        contract.worker_approved = true;
        let ix = b
            .release_if_both_approved(&contract, Pubkey::new_from_array([1; 32]))
            .unwrap();

        let mint = Pubkey::new_from_array(contract.usdc_mint);
        let worker_ata =
            associated_token_address(&Pubkey::new_from_array(contract.worker), &mint);
        let fee_ata =
            associated_token_address(&Pubkey::new_from_array(contract.fee_wallet), &mint);
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.accounts[2].pubkey, Pubkey::new_from_array(contract.vault));
        assert_eq!(ix.accounts[3].pubkey, worker_ata);
        assert_eq!(ix.accounts[4].pubkey, fee_ata);
    }

    #[test]
    fn vote_encodes_flag() {
        let b = builder();
        let mut contract = accepted_contract();
        contract.status = EscrowStatus::Dispute;
        let ix = b
            .admin_vote(&contract, Pubkey::new_from_array([5; 32]), true)
            .unwrap();
        assert_eq!(&ix.data[..8], &[141, 5, 163, 49, 144, 145, 114, 36]);
        assert_eq!(ix.data[8], 1);
    }

    #[test]
    fn missing_binding_surfaces_schema_error() {
        let schema = ProgramSchema::from_json(EMBEDDED_SCHEMA).unwrap();
        let def = schema.instruction("releaseIfBothApproved").unwrap();
        let err = resolve_accounts(def, &[("caller", Pubkey::new_unique())]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Escrow(EscrowError::Schema(SchemaError::MissingAccount { .. }))
        ));
    }
}
