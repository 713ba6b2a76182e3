//! Deterministic address derivation for the escrow program.
//!
//! Seed order is part of the program's interface: the escrow record is
//! seeded by the two party keys and the contract id, and the vault is
//! seeded by the escrow record's own address. Identifier shape is enforced
//! by [`ContractId`] before any bytes reach the derivation.

use paylance_core::ContractId;
use solana_sdk::pubkey::Pubkey;

pub const ESCROW_SEED: &[u8] = b"escrow";
pub const VAULT_SEED: &[u8] = b"vault";

/// Both derived addresses for one logical contract, with bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowAddresses {
    pub escrow_state: Pubkey,
    pub escrow_bump: u8,
    pub vault: Pubkey,
    pub vault_bump: u8,
}

pub fn escrow_state_address(
    program_id: &Pubkey,
    initializer: &Pubkey,
    worker: &Pubkey,
    contract_id: &ContractId,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            ESCROW_SEED,
            initializer.as_ref(),
            worker.as_ref(),
            contract_id.as_bytes(),
        ],
        program_id,
    )
}

pub fn vault_address(program_id: &Pubkey, escrow_state: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, escrow_state.as_ref()], program_id)
}

pub fn find_escrow_addresses(
    program_id: &Pubkey,
    initializer: &Pubkey,
    worker: &Pubkey,
    contract_id: &ContractId,
) -> EscrowAddresses {
    let (escrow_state, escrow_bump) =
        escrow_state_address(program_id, initializer, worker, contract_id);
    let (vault, vault_bump) = vault_address(program_id, &escrow_state);
    EscrowAddresses {
        escrow_state,
        escrow_bump,
        vault,
        vault_bump,
    }
}
