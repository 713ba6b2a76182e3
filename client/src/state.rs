//! Decoding of the on-chain escrow record.

use anchor_lang::prelude::borsh;
use anchor_lang::{AnchorDeserialize, AnchorSerialize};
use paylance_core::{ContractId, EscrowContract, EscrowStatus};

use crate::error::{ClientError, Result};

/// Anchor account discriminator for the escrow record, as declared by the
/// program schema.
pub const ESCROW_STATE_DISCRIMINATOR: [u8; 8] = [19, 90, 148, 111, 55, 130, 229, 108];

// Field order is the on-chain layout. Keys are raw 32-byte arrays, which
// borsh encodes identically to pubkeys.
#[derive(Debug, Clone, PartialEq, AnchorSerialize, AnchorDeserialize)]
struct RawEscrowState {
    initializer: [u8; 32],
    worker: [u8; 32],
    contract_id: [u8; 32],
    admin1: [u8; 32],
    admin2: [u8; 32],
    vault: [u8; 32],
    usdc_mint: [u8; 32],
    amount: u64,
    fee_bps: u16,
    fee_wallet: [u8; 32],
    status: u8,
    employer_approved: bool,
    worker_approved: bool,
    admin1_voted: bool,
    admin2_voted: bool,
    votes_for_worker: u8,
    votes_for_employer: u8,
    finalized: bool,
    resolved_for_worker: Option<bool>,
    bump: u8,
    vault_bump: u8,
}

/// Decodes raw account data, checking the discriminator first.
pub fn decode_escrow_state(data: &[u8]) -> Result<EscrowContract> {
    if data.len() < ESCROW_STATE_DISCRIMINATOR.len() {
        return Err(ClientError::Decode(format!(
            "account data too short: {} bytes",
            data.len()
        )));
    }
    let (disc, body) = data.split_at(ESCROW_STATE_DISCRIMINATOR.len());
    if disc != ESCROW_STATE_DISCRIMINATOR {
        return Err(ClientError::Decode(
            "account discriminator does not match an escrow record".into(),
        ));
    }

    // Accounts may carry trailing padding, so deserialize from a cursor
    // rather than requiring an exact-length slice.
    let mut cursor = body;
    let raw = RawEscrowState::deserialize(&mut cursor)
        .map_err(|e| ClientError::Decode(e.to_string()))?;

    let status = EscrowStatus::from_u8(raw.status)
        .ok_or_else(|| ClientError::Decode(format!("unknown status tag {}", raw.status)))?;

    Ok(EscrowContract {
        initializer: raw.initializer,
        worker: raw.worker,
        contract_id: ContractId::new(raw.contract_id),
        admin1: raw.admin1,
        admin2: raw.admin2,
        vault: raw.vault,
        usdc_mint: raw.usdc_mint,
        amount: raw.amount,
        fee_bps: raw.fee_bps,
        fee_wallet: raw.fee_wallet,
        status,
        employer_approved: raw.employer_approved,
        worker_approved: raw.worker_approved,
        admin1_voted: raw.admin1_voted,
        admin2_voted: raw.admin2_voted,
        votes_for_worker: raw.votes_for_worker,
        votes_for_employer: raw.votes_for_employer,
        finalized: raw.finalized,
        resolved_for_worker: raw.resolved_for_worker,
        bump: raw.bump,
        vault_bump: raw.vault_bump,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawEscrowState {
        RawEscrowState {
            initializer: [1; 32],
            worker: [2; 32],
            contract_id: [3; 32],
            admin1: [4; 32],
            admin2: [5; 32],
            vault: [6; 32],
            usdc_mint: [7; 32],
            amount: 250_500_000,
            fee_bps: 250,
            fee_wallet: [8; 32],
            status: 1,
            employer_approved: true,
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

    fn encode(raw: &RawEscrowState) -> Vec<u8> {
        let mut data = ESCROW_STATE_DISCRIMINATOR.to_vec();
        raw.serialize(&mut data).unwrap();
        data
    }

    #[test]
    fn decodes_full_record() {
        let contract = decode_escrow_state(&encode(&sample_raw())).unwrap();
        assert_eq!(contract.status, EscrowStatus::Accepted);
        assert_eq!(contract.amount, 250_500_000);
        assert_eq!(contract.fee_bps, 250);
        assert!(contract.employer_approved);
        assert_eq!(contract.resolved_for_worker, None);
        assert_eq!(contract.contract_id, ContractId::new([3; 32]));
    }

    #[test]
    fn tolerates_trailing_padding() {
        let mut data = encode(&sample_raw());
        data.extend_from_slice(&[0u8; 16]);
        assert!(decode_escrow_state(&data).is_ok());
    }

    #[test]
    fn rejects_wrong_discriminator() {
        let mut data = encode(&sample_raw());
        data[0] ^= 0xff;
        assert!(matches!(
            decode_escrow_state(&data),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn rejects_unknown_status_tag() {
        let mut raw = sample_raw();
        raw.status = 9;
        assert!(matches!(
            decode_escrow_state(&encode(&raw)),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn decodes_resolved_outcome() {
        let mut raw = sample_raw();
        raw.status = 3;
        raw.finalized = true;
        raw.resolved_for_worker = Some(true);
        let contract = decode_escrow_state(&encode(&raw)).unwrap();
        assert_eq!(contract.status, EscrowStatus::Released);
        assert_eq!(contract.resolved_for_worker, Some(true));
    }
}
