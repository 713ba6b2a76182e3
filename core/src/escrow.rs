//! Escrow lifecycle state machine.
//!
//! The on-chain program is the authority on every transition; these checks
//! exist so the client never dispatches an instruction the program is
//! guaranteed to refuse, which would waste a signature and a round trip.

use crate::contract_id::ContractId;
use crate::error::EscrowError;
use crate::Result;

/// Lifecycle of an escrow account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    Initialized,
    Accepted,
    Dispute,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Initialized),
            1 => Some(Self::Accepted),
            2 => Some(Self::Dispute),
            3 => Some(Self::Released),
            4 => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Released and Refunded accept no further state-mutating instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "Initialized",
            Self::Accepted => "Accepted",
            Self::Dispute => "Dispute",
            Self::Released => "Released",
            Self::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escrow lifecycle operations the client can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowOp {
    InitializeEscrow,
    WorkerAccept,
    EmployerApproveCompletion,
    WorkerApproveCompletion,
    OpenDispute,
    AdminVote,
    ReleaseIfBothApproved,
    ReleaseToWorker,
    RefundToEmployer,
}

impl EscrowOp {
    /// Name as declared by the program schema.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializeEscrow => "initializeEscrow",
            Self::WorkerAccept => "workerAccept",
            Self::EmployerApproveCompletion => "employerApproveCompletion",
            Self::WorkerApproveCompletion => "workerApproveCompletion",
            Self::OpenDispute => "openDispute",
            Self::AdminVote => "adminVote",
            Self::ReleaseIfBothApproved => "releaseIfBothApproved",
            Self::ReleaseToWorker => "releaseToWorker",
            Self::RefundToEmployer => "refundToEmployer",
        }
    }
}

/// Client-side mirror of the on-chain escrow record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowContract {
    pub initializer: [u8; 32],
    pub worker: [u8; 32],
    pub contract_id: ContractId,
    pub admin1: [u8; 32],
    pub admin2: [u8; 32],
    pub vault: [u8; 32],
    pub usdc_mint: [u8; 32],
    pub amount: u64,
    pub fee_bps: u16,
    pub fee_wallet: [u8; 32],
    pub status: EscrowStatus,
    pub employer_approved: bool,
    pub worker_approved: bool,
    pub admin1_voted: bool,
    pub admin2_voted: bool,
    pub votes_for_worker: u8,
    pub votes_for_employer: u8,
    pub finalized: bool,
    pub resolved_for_worker: Option<bool>,
    pub bump: u8,
    pub vault_bump: u8,
}

impl EscrowContract {
    fn invalid(&self, op: EscrowOp) -> EscrowError {
        EscrowError::InvalidTransition {
            op: op.name(),
            status: self.status.as_str(),
        }
    }

    /// Rejects operations the program would refuse for the current status.
    ///
    /// Caller-specific checks (admin voting) live in
    /// [`ensure_vote_allowed`](Self::ensure_vote_allowed).
    pub fn ensure_allowed(&self, op: EscrowOp) -> Result<()> {
        use EscrowOp::*;

        if self.finalized || self.status.is_terminal() {
            return Err(EscrowError::AlreadyFinalized);
        }

        match op {
            // The account already exists; initialization happens exactly once.
            InitializeEscrow => Err(self.invalid(op)),

            WorkerAccept => match self.status {
                EscrowStatus::Initialized => Ok(()),
                _ => Err(self.invalid(op)),
            },

            EmployerApproveCompletion | WorkerApproveCompletion => match self.status {
                EscrowStatus::Accepted => Ok(()),
                _ => Err(self.invalid(op)),
            },

            ReleaseIfBothApproved => match self.status {
                EscrowStatus::Accepted if self.employer_approved && self.worker_approved => Ok(()),
                EscrowStatus::Accepted => Err(EscrowError::ApprovalsMissing),
                _ => Err(self.invalid(op)),
            },

            OpenDispute => match self.status {
                EscrowStatus::Initialized | EscrowStatus::Accepted => Ok(()),
                _ => Err(self.invalid(op)),
            },

            AdminVote => match self.status {
                EscrowStatus::Dispute => Ok(()),
                _ => Err(self.invalid(op)),
            },

            ReleaseToWorker | RefundToEmployer => match self.status {
                EscrowStatus::Dispute if self.admin1_voted && self.admin2_voted => Ok(()),
                EscrowStatus::Dispute => Err(EscrowError::VotesMissing),
                _ => Err(self.invalid(op)),
            },
        }
    }

    /// Each admin votes at most once, and only while disputed.
    pub fn ensure_vote_allowed(&self, admin: &[u8; 32]) -> Result<()> {
        self.ensure_allowed(EscrowOp::AdminVote)?;
        if admin == &self.admin1 {
            if self.admin1_voted {
                return Err(EscrowError::AlreadyVoted);
            }
            Ok(())
        } else if admin == &self.admin2 {
            if self.admin2_voted {
                return Err(EscrowError::AlreadyVoted);
            }
            Ok(())
        } else {
            Err(EscrowError::NotAnAdmin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(status: EscrowStatus) -> EscrowContract {
        EscrowContract {
            initializer: [1; 32],
            worker: [2; 32],
            contract_id: ContractId::new([3; 32]),
            admin1: [4; 32],
            admin2: [5; 32],
            vault: [6; 32],
            usdc_mint: [7; 32],
            amount: 1_000_000,
            fee_bps: 250,
            fee_wallet: [8; 32],
            status,
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
    fn accept_only_from_initialized() {
        assert!(contract(EscrowStatus::Initialized)
            .ensure_allowed(EscrowOp::WorkerAccept)
            .is_ok());
        assert!(contract(EscrowStatus::Accepted)
            .ensure_allowed(EscrowOp::WorkerAccept)
            .is_err());
    }

    #[test]
    fn release_needs_both_approvals() {
        let mut c = contract(EscrowStatus::Accepted);
        assert_eq!(
            c.ensure_allowed(EscrowOp::ReleaseIfBothApproved),
            Err(EscrowError::ApprovalsMissing)
        );
        c.employer_approved = true;
        c.worker_approved = true;
        assert!(c.ensure_allowed(EscrowOp::ReleaseIfBothApproved).is_ok());
    }

    #[test]
    fn dispute_blocks_normal_path() {
        let c = contract(EscrowStatus::Dispute);
        for op in [
            EscrowOp::WorkerAccept,
            EscrowOp::EmployerApproveCompletion,
            EscrowOp::WorkerApproveCompletion,
            EscrowOp::ReleaseIfBothApproved,
            EscrowOp::OpenDispute,
        ] {
            assert!(c.ensure_allowed(op).is_err(), "{:?} allowed in Dispute", op);
        }
        assert!(c.ensure_allowed(EscrowOp::AdminVote).is_ok());
    }

    #[test]
    fn resolution_needs_both_votes() {
        let mut c = contract(EscrowStatus::Dispute);
        assert_eq!(
            c.ensure_allowed(EscrowOp::ReleaseToWorker),
            Err(EscrowError::VotesMissing)
        );
        c.admin1_voted = true;
        c.admin2_voted = true;
        assert!(c.ensure_allowed(EscrowOp::ReleaseToWorker).is_ok());
        assert!(c.ensure_allowed(EscrowOp::RefundToEmployer).is_ok());
    }

    #[test]
    fn terminal_states_reject_everything() {
        for status in [EscrowStatus::Released, EscrowStatus::Refunded] {
            let c = contract(status);
            for op in [
                EscrowOp::WorkerAccept,
                EscrowOp::OpenDispute,
                EscrowOp::AdminVote,
                EscrowOp::ReleaseIfBothApproved,
            ] {
                assert_eq!(c.ensure_allowed(op), Err(EscrowError::AlreadyFinalized));
            }
        }
    }

    #[test]
    fn admin_votes_once() {
        let mut c = contract(EscrowStatus::Dispute);
        assert!(c.ensure_vote_allowed(&[4; 32]).is_ok());
        c.admin1_voted = true;
        assert_eq!(c.ensure_vote_allowed(&[4; 32]), Err(EscrowError::AlreadyVoted));
        assert!(c.ensure_vote_allowed(&[5; 32]).is_ok());
        assert_eq!(c.ensure_vote_allowed(&[9; 32]), Err(EscrowError::NotAnAdmin));
    }
}
