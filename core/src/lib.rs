//! Domain model for the Paylance escrow marketplace client.
//!
//! Everything in this crate is pure: identifier validation, amount
//! arithmetic, the escrow state machine, and the instruction-schema
//! document. Chain and network concerns live in `paylance-client`.

/// Exact decimal-to-base-unit conversion and fee validation
pub mod amount;
/// 32-byte contract identifier with strict shape validation
pub mod contract_id;
/// Escrow lifecycle state machine and on-chain record mirror
pub mod escrow;
/// Declared instruction schema of the deployed escrow program
pub mod schema;

pub mod error;
use error::EscrowError;

pub use contract_id::ContractId;
pub use escrow::{EscrowContract, EscrowOp, EscrowStatus};
pub use schema::ProgramSchema;

pub type Result<T> = std::result::Result<T, EscrowError>;
