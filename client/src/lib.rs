//! Paylance escrow client.
//!
//! Wires a wallet provider, the marketplace backend, and the deployed
//! escrow program into the two workflows that matter: challenge/response
//! wallet authentication and the escrow contract lifecycle
//! (initialize, accept, approve, release, dispute, vote, refund).

pub mod auth;
pub mod backend;
pub mod builder;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod pda;
pub mod state;
pub mod submit;
pub mod wallet;

pub use auth::{AuthMode, AuthProtocol};
pub use builder::EscrowTransactionBuilder;
pub use config::{ClientSettings, WalletConfig};
pub use context::{AppContext, AuthSession};
pub use error::{ClientError, Result};
pub use submit::ContractSubmissionOrchestrator;
pub use wallet::{ConnectMode, WalletBridge};
