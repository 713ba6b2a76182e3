use paylance_core::error::{EscrowError, IdError, SchemaError, ValidationError};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("no compatible wallet provider detected")]
    ProviderNotFound,
    #[error("wallet connection rejected")]
    ConnectionRejected,
    #[error("signature request rejected")]
    SignatureRejected,
    #[error("wallet does not support message signing")]
    SignatureUnsupported,
    #[error("a wallet request is already pending; resolve it before retrying")]
    RequestAlreadyPending,
    #[error("wallet provider error: {0}")]
    Provider(String),
    #[error("connected wallet {connected} differs from session wallet {session}")]
    WalletMismatch { connected: String, session: String },
    #[error("an account already exists for this wallet")]
    AccountExists,
    #[error("no account exists for this wallet")]
    AccountNotFound,
    #[error("verify response carried no session token")]
    TokenMissing,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("session expired")]
    SessionExpired,
    #[error("chain mismatch: {0}")]
    ChainMismatch(String),
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowError),
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("keypair error: {0}")]
    Keypair(String),
    #[error("address parse error: {0}")]
    AddressParse(#[from] solana_sdk::pubkey::ParsePubkeyError),
    #[error("on-chain submission failed: {message}")]
    Submission { message: String, logs: Vec<String> },
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("account not found on chain: {0}")]
    AccountMissing(String),
    #[error("account data decode error: {0}")]
    Decode(String),
    #[error("instruction encoding error: {0}")]
    Encode(String),
    #[error("settings error: {0}")]
    Settings(String),
}

impl From<IdError> for ClientError {
    fn from(err: IdError) -> Self {
        Self::Escrow(err.into())
    }
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        Self::Escrow(err.into())
    }
}

impl From<SchemaError> for ClientError {
    fn from(err: SchemaError) -> Self {
        Self::Escrow(err.into())
    }
}

// Preflight failures carry the program log lines; losing those makes
// instruction/account mismatches nearly impossible to diagnose.
impl From<solana_client::client_error::ClientError> for ClientError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        use solana_client::client_error::ClientErrorKind;
        use solana_client::rpc_request::{RpcError, RpcResponseErrorData};

        if let ClientErrorKind::RpcError(RpcError::RpcResponseError { message, data, .. }) =
            err.kind()
        {
            if let RpcResponseErrorData::SendTransactionPreflightFailure(sim) = data {
                return Self::Submission {
                    message: message.clone(),
                    logs: sim.logs.clone().unwrap_or_default(),
                };
            }
        }
        Self::Rpc(err.to_string())
    }
}
