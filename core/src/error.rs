use thiserror::Error;

/// Escrow domain errors.
#[derive(Debug, Error, PartialEq)]
pub enum EscrowError {
    #[error("identifier error: {0}")]
    Id(#[from] IdError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Attempted an operation the program would refuse for the current status.
    #[error("operation `{op}` not allowed while escrow is {status}")]
    InvalidTransition {
        op: &'static str,
        status: &'static str,
    },

    #[error("release requires approval from both parties")]
    ApprovalsMissing,

    #[error("dispute resolution requires a vote from both admins")]
    VotesMissing,

    #[error("this admin has already voted")]
    AlreadyVoted,

    #[error("signer is not an arbitration admin for this contract")]
    NotAnAdmin,

    #[error("escrow already finalized")]
    AlreadyFinalized,
}

/// Errors raised while validating a contract identifier.
///
/// A malformed identifier that slips through derivation silently produces a
/// valid but wrong address, so every entry point validates before deriving.
#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("contract id must be exactly 32 bytes, got {0}")]
    BadLength(usize),

    #[error("contract id byte {index} out of range: {value}")]
    ByteOutOfRange { index: usize, value: i64 },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("contract id missing")]
    Missing,
}

/// Local precondition failures. Never sent over the wire, never signed.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("amount must be strictly positive")]
    ZeroAmount,

    #[error("amount is not a valid decimal number: {0}")]
    MalformedAmount(String),

    #[error("amount overflows the mint base-unit domain (decimals={decimals})")]
    AmountOverflow { decimals: u8 },

    #[error("invalid decimals: {0}")]
    InvalidDecimals(u8),

    #[error("fee must be within [0, 10000] basis points, got {0}")]
    FeeOutOfRange(u32),

    #[error("insufficient balance: have {available} base units, need {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("source token account not found")]
    MissingSourceAccount,

    #[error("token account owner mismatch: expected {expected}, found {found}")]
    OwnerMismatch { expected: String, found: String },

    #[error("token account mint mismatch: expected {expected}, found {found}")]
    MintMismatch { expected: String, found: String },
}

/// Errors resolving operations against the program's declared schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("instruction not declared by the program schema: {0}")]
    UnknownInstruction(String),

    #[error("missing account `{account}` for instruction `{instruction}`")]
    MissingAccount {
        instruction: String,
        account: String,
    },

    #[error("malformed schema document: {0}")]
    Malformed(String),
}
