//! Program interface schema.
//!
//! Account ordering and instruction discriminators come from the deployed
//! program's IDL rather than hand-maintained tables, so a program upgrade
//! only requires swapping the JSON. Both IDL dialects in circulation are
//! accepted: the older one names fields `isMut`/`isSigner`, the newer one
//! `writable`/`signer` with snake_case instruction names.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::SchemaError;

/// Anchor instruction discriminators are the first 8 bytes of
/// `sha256("global:<name>")` over the snake_case name.
pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSchema {
    #[serde(default)]
    pub address: Option<String>,
    pub instructions: Vec<InstructionDef>,
    #[serde(default)]
    pub accounts: Vec<AccountDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructionDef {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<Vec<u8>>,
    pub accounts: Vec<AccountRole>,
    #[serde(default)]
    pub args: Vec<ArgDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRole {
    pub name: String,
    #[serde(default, alias = "isMut")]
    pub writable: bool,
    #[serde(default, alias = "isSigner")]
    pub signer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: serde_json::Value,
}

/// Named account type declared by the program (state layouts).
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDef {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<Vec<u8>>,
}

impl ProgramSchema {
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(raw).map_err(|e| SchemaError::Malformed(e.to_string()))
    }

    /// Looks up an instruction by either naming convention.
    pub fn instruction(&self, name: &str) -> Result<&InstructionDef, SchemaError> {
        let snake = to_snake_case(name);
        self.instructions
            .iter()
            .find(|ix| ix.name == name || to_snake_case(&ix.name) == snake)
            .ok_or_else(|| SchemaError::UnknownInstruction(name.to_string()))
    }
}

impl InstructionDef {
    /// Declared discriminator, or the Anchor default derived from the name.
    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LEN] {
        if let Some(declared) = &self.discriminator {
            if declared.len() == DISCRIMINATOR_LEN {
                let mut out = [0u8; DISCRIMINATOR_LEN];
                out.copy_from_slice(declared);
                return out;
            }
        }
        default_discriminator(&self.name)
    }
}

/// `sha256("global:<snake_case_name>")[..8]`.
pub fn default_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let preimage = format!("global:{}", to_snake_case(name));
    let digest = Sha256::digest(preimage.as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
