//! 32-byte contract identifier.
//!
//! The identifier seeds both derived addresses, so its shape is validated
//! strictly at construction; a `ContractId` value is valid by definition.

use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Uniquely identifies a contract between one initializer/worker pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId([u8; 32]);

impl ContractId {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Validates an arbitrary byte slice as an identifier.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| IdError::BadLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Validates a JSON-style array of integers, each in [0, 255].
    pub fn from_ints(values: &[i64]) -> Result<Self, IdError> {
        if values.len() != Self::LEN {
            return Err(IdError::BadLength(values.len()));
        }
        let mut bytes = [0u8; Self::LEN];
        for (index, &value) in values.iter().enumerate() {
            bytes[index] = u8::try_from(value)
                .map_err(|_| IdError::ByteOutOfRange { index, value })?;
        }
        Ok(Self(bytes))
    }

    /// Parses the backend's 64-character hex encoding.
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Missing);
        }
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractId({})", self.to_hex())
    }
}

impl std::str::FromStr for ContractId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContractId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContractId> for String {
    fn from(value: ContractId) -> Self {
        value.to_hex()
    }
}
