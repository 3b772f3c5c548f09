//! # ABI
//!
//! Descriptive metadata for callers. The VM never reads it: at runtime a
//! function is identified only by the first four bytes of call data.
//!
//! Selector = first 4 bytes of Keccak-256 over the canonical signature
//! `name(type1,type2,...)`.

use crate::compiler::ast::Type;
use crate::domain::services::{encode_call, keccak256};
use crate::domain::value_objects::{Bytes, Word};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Whether a function may read state, write state, or accept value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Reads neither storage nor the environment.
    Pure,
    /// Reads but never writes storage.
    View,
    /// May write storage; rejects calls carrying value.
    #[default]
    NonPayable,
    /// May write storage and accept value.
    Payable,
}

impl StateMutability {
    /// True for `view` and `pure`.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }
}

/// 4-byte function identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector of a canonical signature.
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&hash.as_bytes()[..4]);
        Self(out)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let raw = hex::decode(text.strip_prefix("0x").unwrap_or(&text))
            .map_err(serde::de::Error::custom)?;
        let bytes: [u8; 4] = raw
            .try_into()
            .map_err(|_| serde::de::Error::custom("selector must be 4 bytes"))?;
        Ok(Self(bytes))
    }
}

/// Named parameter or return value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    /// Parameter name; empty for return values.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub ty: Type,
}

/// One externally callable function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    /// Function name.
    pub name: String,
    /// Parameters in calldata order.
    pub inputs: Vec<AbiParam>,
    /// Zero or one return value.
    pub outputs: Vec<AbiParam>,
    /// Declared mutability.
    pub state_mutability: StateMutability,
    /// Dispatch selector.
    pub selector: Selector,
}

impl AbiEntry {
    /// `name(type1,type2,...)`.
    #[must_use]
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.ty.canonical()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// Call data invoking this function with word-encoded `args`.
    #[must_use]
    pub fn encode_call(&self, args: &[Word]) -> Bytes {
        encode_call(self.selector.bytes(), args)
    }
}

/// Finds an entry by function name.
#[must_use]
pub fn find<'a>(abi: &'a [AbiEntry], name: &str) -> Option<&'a AbiEntry> {
    abi.iter().find(|entry| entry.name == name)
}
