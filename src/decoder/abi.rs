/// ABI parameter decoding for custom error payloads
///
/// The registry describes parameters with `AbiType` tags; the words are read
/// through alloy-sol-types' decoder so head/tail offsets and padding rules
/// follow the ABI exactly.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::abi::{Decoder, Token};
use alloy_sol_types::{sol_data, SolType};
use std::fmt;
use thiserror::Error;

const WORD: usize = 32;

/// ABI primitive type tag used in error signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    Address,
    Bool,
    Uint8,
    Uint256,
    Bytes32,
    String,
}

impl AbiType {
    /// Canonical name used when building a signature string
    pub fn canonical(self) -> &'static str {
        match self {
            AbiType::Address => sol_data::Address::SOL_NAME,
            AbiType::Bool => sol_data::Bool::SOL_NAME,
            AbiType::Uint8 => sol_data::Uint::<8>::SOL_NAME,
            AbiType::Uint256 => sol_data::Uint::<256>::SOL_NAME,
            AbiType::Bytes32 => sol_data::FixedBytes::<32>::SOL_NAME,
            AbiType::String => sol_data::String::SOL_NAME,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// A decoded parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Bytes32(B256),
    String(String),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Small integer view, used for enum-style codes
    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(u256_to_u64)
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Address(a) => write!(f, "{}", a),
            AbiValue::Bool(b) => write!(f, "{}", b),
            AbiValue::Uint(v) => write!(f, "{}", v),
            AbiValue::Bytes32(b) => write!(f, "{}", hex::encode(b)),
            AbiValue::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Error)]
pub enum AbiDecodeError {
    #[error("expected at least {expected} bytes of parameter data, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("parameter {index} is not a valid {ty}")]
    InvalidValue { index: usize, ty: AbiType },
    #[error("parameter {index} ({ty}): {source}")]
    Malformed {
        index: usize,
        ty: AbiType,
        #[source]
        source: alloy_sol_types::Error,
    },
}

/// Narrow a 256-bit integer to u64, if it fits
pub fn u256_to_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Decode `data` (the bytes after the selector) as a tuple of `types`
pub fn decode_params(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, AbiDecodeError> {
    let head_len = types.len() * WORD;
    if data.len() < head_len {
        return Err(AbiDecodeError::TooShort { expected: head_len, actual: data.len() });
    }

    let mut decoder = Decoder::new(data, true);
    types
        .iter()
        .enumerate()
        .map(|(index, ty)| {
            let value = match ty {
                AbiType::Address => AbiValue::Address(next::<sol_data::Address>(&mut decoder, index, *ty)?),
                AbiType::Bool => AbiValue::Bool(next::<sol_data::Bool>(&mut decoder, index, *ty)?),
                AbiType::Uint8 => AbiValue::Uint(U256::from(next::<sol_data::Uint<8>>(&mut decoder, index, *ty)?)),
                AbiType::Uint256 => AbiValue::Uint(next::<sol_data::Uint<256>>(&mut decoder, index, *ty)?),
                AbiType::Bytes32 => AbiValue::Bytes32(next::<sol_data::FixedBytes<32>>(&mut decoder, index, *ty)?),
                AbiType::String => AbiValue::String(next::<sol_data::String>(&mut decoder, index, *ty)?),
            };
            Ok(value)
        })
        .collect()
}

/// Read the next head slot as `T`, following the tail offset for dynamic types
fn next<'de, T: SolType>(
    decoder: &mut Decoder<'de>,
    index: usize,
    ty: AbiType,
) -> Result<T::RustType, AbiDecodeError> {
    let token = <T::Token<'de> as Token<'de>>::decode_from(decoder)
        .map_err(|source| AbiDecodeError::Malformed { index, ty, source })?;
    if !T::valid_token(&token) {
        return Err(AbiDecodeError::InvalidValue { index, ty });
    }
    Ok(T::detokenize(token))
}
