//! BN254 scalar field helpers.
//!
//! Keys, values, and digests are opaque scalars of the BN254 curve's scalar
//! field. Records never interpret them numerically beyond ordering; the
//! helpers here move them across the byte and text boundaries, rejecting
//! non-canonical encodings unless the caller explicitly asks for reduction.

use ark_ff::{BigInteger as _, PrimeField as _};
use num_bigint::BigUint;
use serde_with::hex::Hex;
use thiserror::Error;

/// The scalar field element type used throughout the workspace.
pub use ark_bn254::Fr;

/// Serialized width of a field element in bytes.
pub const FIELD_SIZE: usize = 32;

/// Errors produced when decoding field elements from bytes or text.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FieldError {
    /// The encoding names an integer at or above the field modulus.
    #[error("value is not a canonical BN254 scalar")]
    NonCanonical,

    /// The text is not an unsigned decimal integer.
    #[error("'{0}' is not a decimal field element")]
    BadDecimal(String),
}

/// Decode a big-endian 32-byte encoding into a field element, rejecting any
/// value at or above the modulus.
///
/// # Errors
/// Returns [`FieldError::NonCanonical`] if the bytes name an integer `>= p`.
pub fn field_from_be_bytes(bytes: &[u8; FIELD_SIZE]) -> Result<Fr, FieldError> {
    let repr = <Fr as ark_ff::PrimeField>::BigInt::try_from(BigUint::from_bytes_be(bytes))
        .map_err(|_| FieldError::NonCanonical)?;
    Fr::from_bigint(repr).ok_or(FieldError::NonCanonical)
}

/// Decode a big-endian 32-byte encoding into a field element, reducing
/// out-of-range values modulo `p` instead of rejecting them.
///
/// Prefer [`field_from_be_bytes`]; this variant exists for callers that opt
/// out of truncation failures.
#[must_use]
pub fn field_from_be_bytes_reduced(bytes: &[u8; FIELD_SIZE]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Parse an unsigned decimal string into a field element, rejecting any
/// value at or above the modulus.
///
/// # Errors
/// Returns [`FieldError::BadDecimal`] for non-decimal text and
/// [`FieldError::NonCanonical`] for in-format but out-of-range values.
pub fn field_from_decimal(text: &str) -> Result<Fr, FieldError> {
    let digits = text
        .parse::<BigUint>()
        .map_err(|_| FieldError::BadDecimal(text.to_owned()))?;
    let repr = <Fr as ark_ff::PrimeField>::BigInt::try_from(digits)
        .map_err(|_| FieldError::NonCanonical)?;
    Fr::from_bigint(repr).ok_or(FieldError::NonCanonical)
}

/// Encode a field element as its canonical big-endian 32-byte form.
#[must_use]
pub fn field_to_be_bytes(value: &Fr) -> [u8; FIELD_SIZE] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0_u8; FIELD_SIZE];
    let start = out.len().saturating_sub(bytes.len());
    if let Some(tail) = out.get_mut(start..) {
        tail.copy_from_slice(&bytes);
    }
    out
}

/// A `serde_as` adapter encoding field elements as big-endian 32-byte hex.
///
/// Deserialization is strict: non-canonical encodings are rejected.
pub struct FieldHex;

impl serde_with::SerializeAs<Fr> for FieldHex {
    fn serialize_as<S>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let bytes = field_to_be_bytes(value);
        <Hex as serde_with::SerializeAs<[u8; FIELD_SIZE]>>::serialize_as(&bytes, serializer)
    }
}

impl<'de> serde_with::DeserializeAs<'de, Fr> for FieldHex {
    fn deserialize_as<D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: [u8; FIELD_SIZE] =
            <Hex as serde_with::DeserializeAs<'de, [u8; FIELD_SIZE]>>::deserialize_as(
                deserializer,
            )?;
        field_from_be_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}
