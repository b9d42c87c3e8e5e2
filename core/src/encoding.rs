//! Groth16 proof wire format for the on-chain verifier.
//!
//! Layout: `a0 a1 b00 b01 b10 b11 c0 c1`, each a 32-byte big-endian
//! unsigned integer, 256 bytes in total.

use alloy_primitives::{Bytes, U256};

use crate::{
    error::EncodingError,
    structs::{FieldElement, Groth16Proof},
};

/// Width of one encoded field element.
pub const WORD_SIZE: usize = 32;

/// Length of an encoded proof.
pub const ENCODED_PROOF_SIZE: usize = 8 * WORD_SIZE;

/// Decoded proof points: `(pi_a, pi_b, pi_c)`.
pub type ProofPoints = ([U256; 2], [[U256; 2]; 2], [U256; 2]);

/// Parses a decimal or `0x`-hex field element into 256 bits.
pub fn parse_field_element(field: &str, element: &FieldElement) -> Result<U256, EncodingError> {
    let raw = element.as_str().trim();
    let invalid = || EncodingError::InvalidFieldElement {
        field: field.to_string(),
        value: element.as_str().to_string(),
    };
    let overflow = || EncodingError::EncodingOverflow {
        field: field.to_string(),
        value: element.as_str().to_string(),
    };

    let (digits, radix) = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (raw, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    if radix == 16 && digits.trim_start_matches('0').len() > 2 * WORD_SIZE {
        return Err(overflow());
    }
    U256::from_str_radix(digits, radix as u64).map_err(|_| overflow())
}

/// Serializes `proof` into the fixed 256-byte layout.
///
/// Public signals are not part of the encoding.
pub fn encode_groth16(proof: &Groth16Proof) -> Result<Bytes, EncodingError> {
    let elements = [
        ("pi_a[0]", &proof.pi_a[0]),
        ("pi_a[1]", &proof.pi_a[1]),
        ("pi_b[0][0]", &proof.pi_b[0][0]),
        ("pi_b[0][1]", &proof.pi_b[0][1]),
        ("pi_b[1][0]", &proof.pi_b[1][0]),
        ("pi_b[1][1]", &proof.pi_b[1][1]),
        ("pi_c[0]", &proof.pi_c[0]),
        ("pi_c[1]", &proof.pi_c[1]),
    ];

    let mut out = Vec::with_capacity(ENCODED_PROOF_SIZE);
    for (field, element) in elements {
        let value = parse_field_element(field, element)?;
        out.extend_from_slice(&value.to_be_bytes::<WORD_SIZE>());
    }
    Ok(out.into())
}

/// Inverse of [`encode_groth16`].
pub fn decode_groth16(encoded: &[u8]) -> Result<ProofPoints, EncodingError> {
    if encoded.len() != ENCODED_PROOF_SIZE {
        return Err(EncodingError::InvalidLength {
            expected: ENCODED_PROOF_SIZE,
            actual: encoded.len(),
        });
    }
    let word = |i: usize| U256::from_be_slice(&encoded[i * WORD_SIZE..(i + 1) * WORD_SIZE]);
    Ok((
        [word(0), word(1)],
        [[word(2), word(3)], [word(4), word(5)]],
        [word(6), word(7)],
    ))
}
