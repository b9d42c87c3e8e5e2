use async_trait::async_trait;
use log::debug;

use crate::{
    error::ProverError,
    structs::{CircuitInput, FieldElement, Groth16Proof},
};

#[async_trait]
pub trait Prover: Send + Sync {
    /// Proves `raw_email` against the circuit with the given named inputs.
    async fn prove(
        &self,
        raw_email: &str,
        inputs: &[CircuitInput],
    ) -> Result<Groth16Proof, ProverError>;
}

/// Returns a fixed placeholder proof.
///
/// Public signals echo the circuit input values so the output still shows
/// what would have been proven.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProver;

const PLACEHOLDER_A: [&str; 2] = [
    "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
    "0xfedcba0987654321fedcba0987654321fedcba0987654321fedcba0987654321",
];
const PLACEHOLDER_B: [[&str; 2]; 2] = [
    [
        "0xabcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890",
        "0x0987654321fedcba0987654321fedcba0987654321fedcba0987654321fedcba",
    ],
    [
        "0x5555555555555555555555555555555555555555555555555555555555555555",
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
    ],
];
const PLACEHOLDER_C: [&str; 2] = [
    "0x1111111111111111111111111111111111111111111111111111111111111111",
    "0x2222222222222222222222222222222222222222222222222222222222222222",
];

impl NullProver {
    pub fn placeholder(public_signals: Vec<FieldElement>) -> Groth16Proof {
        Groth16Proof {
            pi_a: PLACEHOLDER_A.map(FieldElement::new),
            pi_b: PLACEHOLDER_B.map(|row| row.map(FieldElement::new)),
            pi_c: PLACEHOLDER_C.map(FieldElement::new),
            public_signals,
        }
    }
}

#[async_trait]
impl Prover for NullProver {
    async fn prove(
        &self,
        _raw_email: &str,
        inputs: &[CircuitInput],
    ) -> Result<Groth16Proof, ProverError> {
        debug!("Null prover: returning placeholder proof");
        let signals = inputs
            .iter()
            .map(|input| FieldElement::new(input.value.clone()))
            .collect();
        Ok(Self::placeholder(signals))
    }
}
