use thiserror::Error;

/// Header extraction failures. Always per-email: the email is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing {header} header")]
    MissingHeader { header: &'static str },

    #[error("cannot parse d=/s= from DKIM-Signature")]
    MalformedDkim,
}

/// DKIM key resolution failures. These degrade the public-key hash to the
/// sentinel, they never skip the email.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("no p= tag in DKIM TXT record")]
    MissingPublicKey,

    #[error("invalid base64 in p= tag: {0}")]
    InvalidBase64(String),
}

/// Groth16 wire encoding failures. Fatal for the affected proof only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("field element {field} does not fit in 32 bytes: {value}")]
    EncodingOverflow { field: String, value: String },

    #[error("field element {field} is not an unsigned integer: {value:?}")]
    InvalidFieldElement { field: String, value: String },

    #[error("encoded proof must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Failures reported by a [`Prover`](crate::prover::Prover) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    #[error("prover network error: {0}")]
    Network(String),

    #[error("prover rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed prover response: {0}")]
    MalformedResponse(String),
}

/// Reasons an email is skipped by the assembler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("no From address found")]
    MissingSender,

    #[error(transparent)]
    Dkim(#[from] ParseError),

    #[error("sender {0} is not a registered guardian")]
    UnknownGuardian(String),

    #[error(transparent)]
    Prover(#[from] ProverError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
