pub mod assembler;
pub mod digest;
pub mod dkim;
pub mod encoding;
pub mod error;
pub mod guardian;
pub mod header;
pub mod prover;
pub mod structs;
pub mod template;

pub use assembler::{AssemblySettings, ProofAssembler, ProofSet};
pub use digest::{
    compute_nullifier, compute_nullifier_alt, compute_template_id, hash, NullifierScheme,
};
pub use dkim::{resolve_public_key_hash, TxtLookup, TxtRecord};
pub use encoding::{decode_groth16, encode_groth16};
pub use error::{AssemblyError, EncodingError, ParseError, ProverError, ResolveError};
pub use guardian::{AddressBook, GuardianRegistry, SaltStore};
pub use header::{
    extract_arc_timestamp, extract_command, extract_dkim_metadata, extract_sender, unfold,
    RawEmail,
};
pub use prover::{NullProver, Prover};
pub use structs::{
    AuthenticatorAddress, CircuitInput, DkimMetadata, EmailAuthMsg, EmailIdentity, EmailProof,
    FieldElement, Groth16Proof, GuardianSalt, HexDigest, ProofMetadata, ProofPackage,
    PublicKeyHash, SENTINEL,
};
pub use template::{CommandTemplate, TemplateBook};
