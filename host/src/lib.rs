pub mod config;
pub mod dns;
pub mod prover;
pub mod utils;

pub use config::{ensure_configuration, ConfigError};
pub use dns::DnsTxtLookup;
pub use prover::RemoteProver;
pub use utils::{list_email_files, load_emails, read_email_file, write_json_pretty};
