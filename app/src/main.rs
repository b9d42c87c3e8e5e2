use std::{
    net::IpAddr,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{
    filter::{Builder as FilterBuilder, LevelFilter},
    EnvFilter,
};
use guardian_email_core::{
    dkim::resolve_for, AssemblySettings, NullProver, NullifierScheme, ProofAssembler, Prover,
};
use guardian_email_helpers::{
    config::{
        self, ADDRESSES_FILE, GUARDIANS_FILE, GUARDIAN_SALTS_FILE, SALTS_FILE, TEMPLATES_FILE,
    },
    ensure_configuration, list_email_files, load_emails, prover::DEFAULT_BLUEPRINT,
    read_email_file, write_json_pretty, DnsTxtLookup, RemoteProver,
};
use url::Url;

/// Output of `build-proofs`, relative to the configuration directory.
const EMAIL_PROOFS_FILE: &str = "EmailProofs.json";

/// Arguments of the guardian proof CLI.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding salts, guardians, addresses and templates.
    #[clap(long, env = "GUARDIAN_CONFIG_DIR", default_value = "script/data")]
    config_dir: PathBuf,
    /// Name server queried for DKIM keys instead of the system resolver.
    #[clap(long, env = "DKIM_NAMESERVER")]
    nameserver: Option<IpAddr>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default salts and templates if they are missing.
    EnsureConfig,
    /// Email-keyed records without proofs.
    BuildProofs {
        #[clap(flatten)]
        deployment: Deployment,
        /// Output file; defaults to EmailProofs.json in the config directory.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// One proof package per guardian authenticator.
    AuthMsgs {
        #[clap(flatten)]
        deployment: Deployment,
        /// Directory receiving `<authenticator>.json` files.
        #[clap(long, env = "PROOF_DIR", default_value = "script/data/proofs")]
        proof_dir: PathBuf,
        /// Proving service endpoint. Without it, placeholder proofs are produced.
        #[clap(long, env = "PROVER_URL")]
        prover_url: Option<Url>,
        #[clap(long, env = "PROVER_BLUEPRINT", default_value = DEFAULT_BLUEPRINT)]
        blueprint: String,
        #[clap(long, env = "ZKE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Print the public key hash of one email's DKIM signer.
    PubkeyHash { email: PathBuf },
}

#[derive(ClapArgs, Debug)]
struct Deployment {
    /// Directory scanned for `.eml` files.
    #[clap(short, long, env = "EMAIL_DIR", default_value = "emails")]
    email_dir: PathBuf,
    /// Wallet whose recovery the guardians approve.
    #[clap(short, long, env = "ACCOUNT_ADDRESS")]
    account: Address,
    #[clap(long, env = "TEMPLATE_INDEX", default_value_t = 0)]
    template_index: u32,
    #[clap(long, env = "NULLIFIER_SCHEME", default_value_t = NullifierScheme::MessageId)]
    nullifier_scheme: NullifierScheme,
}

impl Deployment {
    fn settings(&self, config_dir: &Path) -> AssemblySettings {
        let mut settings = AssemblySettings::new(self.account);
        settings.nullifier_scheme = self.nullifier_scheme;
        settings.addresses = config::load_addresses(&config_dir.join(ADDRESSES_FILE));

        let templates = config::load_templates(&config_dir.join(TEMPLATES_FILE));
        match templates.get(&self.template_index.to_string()) {
            Some(template) => {
                settings.template_index = self.template_index;
                settings.template = template.clone();
            }
            None => tracing::warn!(
                "Template {} not configured, using the acceptance template",
                self.template_index
            ),
        }
        settings
    }
}

/// `RUST_LOG` directives on top of an `info` default, so skips and
/// degradations are reported without any configuration.
fn log_filter() -> FilterBuilder {
    EnvFilter::builder().with_default_directive(LevelFilter::INFO.into())
}

fn dns_lookup(nameserver: Option<IpAddr>) -> Result<DnsTxtLookup> {
    match nameserver {
        Some(ip) => Ok(DnsTxtLookup::with_nameserver(ip)),
        None => DnsTxtLookup::from_system_conf().context("failed to read resolver configuration"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter().from_env_lossy())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }
    let args = Args::parse();

    match args.command {
        Command::EnsureConfig => {
            let created = ensure_configuration(&args.config_dir)?;
            tracing::info!("{} configuration file(s) created", created.len());
        }

        Command::BuildProofs { deployment, output } => {
            let files = list_email_files(&deployment.email_dir)?;
            let lookup = dns_lookup(args.nameserver)?;
            let salts = config::load_email_salts(&args.config_dir.join(GUARDIAN_SALTS_FILE));
            let assembler = ProofAssembler::new(
                &lookup,
                &NullProver,
                deployment.settings(&args.config_dir),
            );

            let total = files.len();
            let proofs = assembler.collect_email_proofs(load_emails(files), &salts).await;

            let output = output.unwrap_or_else(|| args.config_dir.join(EMAIL_PROOFS_FILE));
            write_json_pretty(&output, &proofs)?;
            tracing::info!(
                "Processed {} email(s), {} record(s) written to {}",
                total,
                proofs.len(),
                output.display()
            );
        }

        Command::AuthMsgs {
            deployment,
            proof_dir,
            prover_url,
            blueprint,
            api_key,
        } => {
            let files = list_email_files(&deployment.email_dir)?;
            let lookup = dns_lookup(args.nameserver)?;
            let prover: Box<dyn Prover> = match prover_url {
                Some(url) => {
                    tracing::info!("Proving with {} ({})", url, blueprint);
                    Box::new(RemoteProver::new(url, blueprint, api_key))
                }
                None => {
                    tracing::warn!("No prover URL configured, producing placeholder proofs");
                    Box::new(NullProver)
                }
            };

            let registry = config::load_guardians(&args.config_dir.join(GUARDIANS_FILE));
            let salts = config::load_authenticator_salts(&args.config_dir.join(SALTS_FILE));
            let assembler = ProofAssembler::new(
                &lookup,
                prover.as_ref(),
                deployment.settings(&args.config_dir),
            );

            let total = files.len();
            let packages = assembler
                .collect_auth_packages(load_emails(files), &registry, &salts)
                .await;

            for (authenticator, package) in packages.iter() {
                let path = proof_dir.join(format!("{authenticator}.json"));
                write_json_pretty(&path, package)?;
                tracing::info!("✓ {} -> {}", package.metadata.email, path.display());
            }
            tracing::info!(
                "Processed {} email(s), {} proof package(s) written",
                total,
                packages.len()
            );
        }

        Command::PubkeyHash { email } => {
            let raw = read_email_file(&email)?;
            let dkim = raw
                .dkim_metadata()
                .with_context(|| format!("{} has no usable DKIM signature", email.display()))?;
            let lookup = dns_lookup(args.nameserver)?;
            let hash = resolve_for(&lookup, &dkim).await;
            println!("{hash}");
        }
    }

    Ok(())
}
