use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use estca_client::enroll::EnrollmentRequest;
use estca_client::{CaClient, ClientConfig, Credentials, Endpoint};
use estca_types::{CertAttributes, Curve, EnrollmentProfile, SignatureAlgorithm};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "estca")]
#[command(about = "Admin and enrollment client for a PSK-authenticated CA")]
#[command(version)]
struct Cli {
    /// CA host (overrides server.host)
    #[arg(long, global = true)]
    host: Option<String>,

    /// CA port (overrides server.port)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// PSK identity to authenticate as
    #[arg(long, short, global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a CA (admin)
    Fingerprint {
        #[arg(long)]
        ca_name: String,
    },
    /// Create an enrollment profile for an end entity (admin)
    CreateProfile {
        #[arg(long)]
        enrollment_id: String,
        #[arg(long)]
        profile: String,
        #[arg(long)]
        ca_name: String,
        #[arg(long, default_value = "client")]
        role: String,
    },
    /// Fetch the CA certificate chain
    CaCert {
        /// Write the chain here instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Generate a key and enroll it with the CA
    Enroll {
        #[arg(long)]
        common_name: String,
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        organizational_unit: Option<String>,
        #[arg(long)]
        locality: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long = "dns")]
        dns_names: Vec<String>,
        #[arg(long = "ip")]
        ip_addresses: Vec<String>,
        #[arg(long = "email")]
        emails: Vec<String>,
        /// p256, p384 or p521 (overrides enrollment.curve)
        #[arg(long)]
        curve: Option<Curve>,
        /// ecdsa-sha256 etc. (overrides enrollment.signature_algorithm)
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
        #[arg(long, default_value = "key.pem")]
        key_out: PathBuf,
        #[arg(long, default_value = "cert.pem")]
        cert_out: PathBuf,
    },
    /// Revoke a certificate (not supported by the CA)
    Revoke,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "estca_client=info,estca_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let client = CaClient::new(&config.session);
    let endpoint = Endpoint::new(config.server.host.clone(), config.server.port);

    match cli.command {
        Commands::Revoke => {
            let status = client.revoke_certificate();
            println!("Revocation: {:?}", status);
        }
        Commands::Fingerprint { ca_name } => {
            let credentials = credentials(cli.identity)?;
            let result = client
                .get_ca_fingerprint(&endpoint, credentials, &ca_name)
                .context("Failed to fetch CA fingerprint")?;
            let algorithm = result
                .algorithm()
                .map(|a| a.to_string())
                .unwrap_or_else(|| format!("unknown ({})", result.algorithm_id));
            println!("{} {}", algorithm, result.hex());
        }
        Commands::CreateProfile {
            enrollment_id,
            profile,
            ca_name,
            role,
        } => {
            let credentials = credentials(cli.identity)?;
            let enrollment_secret =
                read_secret("ESTCA_ENROLLMENT_SECRET", "Enrollment secret: ")?;
            let profile = EnrollmentProfile {
                enrollment_id,
                enrollment_secret: enrollment_secret.to_string(),
                profile,
                ca_name,
                role,
            };
            client
                .create_enrollment_profile(&endpoint, credentials, profile)
                .context("Failed to create enrollment profile")?;
            println!("Enrollment profile created");
        }
        Commands::CaCert { out } => {
            let credentials = credentials(cli.identity)?;
            let chain = client
                .get_ca_cert(&endpoint, credentials)
                .context("Failed to fetch CA certificate")?;
            match out {
                Some(path) => {
                    fs::write(&path, &chain)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("CA certificate written to {}", path.display());
                }
                None => print!("{}", chain),
            }
        }
        Commands::Enroll {
            common_name,
            organization,
            organizational_unit,
            locality,
            state,
            country,
            dns_names,
            ip_addresses,
            emails,
            curve,
            algorithm,
            key_out,
            cert_out,
        } => {
            let credentials = credentials(cli.identity)?;
            let subject = CertAttributes {
                common_name,
                organization,
                organizational_unit,
                locality,
                state,
                country,
                dns_names,
                ip_addresses,
                emails,
            };
            let request = EnrollmentRequest::new(subject)
                .with_curve(curve.unwrap_or(config.enrollment.curve))
                .with_signature_algorithm(
                    algorithm.unwrap_or(config.enrollment.signature_algorithm),
                );

            let result = client
                .get_id_cert(&endpoint, credentials, &request)
                .context("Enrollment failed")?;

            write_private(&key_out, result.private_key_pem())?;
            fs::write(&cert_out, result.certificate_pem())
                .with_context(|| format!("Failed to write {}", cert_out.display()))?;
            println!(
                "Key written to {}, certificate written to {}",
                key_out.display(),
                cert_out.display()
            );
        }
    }

    Ok(())
}

fn credentials(identity: Option<String>) -> anyhow::Result<Credentials> {
    let Some(identity) = identity.filter(|i| !i.is_empty()) else {
        bail!("--identity is required for this command");
    };
    let secret = read_secret("ESTCA_SECRET", "PSK secret: ")?;
    Ok(Credentials::new(identity, secret.as_str()))
}

/// Environment first, then an interactive prompt.
fn read_secret(var: &str, prompt: &str) -> anyhow::Result<Zeroizing<String>> {
    if let Ok(secret) = std::env::var(var) {
        return Ok(Zeroizing::new(secret));
    }
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();
    let secret = Zeroizing::new(rpassword::read_password().context("Failed to read secret")?);
    if secret.is_empty() {
        bail!("Secret must not be empty");
    }
    Ok(secret)
}

fn write_private(path: &Path, contents: &str) -> anyhow::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
