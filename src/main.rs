//! farm-pki CLI application.
//!
//! This binary drives the certificate issuance workflow: `ca`, `server`,
//! `client`, `import_cert` and `status`.

use clap::{Args, Parser, Subcommand};
use farm_pki::cert::loader::CertificateSummary;
use farm_pki::config::{
    PkiConfig, AUTHORITY_VALIDITY_DAYS, DEFAULT_AUTHORITY_KEY_BITS, DEFAULT_CLIENT_DAYS,
    DEFAULT_CLIENT_KEY_BITS, DEFAULT_CLIENT_NAME, DEFAULT_PARAMETER_PATH,
    DEFAULT_SERVER_KEY_BITS, SERVER_VALIDITY_DAYS,
};
use farm_pki::error::Result;
use farm_pki::publish::aws::{AwsCertificateManager, AwsCli, AwsParameterStore};
use farm_pki::publish::ParameterStore;
use farm_pki::workflow::{IssuedCertificate, Workflow};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "farm-pki")]
#[command(about = "Certificate authority and leaf certificates for a render farm", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// Directory holding certs/, server/ and client/
    #[arg(long, global = true, env = "PKI_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Load-balancer DNS name (server certificate subject)
    #[arg(long, global = true, env = "LB_DNS_NAME")]
    dns_name: Option<String>,

    /// Client certificate subject and file name
    #[arg(long, global = true, env = "CLIENT_NAME", default_value = DEFAULT_CLIENT_NAME)]
    client_name: String,

    /// Client certificate validity in days
    #[arg(long, global = true, env = "CLIENT_DAYS", default_value_t = DEFAULT_CLIENT_DAYS)]
    client_days: u32,

    /// Client bundle export password
    #[arg(long, global = true, env = "CLIENT_PFX_PASSWORD", hide_env_values = true)]
    client_password: Option<String>,

    /// Region for the certificate and parameter stores
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Credentials profile for the certificate and parameter stores
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Parameter path the published certificate identifier is written to
    #[arg(long, global = true, env = "CERT_PARAMETER_PATH", default_value = DEFAULT_PARAMETER_PATH)]
    parameter_path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the certificate authority
    Ca,

    /// Issue the load-balancer server certificate
    Server,

    /// Issue the render-node client certificate
    Client {
        /// Prompt for the bundle export password
        #[arg(long)]
        prompt_password: bool,
    },

    /// Import the server certificate into ACM and record its ARN in SSM
    #[command(name = "import_cert", alias = "import-cert")]
    ImportCert,

    /// Show what has been issued and published
    Status {
        /// Also read the published identifier back from the parameter store
        #[arg(long)]
        remote: bool,
    },
}

impl Settings {
    fn into_config(self) -> PkiConfig {
        PkiConfig {
            base_dir: self.base_dir,
            dns_name: self.dns_name,
            client_name: self.client_name,
            client_days: self.client_days,
            server_days: SERVER_VALIDITY_DAYS,
            authority_days: AUTHORITY_VALIDITY_DAYS,
            client_password: self.client_password.filter(|p| !p.is_empty()),
            authority_key_bits: DEFAULT_AUTHORITY_KEY_BITS,
            server_key_bits: DEFAULT_SERVER_KEY_BITS,
            client_key_bits: DEFAULT_CLIENT_KEY_BITS,
            region: self.region,
            profile: self.profile,
            parameter_path: self.parameter_path,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = cli.settings.into_config();

    if let Commands::Client {
        prompt_password: true,
    } = cli.command
    {
        let password = rpassword::prompt_password("Enter client bundle export password: ")?;
        config.client_password = Some(password).filter(|p| !p.is_empty());
    }

    let aws = AwsCli::new(config.region.clone(), config.profile.clone());
    let workflow = Workflow::new(config)?;

    match cli.command {
        Commands::Ca => {
            let written = workflow.create_authority()?;
            println!("✓ Created certificate authority");
            for path in written {
                println!("  {}", path.display());
            }
            Ok(())
        }

        Commands::Server => {
            let issued = workflow.create_server_certificate()?;
            print_issued("server", &issued);
            Ok(())
        }

        Commands::Client { .. } => {
            let issued = workflow.create_client_certificate()?;
            print_issued("client", &issued);
            if workflow.config().client_password.is_some() {
                println!("  Bundle is password protected");
            }
            Ok(())
        }

        Commands::ImportCert => {
            let identifier = workflow.publish_server_certificate(
                &AwsCertificateManager::new(aws.clone()),
                &AwsParameterStore::new(aws),
            )?;
            println!("✓ Imported server certificate: {}", identifier);
            println!("  Recorded at: {}", workflow.config().parameter_path);
            Ok(())
        }

        Commands::Status { remote } => {
            let status = workflow.status()?;

            println!("Stage: {}", status.stage);
            print_summary("Authority", status.authority.as_ref());
            print_summary("Server", status.server.as_ref());
            print_summary("Client", status.client.as_ref());
            if let Some(serial) = &status.last_serial {
                println!("Last serial: {}", serial);
            }
            if let Some(published) = &status.published {
                println!(
                    "Published: {} -> {} ({})",
                    published.identifier,
                    published.parameter_path,
                    format_timestamp(published.published_at)
                );
            }

            if remote {
                let path = &workflow.config().parameter_path;
                match AwsParameterStore::new(aws).get_parameter(path)? {
                    Some(value) => println!("Remote {}: {}", path, value),
                    None => println!("Remote {}: <not set>", path),
                }
            }
            Ok(())
        }
    }
}

fn print_issued(role: &str, issued: &IssuedCertificate) {
    println!("✓ Created {} certificate: {}", role, issued.paths.certificate.display());
    println!("  Subject: CN={}", issued.subject);
    println!("  Serial: {}", issued.serial_hex);
    println!("  Valid for: {} days", issued.validity_days);
    println!("  Key: {}", issued.paths.key.display());
    println!("  Request: {}", issued.paths.request.display());
    println!("  Bundle: {}", issued.paths.bundle.display());
}

fn print_summary(label: &str, summary: Option<&CertificateSummary>) {
    match summary {
        Some(s) => println!(
            "{:<10} CN={} serial={} valid {} .. {}",
            label,
            s.subject_cn.as_deref().unwrap_or("?"),
            s.serial_hex,
            format_timestamp(s.not_before),
            format_timestamp(s.not_after)
        ),
        None => println!("{:<10} <none>", label),
    }
}

fn format_timestamp(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
