// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use certcenter::config::{validate_days, MAX_CERT_DAYS, MAX_ROOT_DAYS};
use certcenter::{
    parse_serial_path, serial_path, slugify, ApplicationController, Certificate,
    CertificateController, CertificateType, Config, Error, FileCertificateRepository,
    FileOrganizationRepository, FilePrivateKeyRepository, KeyType, Organization, OsRandom, Paths,
    RcgenSigner, Result, SerialNumber,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::sync::Arc;
use time::Duration;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "certcenter")]
#[command(about = "Certificate authority for organizations: roots, intermediates, server and client certificates")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    certcenter org create acme --name \"Acme Corp\"
    certcenter root create acme \"Acme Root CA\"
    certcenter issue server acme <root-serial> www.acme.test
    certcenter list acme <root-serial> --type server
    certcenter show acme <root-serial>/<serial> --key

Certificates are addressed by serial path: the decimal serial numbers
from the root down, joined with '/'.

Set CERTCENTER_ROOT to keep data somewhere other than the default directory.")]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage organizations
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },

    /// Manage root certificates
    Root {
        #[command(subcommand)]
        action: RootAction,
    },

    /// Issue a certificate signed by an existing CA
    Issue {
        #[command(subcommand)]
        action: IssueAction,
    },

    /// List certificates signed by a certificate
    List {
        /// Organization id
        org: String,

        /// Serial path of the signing certificate
        path: String,

        /// Only list certificates of this type (root, intermediate, server, client)
        #[arg(long = "type")]
        certificate_type: Option<CertificateType>,
    },

    /// Show a certificate and optionally its private key
    Show {
        /// Organization id
        org: String,

        /// Serial path of the certificate
        path: String,

        /// Also print the private key
        #[arg(long)]
        key: bool,
    },

    /// Build a revocation record for a certificate
    Revoke {
        /// Organization id
        org: String,

        /// Serial path of the certificate
        path: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum OrgAction {
    /// Create an organization
    Create {
        /// Organization id (lowercase letters, digits and hyphens)
        id: String,

        /// Organization name; repeat for alternate names
        #[arg(long = "name", required = true)]
        names: Vec<String>,

        /// URL slug (default: derived from the id)
        #[arg(long)]
        slug: Option<String>,
    },

    /// List organizations
    List,
}

#[derive(Subcommand)]
enum RootAction {
    /// Issue a self-signed root certificate
    Create {
        /// Organization id
        org: String,

        /// Common name of the root
        common_name: String,

        #[command(flatten)]
        options: IssueOptions,
    },

    /// List root certificates
    List {
        /// Organization id
        org: String,
    },
}

#[derive(Subcommand)]
enum IssueAction {
    /// Issue an intermediate CA certificate
    Intermediate {
        /// Organization id
        org: String,

        /// Serial path of the signing CA
        path: String,

        /// Common name of the intermediate
        common_name: String,

        #[command(flatten)]
        options: IssueOptions,
    },

    /// Issue a TLS server certificate
    Server {
        /// Organization id
        org: String,

        /// Serial path of the signing CA
        path: String,

        /// DNS names; the first one becomes the common name
        #[arg(required = true)]
        dns_names: Vec<String>,

        #[command(flatten)]
        options: IssueOptions,
    },

    /// Issue a TLS client certificate
    Client {
        /// Organization id
        org: String,

        /// Serial path of the signing CA
        path: String,

        /// Common name of the client
        common_name: String,

        #[command(flatten)]
        options: IssueOptions,
    },
}

#[derive(Args, Clone, Copy)]
struct IssueOptions {
    /// Days until the certificate expires (default: from config.toml)
    #[arg(long)]
    days: Option<u32>,

    /// Key type, e.g. ECDSA_P256, RSA_2048, Ed25519 (default: from config.toml)
    #[arg(long)]
    key_type: Option<KeyType>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Output helper that respects quiet/verbose flags
struct Output {
    quiet: bool,
    verbose: bool,
}

impl Output {
    fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }

    /// Print a standard message (suppressed with --quiet)
    fn print(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a verbose message (only shown with --verbose)
    fn verbose(&self, msg: &str) {
        if self.verbose {
            println!("{}", msg);
        }
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if quiet {
        "certcenter=warn"
    } else if verbose {
        "certcenter=debug"
    } else {
        "certcenter=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_application(paths: &Paths) -> Result<ApplicationController> {
    let config = Config::load(&paths.config)?;
    let root = paths.repository();
    Ok(ApplicationController::new(
        Arc::new(FileOrganizationRepository::new(root)),
        Arc::new(FileCertificateRepository::new(root)),
        Arc::new(FilePrivateKeyRepository::new(root)),
        Arc::new(RcgenSigner),
        Arc::new(OsRandom),
        config.issuance_defaults(),
    ))
}

/// Resolve `path` to its controller and run `f` on it.
fn with_certificate<R, F>(app: &ApplicationController, org: &str, path: &str, f: F) -> Result<R>
where
    F: FnOnce(&mut CertificateController<'_>) -> Result<R>,
{
    let chain = parse_serial_path(path)?;
    let organization = app.organization_controller(org)?;
    let (first, rest) = chain
        .split_first()
        .ok_or(Error::MustBeDefined { field: "serialPath" })?;
    let mut controller = organization.certificate_controller(first)?;
    descend(&mut controller, rest, f)
}

fn descend<R, F>(controller: &mut CertificateController<'_>, rest: &[SerialNumber], f: F) -> Result<R>
where
    F: FnOnce(&mut CertificateController<'_>) -> Result<R>,
{
    match rest.split_first() {
        None => f(controller),
        Some((serial, rest)) => {
            let mut child = controller.child_certificate_controller(serial)?;
            descend(&mut child, rest, f)
        }
    }
}

fn expiration(days: Option<u32>, max: u32) -> Result<Option<Duration>> {
    days.map(|days| {
        validate_days("days", days, max)?;
        Ok(Duration::days(i64::from(days)))
    })
    .transpose()
}

fn apply_options(controller: &mut CertificateController<'_>, options: IssueOptions) -> Result<()> {
    if let Some(expiration) = expiration(options.days, MAX_CERT_DAYS)? {
        controller.set_expiration_duration(expiration);
    }
    if let Some(key_type) = options.key_type {
        controller.set_key_type(key_type)?;
    }
    Ok(())
}

fn type_label(certificate: &Certificate) -> &'static str {
    certificate
        .certificate_type()
        .map(|t| t.as_str())
        .unwrap_or("unknown")
}

fn print_certificates(certificates: &[Certificate]) {
    if certificates.is_empty() {
        println!("No certificates found.");
        return;
    }

    println!(
        "{:<44} {:<13} {:<12} {:>6}  COMMON NAME",
        "SERIAL", "TYPE", "EXPIRES", "DAYS"
    );
    println!("{}", "-".repeat(96));
    for certificate in certificates {
        let info = certificate.info();
        println!(
            "{:<44} {:<13} {:<12} {:>6}  {}",
            certificate.serial_number(),
            type_label(certificate),
            info.expiry_string(),
            info.days_remaining(),
            certificate.common_name().unwrap_or("-")
        );
    }
}

fn print_issued(out: &Output, certificate: &Certificate) {
    out.print(&format!(
        "Issued {} certificate '{}'",
        type_label(certificate),
        certificate.common_name().unwrap_or("-")
    ));
    out.verbose(&format!("  Subject: {}", certificate.subject()));
    out.verbose(&format!("  Issuer:  {}", certificate.issuer()));
    out.verbose(&format!("  Expires: {}", certificate.info().expiry_string()));
    println!("Serial path: {}", serial_path(&certificate.chain()));
}

// ============================================================================
// Entry point
// ============================================================================

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    let out = Output::new(cli.quiet, cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        return cmd_completions(shell);
    }

    let paths = Paths::new()?;
    out.verbose(&format!("Data directory: {}", paths.base.display()));
    let app = open_application(&paths)?;

    match cli.command {
        Commands::Org { action } => match action {
            OrgAction::Create { id, names, slug } => cmd_org_create(&app, &out, id, names, slug),
            OrgAction::List => cmd_org_list(&app),
        },
        Commands::Root { action } => match action {
            RootAction::Create {
                org,
                common_name,
                options,
            } => cmd_root_create(&app, &out, &org, &common_name, options),
            RootAction::List { org } => cmd_root_list(&app, &org),
        },
        Commands::Issue { action } => cmd_issue(&app, &out, action),
        Commands::List {
            org,
            path,
            certificate_type,
        } => cmd_list(&app, &org, &path, certificate_type),
        Commands::Show { org, path, key } => cmd_show(&app, &org, &path, key),
        Commands::Revoke { org, path } => cmd_revoke(&app, &out, &org, &path),
        Commands::Completions { .. } => Ok(()),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_org_create(
    app: &ApplicationController,
    out: &Output,
    id: String,
    names: Vec<String>,
    slug: Option<String>,
) -> Result<()> {
    let slug = slug.unwrap_or_else(|| slugify(&id));
    let organization = app.new_organization(Organization::new(id, slug, names))?;
    out.print(&format!(
        "Created organization '{}' ({})",
        organization.id(),
        organization.name()
    ));
    Ok(())
}

fn cmd_org_list(app: &ApplicationController) -> Result<()> {
    let organizations = app.organization_collection()?;
    if organizations.is_empty() {
        println!("No organizations found.");
        println!("Run 'certcenter org create <id> --name <NAME>' to create one.");
        return Ok(());
    }

    println!("{:<24} {:<24} NAME", "ID", "SLUG");
    println!("{}", "-".repeat(72));
    for organization in organizations {
        println!(
            "{:<24} {:<24} {}",
            organization.id(),
            organization.slug(),
            organization.names().join(", ")
        );
    }
    Ok(())
}

fn cmd_root_create(
    app: &ApplicationController,
    out: &Output,
    org: &str,
    common_name: &str,
    options: IssueOptions,
) -> Result<()> {
    let mut organization = app.organization_controller(org)?;
    if let Some(expiration) = expiration(options.days, MAX_ROOT_DAYS)? {
        organization.set_expiration_duration(expiration);
    }
    if let Some(key_type) = options.key_type {
        organization.set_key_type(key_type)?;
    }

    let certificate = organization.new_root_certificate(common_name)?;
    print_issued(out, &certificate);
    Ok(())
}

fn cmd_root_list(app: &ApplicationController, org: &str) -> Result<()> {
    let organization = app.organization_controller(org)?;
    print_certificates(&organization.certificate_collection()?);
    Ok(())
}

fn cmd_issue(app: &ApplicationController, out: &Output, action: IssueAction) -> Result<()> {
    let (certificate, _key) = match action {
        IssueAction::Intermediate {
            org,
            path,
            common_name,
            options,
        } => with_certificate(app, &org, &path, |ca| {
            apply_options(ca, options)?;
            ca.new_intermediate_certificate(&common_name)
        })?,
        IssueAction::Server {
            org,
            path,
            dns_names,
            options,
        } => with_certificate(app, &org, &path, |ca| {
            apply_options(ca, options)?;
            ca.new_server_certificate(&dns_names)
        })?,
        IssueAction::Client {
            org,
            path,
            common_name,
            options,
        } => with_certificate(app, &org, &path, |ca| {
            apply_options(ca, options)?;
            ca.new_client_certificate(&common_name)
        })?,
    };
    print_issued(out, &certificate);
    Ok(())
}

fn cmd_list(
    app: &ApplicationController,
    org: &str,
    path: &str,
    certificate_type: Option<CertificateType>,
) -> Result<()> {
    let children = with_certificate(app, org, path, |ca| {
        ca.child_certificate_collection(certificate_type)
    })?;
    print_certificates(&children);
    Ok(())
}

fn cmd_show(app: &ApplicationController, org: &str, path: &str, key: bool) -> Result<()> {
    let (certificate, private_key) = with_certificate(app, org, path, |controller| {
        let private_key = if key {
            Some(controller.private_key()?)
        } else {
            None
        };
        Ok((controller.certificate().clone(), private_key))
    })?;

    let info = certificate.info();
    println!("Certificate: {}", serial_path(&certificate.chain()));
    println!("Type:        {}", type_label(&certificate));
    println!("Subject:     {}", certificate.subject());
    println!("Issuer:      {}", certificate.issuer());
    if !certificate.dns_names().is_empty() {
        println!("DNS names:");
        for name in certificate.dns_names() {
            println!("    - {}", name);
        }
    }

    let days = info.days_remaining();
    if days < 0 {
        println!("Status:      EXPIRED ({} days ago)", -days);
    } else {
        println!("Status:      Valid ({} days remaining)", days);
    }
    println!("Expires:     {}", info.expiry_string());
    println!();
    print!("{}", certificate.to_pem());

    if let Some(private_key) = private_key {
        print!("{}", private_key.to_pem()?);
    }
    Ok(())
}

fn cmd_revoke(app: &ApplicationController, out: &Output, org: &str, path: &str) -> Result<()> {
    let revoked = with_certificate(app, org, path, |controller| {
        controller
            .organization_controller()
            .revoke_certificate(controller.certificate())
    })?;

    let at = revoked.revocation_time;
    out.print(&format!("Revoked certificate {}", path));
    println!("Serial number:   {}", revoked.serial_number);
    println!(
        "Revocation time: {}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        at.year(),
        at.month() as u8,
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    );
    let until = revoked.expiration_time;
    println!(
        "Expiration time: {}-{:02}-{:02}",
        until.year(),
        until.month() as u8,
        until.day()
    );
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "certcenter", &mut std::io::stdout());
    Ok(())
}
