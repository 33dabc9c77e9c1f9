//! snyk-history-scanner - Snyk monitoring for past releases
//!
//! `scan` monitors the manifests of the current working tree under a
//! product version; `migrate` rescans every release tag matching an
//! existing `<product>@<version>` Snyk project.

use clap::{Parser, Subcommand, ValueEnum};
use snyk_history_scanner::{
    config::{Config, OutputFormat},
    console::{Decision, MappingConsole},
    manifest::Ecosystem,
    orchestrator::ScanRequest,
    reporter::create_reporter,
    CurrentTreeRequest, HistoryScanner, RunRequest, ScannerError,
};
use std::io;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Monitor old releases of a product with Snyk
#[derive(Parser)]
#[command(name = "snyk-history-scanner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging (same as -v)
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Summary format for `migrate`
    #[arg(short = 'f', long, global = true)]
    format: Option<OutputFormatArg>,

    /// Write the summary to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormatArg {
    Text,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the manifests of the current directory as one product version
    Scan {
        /// Name of the product being scanned
        #[arg(long)]
        product: String,

        /// Version of the product being scanned
        #[arg(long)]
        version: String,

        /// Snyk organisation the scan belongs to
        #[arg(long)]
        org: String,

        /// Scan dotnet projects
        #[arg(long)]
        dotnet: bool,

        /// Scan golang projects
        #[arg(long)]
        golang: bool,

        /// Scan java projects
        #[arg(long)]
        java: bool,

        /// Scan npm projects
        #[arg(long)]
        npm: bool,

        /// File or directory name to skip (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Command that runs Snyk, e.g. 'npx snyk'
        #[arg(long)]
        snyk_cmd: Option<String>,

        /// Extra arguments passed to every snyk invocation
        #[arg(last = true)]
        snyk_args: Vec<String>,
    },

    /// Rescan every release tag matching an existing Snyk project
    Migrate {
        /// Name of the product being scanned
        #[arg(long)]
        product: String,

        /// Snyk organisation holding the existing projects
        #[arg(long)]
        org: String,

        /// Snyk API token
        #[arg(long, alias = "snykToken", env = "SNYK_TOKEN", hide_env_values = true)]
        snyk_token: Option<String>,

        /// GitHub user the token belongs to
        #[arg(long, alias = "githubUsername")]
        github_username: Option<String>,

        /// GitHub API token
        #[arg(long, alias = "githubToken", env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// Owner of the product repository
        #[arg(long, alias = "githubOwner")]
        github_owner: String,

        /// Name of the product repository
        #[arg(long, alias = "githubRepo")]
        github_repo: String,

        /// Command that runs Snyk, e.g. 'npx snyk'
        #[arg(long)]
        snyk_cmd: Option<String>,

        /// Accept the generated mapping without prompting
        #[arg(short, long)]
        yes: bool,

        /// Skip dependency restores before each scan
        #[arg(long)]
        no_prebuild: bool,

        /// Extra arguments passed to every snyk invocation
        #[arg(last = true)]
        snyk_args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 if cli.quiet => Level::ERROR,
        0 if cli.debug => Level::DEBUG,
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.to_string())),
        )
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Override with CLI options
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    if cli.output.is_some() {
        config.output.output_path = cli.output.clone();
    }

    match cli.command {
        Commands::Scan {
            product,
            version,
            org,
            dotnet,
            golang,
            java,
            npm,
            exclude,
            snyk_cmd,
            snyk_args,
        } => {
            let ecosystems: Vec<Ecosystem> = [
                (dotnet, Ecosystem::Dotnet),
                (golang, Ecosystem::Golang),
                (java, Ecosystem::Java),
                (npm, Ecosystem::Npm),
            ]
            .into_iter()
            .filter_map(|(enabled, ecosystem)| enabled.then_some(ecosystem))
            .collect();

            if ecosystems.is_empty() {
                return Err(ScannerError::Config(
                    "no ecosystem selected, pass at least one of --dotnet, --golang, --java or --npm".into(),
                )
                .into());
            }

            if let Some(cmd) = snyk_cmd {
                config.snyk.command = cmd;
            }
            config.snyk.extra_args.extend(snyk_args);

            let root = std::env::current_dir()?;
            let scanner = HistoryScanner::new(config);
            let request = CurrentTreeRequest {
                product_name: &product,
                version: &version,
                org: &org,
                ecosystems,
                excluded: exclude,
            };

            let scanned = scanner.scan_current_tree(&root, &request).await?;
            println!("monitored {} manifests as {}@{}", scanned.len(), product, version);
            Ok(())
        }

        Commands::Migrate {
            product,
            org,
            snyk_token,
            github_username,
            github_token,
            github_owner,
            github_repo,
            snyk_cmd,
            yes,
            no_prebuild,
            snyk_args,
        } => {
            if snyk_token.is_some() {
                config.snyk.token = snyk_token;
            }
            if github_username.is_some() {
                config.github.username = github_username;
            }
            if github_token.is_some() {
                config.github.token = github_token;
            }
            if let Some(cmd) = snyk_cmd {
                config.snyk.command = cmd;
            }
            if no_prebuild {
                config.scan.prebuild = false;
            }
            config.snyk.extra_args.extend(snyk_args);

            // Validate everything the run needs before touching any API.
            config.snyk_token()?;
            config.github_credentials()?;

            let scanner = HistoryScanner::new(config);
            migrate(&scanner, &product, &org, &github_owner, &github_repo, yes).await
        }
    }
}

async fn migrate(
    scanner: &HistoryScanner,
    product: &str,
    org: &str,
    owner: &str,
    repo: &str,
    yes: bool,
) -> anyhow::Result<()> {
    let plan = scanner.plan(product, org, owner, repo).await?;

    for name in &plan.reconciliation.unmatched {
        println!(
            "couldn't find matching github tag for Snyk project '{}'. You'll need to add this one manually",
            name
        );
    }

    let orchestrator = scanner.orchestrator()?;

    let mapping = if yes {
        plan.reconciliation.mapping
    } else {
        let cli = scanner.snyk_cli()?;
        let preview = cli.command_line(&cli.all_projects_args(&ScanRequest {
            org,
            target_reference: "<TAG_VERSION>",
            product_name: product,
        }));

        let stdin = io::stdin();
        let mut console = MappingConsole::new(stdin.lock(), io::stdout(), preview);
        match console.confirm(plan.reconciliation.mapping)? {
            Decision::Confirmed(mapping) => mapping,
            Decision::Aborted => {
                println!("aborting - 'y' or 'e' was not specified");
                return Ok(());
            }
        }
    };

    if mapping.is_empty() {
        warn!("nothing to scan, the mapping is empty");
        return Ok(());
    }

    // Stop at the next tag boundary on Ctrl-C; the workspace is still removed.
    let abort = orchestrator.abort_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        warn!("Received interrupt signal, stopping after the current tag...");
        abort.abort();
    });

    let request = RunRequest {
        product_name: product,
        org,
        repo_url: &plan.repo_url,
    };
    let report = orchestrator.run(&request, &mapping).await?;

    let reporter = create_reporter(scanner.config().output.format);
    let summary = reporter.generate(&report);

    if let Some(ref output_path) = scanner.config().output.output_path {
        std::fs::write(output_path, &summary)?;
        info!("Report written to: {}", output_path.display());
    } else {
        println!("{}", summary);
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}
