use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rulesmith_client::PromClient;
use rulesmith_core::{RuleKind, Settings, TestFile};
use rulesmith_engine::{analyze, generate, render_report, RuleCatalog};

#[derive(Parser)]
#[command(
    name = "rulesmith",
    version,
    about = "Inspects Prometheus rules and generates promtool unit-test fixtures from live data"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, global = true, help = "Prometheus base URL")]
    url: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Path to the bearer token used for authentication"
    )]
    token_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Path to the Prometheus CA certificate")]
    ca: Option<PathBuf>,

    #[arg(long, global = true, help = "Don't check certificate validity")]
    insecure: bool,

    #[arg(
        long = "recording-rule",
        global = true,
        value_delimiter = ',',
        help = "Recording rule to select (repeatable, comma-separated). If empty all recording rules are selected"
    )]
    recording_rules: Vec<String>,

    #[arg(
        long = "alerting-rule",
        global = true,
        value_delimiter = ',',
        help = "Alerting rule to select (repeatable, comma-separated). If empty all alerting rules are selected"
    )]
    alerting_rules: Vec<String>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate unit-test fixtures for recording rules by sampling live data")]
    Generate,

    #[command(about = "Report direct and indirect metric dependencies of the loaded rules")]
    Inspect,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let url = cli.url.as_deref().ok_or_else(|| anyhow!("missing --url parameter"))?;
    let settings = Settings::new(url)?
        .with_token_file(cli.token_file.clone())
        .with_ca_file(cli.ca.clone())
        .with_insecure_tls(cli.insecure)
        .with_recording_rules(cli.recording_rules.clone())
        .with_alerting_rules(cli.alerting_rules.clone());

    let client = PromClient::new(&settings)?;
    let catalog = RuleCatalog::load(&client).await?;

    let mut stdout = std::io::stdout().lock();
    match cli.command.unwrap_or(Commands::Inspect) {
        Commands::Generate => {
            let tests = generate(&catalog, &client, &settings.recording_rules, Utc::now()).await?;
            stdout.write_all(TestFile::new(tests).to_yaml()?.as_bytes())?;
        }
        Commands::Inspect => {
            for (kind, filter, heading) in [
                (RuleKind::Recording, &settings.recording_rules, "recording rules"),
                (RuleKind::Alerting, &settings.alerting_rules, "alerting rules"),
            ] {
                let infos = analyze(&catalog, kind, filter)?;
                writeln!(stdout, "{heading}:")?;
                render_report(&infos, &mut stdout)?;
            }
        }
    }

    Ok(())
}
