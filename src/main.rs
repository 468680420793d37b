//! # Sendloom — duplicate-safe personalized bulk messaging
//!
//! Reads contacts from CSV, renders a message template per contact, and
//! delivers through WhatsApp Web in a driven browser. A durable ledger
//! guarantees each (recipient, message) pair is sent at most once across
//! runs.
//!
//! Usage:
//!   sendloom send --contacts list.csv -m "Hi {name}!" --dry-run
//!   sendloom send --contacts list.csv --template offer.txt --image flyer.png
//!   sendloom validate --contacts list.csv --template offer.txt
//!   sendloom ledger stats
//!   sendloom ledger cleanup --days 180

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use sendloom_contacts::read_contacts;
use sendloom_core::config::SendloomConfig;
use sendloom_core::traits::Transport;
use sendloom_core::CancelToken;
use sendloom_engine::{PacingGate, Renderer, SendOptions, SendOrchestrator};
use sendloom_ledger::{LedgerLock, MessageLedger};
use sendloom_transport::WhatsAppWebTransport;

#[derive(Parser)]
#[command(
    name = "sendloom",
    version,
    about = "📨 Sendloom — duplicate-safe bulk messaging over WhatsApp Web"
)]
struct Cli {
    /// Config file (default: ~/.sendloom/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send personalized messages to every contact in a CSV file
    Send(SendArgs),
    /// Check contacts and template without any side effects
    Validate(ValidateArgs),
    /// Inspect or prune the duplicate ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Args)]
struct SendArgs {
    /// CSV file with a header row and a phone column
    #[arg(long)]
    contacts: String,

    /// Inline message template
    #[arg(short, long, conflicts_with = "template")]
    message: Option<String>,

    /// File containing the message template
    #[arg(long)]
    template: Option<String>,

    /// Image to attach to every message
    #[arg(long)]
    image: Option<String>,

    /// Caption for the attached image
    #[arg(long, requires = "image")]
    caption: Option<String>,

    /// Validate, log and count, but deliver nothing and record nothing
    #[arg(long)]
    dry_run: bool,

    /// Messages per minute (overrides config)
    #[arg(long)]
    rate: Option<u32>,

    /// Ledger file (overrides config)
    #[arg(long)]
    ledger: Option<String>,

    /// Campaign tag stored in ledger entries
    #[arg(long)]
    campaign: Option<String>,

    /// Print the reason for every failed contact in the summary
    #[arg(long)]
    failures: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// CSV file with a header row and a phone column
    #[arg(long)]
    contacts: String,

    /// Inline message template
    #[arg(short, long, conflicts_with = "template")]
    message: Option<String>,

    /// File containing the message template
    #[arg(long)]
    template: Option<String>,
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Show message and recipient counts
    Stats {
        #[arg(long)]
        ledger: Option<String>,
    },
    /// Remove entries older than the retention window
    Cleanup {
        #[arg(long)]
        ledger: Option<String>,
        /// Retention in days (overrides config)
        #[arg(long)]
        days: Option<i64>,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(cli_path: &Option<String>) -> Result<SendloomConfig> {
    match cli_path {
        Some(p) => SendloomConfig::load_from(&expand_path(p))
            .with_context(|| format!("loading config {p}")),
        None => SendloomConfig::load().context("loading config"),
    }
}

fn load_template(message: &Option<String>, template: &Option<String>) -> Result<String> {
    match (message, template) {
        (Some(m), _) => Ok(m.clone()),
        (None, Some(path)) => {
            let path = expand_path(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading template {}", path.display()))
        }
        (None, None) => bail!("either --message or --template is required"),
    }
}

fn report_invalid(invalid: &[sendloom_core::types::InvalidContact]) {
    if invalid.is_empty() {
        return;
    }
    println!("⚠️  {} row(s) excluded:", invalid.len());
    for row in invalid {
        println!("   row {}: {}", row.row, row.reason);
    }
}

/// Warn about placeholders no CSV column can fill. They render as empty
/// strings, which is usually a template typo.
fn check_placeholders(template: &str, contacts: &[sendloom_core::types::Contact]) -> Vec<String> {
    let names = sendloom_template::placeholders(template);
    let Some(first) = contacts.first() else {
        return names.into_iter().collect();
    };
    names
        .into_iter()
        .filter(|n| first.get(n).is_none())
        .collect()
}

async fn cmd_send(config: SendloomConfig, args: SendArgs) -> Result<()> {
    let contacts_path = expand_path(&args.contacts);
    let book = read_contacts(&contacts_path)?;
    report_invalid(&book.invalid);
    if book.contacts.is_empty() {
        bail!("no valid contacts in {}", contacts_path.display());
    }

    let template = load_template(&args.message, &args.template)?;
    let unfillable = check_placeholders(&template, &book.contacts);
    if !unfillable.is_empty() {
        println!(
            "⚠️  Placeholders with no matching column (render empty): {}",
            unfillable.join(", ")
        );
    }

    let image = args.image.as_deref().map(expand_path);
    if let Some(image) = &image {
        if !image.exists() {
            bail!("image file not found: {}", image.display());
        }
    }

    let ledger_path = expand_path(args.ledger.as_deref().unwrap_or(&config.ledger.path));
    // Live runs take the single-writer lock; a dry run only reads.
    let _lock = if args.dry_run {
        None
    } else {
        Some(LedgerLock::acquire(&ledger_path)?)
    };
    let ledger = MessageLedger::load(&ledger_path)?;

    let rate = args.rate.unwrap_or(config.rate.messages_per_minute);
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n🛑 Stopping after the current contact...");
                cancel.cancel();
            }
        });
    }

    let transport: Arc<Mutex<dyn Transport>> = Arc::new(Mutex::new(
        WhatsAppWebTransport::new(config.transport.clone()),
    ));
    let mut orchestrator = SendOrchestrator::new(
        transport,
        ledger,
        PacingGate::per_minute(rate),
        config.retry.clone(),
        cancel,
    );

    let renderer: Renderer = {
        let template = template.clone();
        Box::new(move |contact| Ok(sendloom_template::render(&template, contact)))
    };
    let mut metadata = serde_json::Map::new();
    if let Some(campaign) = &args.campaign {
        metadata.insert(
            "campaign".into(),
            serde_json::Value::String(campaign.clone()),
        );
    }
    let options = SendOptions {
        dry_run: args.dry_run,
        image,
        caption: args.caption.clone(),
        metadata: serde_json::Value::Object(metadata),
    };

    let mode = if args.dry_run { "DRY RUN" } else { "LIVE" };
    println!(
        "📨 Sendloom {mode}: {} contacts, {} msg/min, ledger {}",
        book.contacts.len(),
        rate,
        ledger_path.display()
    );

    let outcome = orchestrator
        .run(&book.contacts, &renderer, &options)
        .await?;

    println!();
    if outcome.cancelled {
        println!("🛑 Run cancelled.");
    }
    println!("✅ Run summary: {}", outcome.stats.summary());
    println!(
        "   Ledger: {} messages to {} recipients",
        outcome.ledger_stats.total_messages, outcome.ledger_stats.unique_recipients
    );
    if !book.invalid.is_empty() {
        println!("   Excluded rows: {}", book.invalid.len());
    }
    if args.failures && !outcome.stats.failures.is_empty() {
        println!("   Failures:");
        for f in &outcome.stats.failures {
            println!("     {} — {}", f.recipient, f.reason);
        }
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let contacts_path = expand_path(&args.contacts);
    let book = read_contacts(&contacts_path)?;
    report_invalid(&book.invalid);
    println!(
        "✅ {} valid contact(s), {} excluded",
        book.contacts.len(),
        book.invalid.len()
    );

    if args.message.is_some() || args.template.is_some() {
        let template = load_template(&args.message, &args.template)?;
        let names = sendloom_template::placeholders(&template);
        println!(
            "   Placeholders: {}",
            names.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        let unfillable = check_placeholders(&template, &book.contacts);
        if unfillable.is_empty() {
            println!("   All placeholders match a column.");
        } else {
            println!("⚠️  No matching column for: {}", unfillable.join(", "));
        }
    }
    Ok(())
}

fn cmd_ledger(config: SendloomConfig, action: LedgerAction) -> Result<()> {
    match action {
        LedgerAction::Stats { ledger } => {
            let path = expand_path(ledger.as_deref().unwrap_or(&config.ledger.path));
            let ledger = MessageLedger::load(&path)?;
            let stats = ledger.stats();
            println!("📒 Ledger {}", path.display());
            println!("   Messages:   {}", stats.total_messages);
            println!("   Recipients: {}", stats.unique_recipients);
            println!("   Updated:    {}", stats.last_updated.to_rfc3339());
        }
        LedgerAction::Cleanup { ledger, days } => {
            let path = expand_path(ledger.as_deref().unwrap_or(&config.ledger.path));
            let days = days.unwrap_or(config.ledger.retention_days);
            let _lock = LedgerLock::acquire(&path)?;
            let mut ledger = MessageLedger::load(&path)?;
            let removed = ledger.cleanup(days)?;
            println!("🧹 Removed {removed} entries older than {days} day(s)");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sendloom=debug,sendloom_engine=debug,sendloom_transport=debug,sendloom_ledger=debug"
    } else {
        "sendloom=info,sendloom_engine=info,sendloom_transport=info,sendloom_ledger=info,sendloom_contacts=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Send(args) => cmd_send(config, args).await,
        Command::Validate(args) => cmd_validate(args),
        Command::Ledger { action } => cmd_ledger(config, action),
    }
}
