use analytics::{AggregationProfile, Summary};
use anyhow::Context;
use api_client::{ApiClient, ApiKeyInfo, BybitClient};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use configuration::{LogFormat, Settings};
use core_types::{Credentials, Dataset, Period};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use web_server::{AppState, Report, ReportRequest};

/// Cumulative PnL, fee, volume and transfer charts for a Bybit account.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (default: ./config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web form.
    Serve(ServeArgs),
    /// Print a summary table for one dataset and period.
    Report(ReportArgs),
    /// Show what the configured API key is allowed to do.
    KeyInfo(CredentialArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 0.0.0.0:8082.
    #[arg(long)]
    addr: Option<String>,
}

#[derive(Args)]
struct CredentialArgs {
    #[arg(long, env = "BYBIT_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "BYBIT_API_SECRET", hide_env_values = true)]
    api_secret: String,
}

#[derive(Args)]
struct ReportArgs {
    #[command(flatten)]
    credentials: CredentialArgs,

    /// closed_pnl, executions or treasury.
    #[arg(long, default_value = "closed_pnl")]
    dataset: Dataset,

    /// today, yesterday, current_month, previous_month or custom.
    #[arg(long, default_value = "today")]
    period: String,

    /// Start of a custom period (UTC), e.g. 2024-05-01 or 2024-05-01T13:30.
    #[arg(long)]
    from: Option<String>,

    /// End of a custom period (UTC).
    #[arg(long)]
    to: Option<String>,

    /// Comma separated symbols (or coins) to keep.
    #[arg(long, default_value = "")]
    symbols: String,

    /// Print the summary as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Always fetch from the exchange.
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = configuration::load_settings(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    let _guard = configuration::init_tracing(&settings.logging)?;

    match cli.command {
        Commands::Serve(args) => handle_serve(args, settings).await,
        Commands::Report(args) => handle_report(args, settings).await,
        Commands::KeyInfo(args) => handle_key_info(args, settings).await,
    }
}

async fn handle_serve(args: ServeArgs, mut settings: Settings) -> anyhow::Result<()> {
    if let Some(addr) = args.addr {
        let (host, port) = addr
            .rsplit_once(':')
            .with_context(|| format!("invalid address '{addr}', expected HOST:PORT"))?;
        settings.server.host = host.to_string();
        settings.server.port = port
            .parse()
            .with_context(|| format!("invalid port in '{addr}'"))?;
    }
    let state = AppState::from_settings(settings).await?;
    web_server::run_server(state).await
}

async fn handle_report(args: ReportArgs, mut settings: Settings) -> anyhow::Result<()> {
    let period = Period::parse(&args.period, args.from.as_deref(), args.to.as_deref())?;
    if args.no_cache {
        settings.cache.enabled = false;
    }
    // A single CLI run never needs the per-account cooldown.
    settings.server.request_cooldown_secs = 0;

    let state = AppState::from_settings(settings).await?;
    let request = ReportRequest {
        credentials: Credentials::new(args.credentials.api_key, args.credentials.api_secret),
        dataset: args.dataset,
        period,
        symbols: ReportRequest::parse_symbols(&args.symbols),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Fetching {} for {}...", args.dataset.title(), period.title()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = web_server::generate_report(&state, &request, Utc::now()).await;
    spinner.finish_and_clear();
    let report = report?;
    tracing::debug!(records = report.record_count, from_cache = report.from_cache, "Report finished.");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

async fn handle_key_info(args: CredentialArgs, settings: Settings) -> anyhow::Result<()> {
    let client = BybitClient::new(&settings.exchange)?;
    let credentials = Credentials::new(args.api_key, args.api_secret);
    let info = client.api_key_info(&credentials).await?;
    tracing::info!(key_id = %info.id, read_only = info.is_read_only(), "Fetched API key details.");
    println!("{}", key_info_table(&info));
    Ok(())
}

fn print_report(report: &Report) {
    println!("{}", report.title);
    println!(
        "{} to {} | {} records{}",
        format_time(report.window.start_utc()),
        format_time(report.window.end_utc()),
        report.record_count,
        if report.from_cache { " (cached)" } else { "" }
    );
    if let Some(warning) = &report.warning {
        println!("WARNING: {warning}");
    }
    if report.summary.is_empty() {
        println!("No data for this period.");
        return;
    }
    println!("{}", summary_table(&report.summary, &report.profile));
}

fn summary_table(summary: &Summary, profile: &AggregationProfile) -> Table {
    let mut header = vec![
        if profile.group_field == "coin" { "Coin" } else { "Symbol" }.to_string(),
        "Records".to_string(),
    ];
    header.extend(profile.metrics.iter().map(|m| m.label.to_string()));
    if profile.net_flow.is_some() {
        header.push("Net Flow".to_string());
    }
    header.extend(["First".to_string(), "Last".to_string()]);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);

    for row in &summary.rows {
        let mut cells = vec![Cell::new(&row.display_name), Cell::new(row.count)];
        for (index, metric) in profile.metrics.iter().enumerate() {
            let value = row.totals.get(metric.name).copied().unwrap_or_default();
            let cell = Cell::new(format!("{:.*}", metric.decimals as usize, value.round_dp(metric.decimals)));
            cells.push(if index == 0 { colour_by_sign(cell, value) } else { cell });
        }
        if let Some(net) = row.net_flow {
            cells.push(colour_by_sign(Cell::new(format!("{:.4}", net.round_dp(4))), net));
        }
        cells.push(Cell::new(row.first.map(format_time).unwrap_or_else(|| "-".to_string())));
        cells.push(Cell::new(row.last.map(format_time).unwrap_or_else(|| "-".to_string())));
        table.add_row(cells);
    }
    table
}

fn key_info_table(info: &ApiKeyInfo) -> Table {
    let permissions = info
        .permissions
        .iter()
        .filter(|(_, scopes)| !scopes.is_empty())
        .map(|(group, scopes)| format!("{group}: {}", scopes.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    let ips = info.ips.join(", ");
    let uid = info.uid();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Key id", info.id.as_str()]);
    table.add_row(vec!["Note", info.note.as_str()]);
    table.add_row(vec!["UID", uid.as_str()]);
    table.add_row(vec![
        "Access",
        if info.is_read_only() { "read only" } else { "read and write" },
    ]);
    table.add_row(vec!["Permissions", permissions.as_str()]);
    table.add_row(vec!["IP whitelist", ips.as_str()]);
    table.add_row(vec!["Expires", info.expired_at.as_str()]);
    table
}

fn colour_by_sign(cell: Cell, value: Decimal) -> Cell {
    if value.is_zero() {
        cell
    } else if value.is_sign_positive() {
        cell.fg(Color::Green)
    } else {
        cell.fg(Color::Red)
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
