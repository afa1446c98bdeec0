//! event-export: collect a contract's events into a CSV file.

use std::path::PathBuf;

use alloy::{
    network::Ethereum,
    primitives::Address,
    transports::http::reqwest::Url,
};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use event_range_scanner::{
    EventFilter, EventScannerBuilder, OutputReceiver, OutputSink, SharedResults, TailMode,
    config::{AbiSource, HistoryType, ScanConfig, ScanMode},
    export::{ExportTable, default_file_name},
    robust_provider::{RobustProvider, RobustProviderBuilder},
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "event-export")]
#[command(version, about = "Collect the events a contract emitted and export them to CSV")]
#[command(after_help = r#"EXAMPLES:
    # First run: scan USDC transfers of one day and remember the settings
    event-export --address 0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48 --event Transfer \
                 --abi usdc.json --rpc-url https://eth.llamarpc.com --save-config \
                 history --from-date 2024-03-01 --to-date 2024-03-02

    # Re-run with the remembered settings over a block range
    event-export history --from-block 19000000 --to-block 19010000

    # Follow the chain head until Ctrl-C, then export
    event-export live --contiguous
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Settings file, read when present
    #[arg(short, long, default_value = "scan.json")]
    config: PathBuf,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_config: bool,

    /// Contract address
    #[arg(short, long)]
    address: Option<Address>,

    /// Event name as it appears in the ABI
    #[arg(short, long)]
    event: Option<String>,

    /// Path to the contract's JSON ABI
    #[arg(long)]
    abi: Option<PathBuf>,

    /// JSON-RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Additional endpoints tried when the primary one fails
    #[arg(long = "fallback-rpc-url")]
    fallback_rpc_urls: Vec<String>,

    /// CSV file to write; defaults to <address prefix>_<event>.csv
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a closed block or date range
    History {
        #[arg(long, conflicts_with_all = ["from_date", "to_date"])]
        from_block: Option<u64>,
        /// Defaults to the chain head
        #[arg(long)]
        to_block: Option<u64>,
        /// YYYY-MM-DD, midnight UTC
        #[arg(long)]
        from_date: Option<NaiveDate>,
        /// YYYY-MM-DD, midnight UTC; defaults to now
        #[arg(long)]
        to_date: Option<NaiveDate>,
        /// Distance between first and last block of one log query
        #[arg(long)]
        batch_span: Option<u64>,
        /// Logs decoded concurrently
        #[arg(long)]
        max_concurrent_decodes: Option<usize>,
    },
    /// Poll the chain head until interrupted
    Live {
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Continue from the last polled block instead of the current head
        #[arg(long)]
        contiguous: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let cli = Cli::parse();
    let config = effective_config(&cli)?;
    if cli.save_config {
        config.save(&cli.config)?;
    }

    let interface = config.interface()?;
    let filter = EventFilter::resolve(config.contract_address, &interface, &config.event_name)?;
    let provider = connect(&config).await?;

    let (sink, output) = OutputSink::channel();
    let printer = tokio::spawn(print_output(output));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let results = SharedResults::new();
    match config.mode {
        ScanMode::History => {
            let scanner = EventScannerBuilder::historic()
                .range(config.scan_range()?)
                .batch_span(config.batch_span)
                .max_concurrent_decodes(config.max_concurrent_decodes)
                .connect(provider, filter)
                .await?;
            scanner.spawn(sink, cancel, results.clone()).await??;
        }
        ScanMode::Live => {
            let scanner = EventScannerBuilder::live()
                .poll_interval(config.poll_interval())
                .tail_mode(config.tail_mode)
                .connect(provider, filter)
                .await?;
            println!("Press Ctrl-C to stop and export");
            scanner.spawn(sink, cancel, results.clone()).await?;
        }
    }
    printer.await?;

    let records = results.take();
    if records.is_empty() {
        println!("No events to export");
        return Ok(());
    }

    let path = cli
        .output
        .unwrap_or_else(|| default_file_name(config.contract_address, &config.event_name).into());
    let outcome = ExportTable::from_records(&records).write_csv(&path)?;
    let verb = if outcome.appended { "Appended" } else { "Wrote" };
    println!("{verb} {} rows to {}", outcome.rows, path.display());

    Ok(())
}

fn effective_config(cli: &Cli) -> anyhow::Result<ScanConfig> {
    let mut config = if cli.config.is_file() {
        ScanConfig::load(&cli.config)?
    } else {
        let missing = |flag: &str| {
            format!("{flag} is required when {} does not exist", cli.config.display())
        };
        ScanConfig::new(
            cli.address.with_context(|| missing("--address"))?,
            cli.event.clone().with_context(|| missing("--event"))?,
            cli.rpc_url.clone().with_context(|| missing("--rpc-url"))?,
            AbiSource::File { path: cli.abi.clone().with_context(|| missing("--abi"))? },
        )
    };

    if let Some(address) = cli.address {
        config.contract_address = address;
    }
    if let Some(event) = &cli.event {
        config.event_name.clone_from(event);
    }
    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url.clone_from(rpc_url);
    }
    if !cli.fallback_rpc_urls.is_empty() {
        config.fallback_rpc_urls.clone_from(&cli.fallback_rpc_urls);
    }
    if let Some(path) = &cli.abi {
        config.abi = AbiSource::File { path: path.clone() };
    }

    match &cli.command {
        Some(Command::History {
            from_block,
            to_block,
            from_date,
            to_date,
            batch_span,
            max_concurrent_decodes,
        }) => {
            config.mode = ScanMode::History;
            if from_block.is_some() || to_block.is_some() {
                config.history_type = HistoryType::Block;
                config.start_block = from_block.or(config.start_block);
                config.end_block = *to_block;
            }
            if from_date.is_some() || to_date.is_some() {
                config.history_type = HistoryType::Time;
                config.start_time = from_date.or(config.start_time);
                config.end_time = *to_date;
            }
            if let Some(span) = batch_span {
                config.batch_span = *span;
            }
            if let Some(width) = max_concurrent_decodes {
                config.max_concurrent_decodes = *width;
            }
        }
        Some(Command::Live { poll_interval_ms, contiguous }) => {
            config.mode = ScanMode::Live;
            if let Some(interval) = poll_interval_ms {
                config.poll_interval_ms = *interval;
            }
            if *contiguous {
                config.tail_mode = TailMode::Contiguous;
            }
        }
        None => {}
    }

    Ok(config)
}

async fn connect(config: &ScanConfig) -> anyhow::Result<RobustProvider<Ethereum>> {
    let settings = config.provider;
    let mut builder = RobustProviderBuilder::<Ethereum, _>::new(config.rpc_url.as_str())
        .call_timeout(settings.call_timeout())
        .max_retries(settings.max_retries)
        .min_delay(settings.min_delay());

    for url in &config.fallback_rpc_urls {
        let url = Url::parse(url).with_context(|| format!("invalid fallback endpoint {url}"))?;
        builder = builder.fallback(url);
    }

    builder.build().await.with_context(|| format!("cannot connect to {}", config.rpc_url))
}

async fn print_output(output: OutputReceiver) {
    let mut lines = output.into_stream();
    while let Some(notification) = lines.next().await {
        println!("{notification}");
    }
}
