use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use wallet_ledger::application::config::{EngineConfig, NegativeBalancePolicy};
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::domain::ports::LedgerStoreBox;
use wallet_ledger::infrastructure::audit::LogAuditLogger;
use wallet_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use wallet_ledger::infrastructure::numbering::UuidDocumentNumbering;
use wallet_ledger::interfaces::csv::balance_writer::BalanceWriter;
use wallet_ledger::interfaces::csv::command_reader::CommandReader;
use wallet_ledger::interfaces::replay::Replay;
use wallet_ledger::interfaces::seed::Seed;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// JSON file with the customers, purchases, stock and staff to start from
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Whether debits may take a wallet below zero
    #[arg(
        long,
        value_enum,
        env = "WALLET_LEDGER_NEGATIVE_BALANCE",
        default_value_t = NegativeBalancePolicy::Allow
    )]
    negative_balance: NegativeBalancePolicy,

    /// Prefix for waybill numbers
    #[arg(long, default_value = "WB")]
    waybill_prefix: String,

    /// Prefix for progress invoice numbers
    #[arg(long, default_value = "INV")]
    invoice_prefix: String,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    use wallet_ledger::infrastructure::rocksdb::RocksDbLedgerStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDbLedgerStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = EngineConfig {
        negative_balance: cli.negative_balance,
        waybill_prefix: cli.waybill_prefix,
        invoice_prefix: cli.invoice_prefix,
    };
    let store = open_store(cli.db_path)?;

    let seed = match cli.seed {
        Some(path) => Seed::from_reader(File::open(path).into_diagnostic()?).into_diagnostic()?,
        None => Seed::default(),
    };
    seed.load(store.as_ref()).await.into_diagnostic()?;

    let engine = LedgerEngine::new(
        store,
        Box::new(LogAuditLogger),
        Box::new(UuidDocumentNumbering::from_config(&config)),
        config,
    );
    let mut replay = Replay::new(engine, seed.actors);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = replay.apply(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let customers = replay.balances().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(&customers).into_diagnostic()?;

    Ok(())
}
