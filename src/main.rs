use billsplit::application::bills::BillService;
use billsplit::application::settlement::SettlementCoordinator;
use billsplit::application::split_engine::SplitEngine;
use billsplit::config::Settings;
use billsplit::domain::ids::{MemberId, ParticipantId};
use billsplit::domain::ports::{AttemptStoreBox, BillStoreBox, BillStoreFactory};
use billsplit::domain::split::{SplitMode, SplitState};
use billsplit::error::ProcessorError;
use billsplit::infrastructure::in_memory::{InMemoryAttemptStore, InMemoryBillStore};
use billsplit::infrastructure::simulated::SimulatedProcessor;
use billsplit::interfaces::csv::attempt_writer::AttemptWriter;
use billsplit::interfaces::csv::share_reader::ShareReader;
use billsplit::interfaces::csv::share_writer::ShareWriter;
use chrono::{Days, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON settings file (split, settlement and bill policies)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a split, apply edits to it and print the shares as CSV
    Split(SplitArgs),
    /// Create a bill and start a payment against the simulated processor
    Pay(PayArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Percentage,
    Fixed,
}

impl From<ModeArg> for SplitMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Percentage => SplitMode::Percentage,
            ModeArg::Fixed => SplitMode::Fixed,
        }
    }
}

#[derive(Args)]
struct SplitArgs {
    /// Bill total
    #[arg(long)]
    total: Decimal,

    /// Members in display order, comma separated
    #[arg(long, value_delimiter = ',')]
    members: Vec<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::Percentage)]
    mode: ModeArg,

    /// Start from a custom split read from CSV instead of the equal split
    #[arg(long)]
    input: Option<PathBuf>,

    /// Exclude a member (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Set a member's value, e.g. `--set alice=40` (repeatable)
    #[arg(long = "set", value_parser = parse_assignment)]
    set: Vec<(String, Decimal)>,

    /// Drag a member by a delta, e.g. `--drag bob=-10` (repeatable)
    #[arg(long = "drag", value_parser = parse_assignment)]
    drag: Vec<(String, Decimal)>,
}

#[derive(Args)]
struct PayArgs {
    /// Member collecting the bill
    #[arg(long)]
    owner: String,

    /// Bill total
    #[arg(long)]
    total: Decimal,

    /// Members sharing the bill besides the owner, comma separated
    #[arg(long, value_delimiter = ',')]
    members: Vec<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::Percentage)]
    mode: ModeArg,

    /// Due date (YYYY-MM-DD); defaults to 30 days from today
    #[arg(long)]
    due: Option<NaiveDate>,

    /// Member paying
    #[arg(long)]
    payer: String,

    /// Pay these members' shares together as one charge, comma separated
    #[arg(long, value_delimiter = ',')]
    group: Vec<String>,

    /// Make the simulated processor decline the charge
    #[arg(long)]
    decline: bool,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, Decimal), String> {
    let (member, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MEMBER=VALUE, got `{}`", raw))?;
    let value = value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid value `{}`: {}", value, e))?;
    Ok((member.trim().to_string(), value))
}

struct Stores {
    bills: BillStoreFactory,
    attempts: AttemptStoreBox,
}

fn in_memory_stores() -> Stores {
    let bills = InMemoryBillStore::new();
    Stores {
        bills: Box::new(move || Box::new(bills.clone()) as BillStoreBox),
        attempts: Box::new(InMemoryAttemptStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    use billsplit::infrastructure::rocksdb::RocksDBStore;

    let Some(path) = db_path else {
        return Ok(in_memory_stores());
    };
    let store = RocksDBStore::open(path)?;
    let attempts: AttemptStoreBox = Box::new(store.clone());
    Ok(Stores {
        bills: Box::new(move || Box::new(store.clone()) as BillStoreBox),
        attempts,
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn run_split(settings: &Settings, args: SplitArgs) -> Result<()> {
    let engine = SplitEngine::new(settings.split.clone());
    let mode = SplitMode::from(args.mode);

    let mut state = match &args.input {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            let shares = ShareReader::new(file)
                .shares()
                .collect::<billsplit::error::Result<Vec<_>>>()?;
            SplitState {
                mode,
                custom: true,
                total: args.total,
                shares,
            }
        }
        None => {
            if args.members.is_empty() {
                return Err(miette!("either --members or --input is required"));
            }
            let members: Vec<MemberId> = args.members.iter().map(|m| MemberId::new(m.trim())).collect();
            engine.compute_split(args.total, mode, &members)
        }
    };

    for member in &args.exclude {
        state = engine.set_inclusion(&state, &MemberId::new(member.as_str()), false);
    }
    for (member, value) in &args.set {
        state = engine.set_member_value(&state, &MemberId::new(member.as_str()), *value);
    }
    for (member, delta) in &args.drag {
        state = engine.drag_adjust(&state, &MemberId::new(member.as_str()), *delta);
    }

    if !state.is_balanced(engine.config().tolerance) {
        eprintln!(
            "WARNING: split is unbalanced ({}% allocated)",
            state.included_sum().round_dp(2)
        );
    }

    let stdout = io::stdout();
    ShareWriter::new(stdout.lock()).write_split(&state)?;
    Ok(())
}

async fn run_pay(settings: &Settings, args: PayArgs) -> Result<()> {
    let stores = open_stores(args.db_path.as_deref())?;
    let processor = SimulatedProcessor::new();
    if args.decline {
        processor
            .fail_next_create(ProcessorError::Declined {
                code: "card_declined".to_string(),
                message: "Your card was declined.".to_string(),
            })
            .await;
    }

    let bills = BillService::new(
        (stores.bills)(),
        SplitEngine::new(settings.split.clone()),
        settings.bills.clone(),
        settings.settlement.currency.clone(),
    );
    let coordinator = SettlementCoordinator::new(
        (stores.bills)(),
        stores.attempts,
        Box::new(processor),
        settings.settlement.clone(),
    );

    let owner = MemberId::new(args.owner.as_str());
    let members: Vec<MemberId> = args.members.iter().map(|m| MemberId::new(m.trim())).collect();
    let due = match args.due {
        Some(due) => due,
        None => Utc::now()
            .date_naive()
            .checked_add_days(Days::new(30))
            .ok_or_else(|| miette!("due date out of range"))?,
    };
    let bill = bills
        .create_bill(&owner, args.total, due, &members, args.mode.into())
        .await?;

    let payer = MemberId::new(args.payer.as_str());
    let result = if args.group.is_empty() {
        coordinator
            .pay_now(&payer, &bill.participant_id(&payer))
            .await
    } else {
        let participants: Vec<ParticipantId> = args
            .group
            .iter()
            .map(|m| bill.participant_id(&MemberId::new(m.trim())))
            .collect();
        coordinator.pay_now_group(&payer, &participants).await
    };

    match result {
        Ok(start) => eprintln!(
            "Payment started: intent {} for {} (fee {})",
            start.intent_id, start.total_cents, start.fee_cents
        ),
        Err(e) => eprintln!("Payment error: {}", e.user_message()),
    }

    let ledger = coordinator.ledger().await?;
    let stdout = io::stdout();
    AttemptWriter::new(stdout.lock()).write_attempts(&ledger)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Split(args) => run_split(&settings, args),
        Command::Pay(args) => run_pay(&settings, args).await,
    }
}
