#![allow(clippy::result_large_err)]

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use dues_ledger::{
    config::{database, load_default_config, settings::AppConfig},
    core::{
        assistance::{self, NewAssistanceCase},
        catalog,
        collaborators::{ConfiguredAssistanceAmounts, StaticMemberDirectory, SystemClock},
        generation::{self, GenerationRequest},
        payment::{self, PaymentRequest},
        payout,
        period::Period,
        report,
    },
    entities::{EventType, PaymentMethod},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dues-ledger", version, about = "Member dues and assistance ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables and seed the due type catalog from the configuration
    Init,
    /// Generate the obligations of a period
    Generate {
        /// Period as YYYY-MM
        #[arg(long)]
        period: Period,
        /// Due type ids to generate; repeat for several
        #[arg(long = "due-type", required = true)]
        due_types: Vec<i64>,
    },
    /// Remove the untouched obligations of a period
    Rollback {
        #[arg(long)]
        period: Period,
    },
    /// Counts and totals of a period
    Summary {
        #[arg(long)]
        period: Period,
    },
    /// Show a member's balances and obligations
    Ledger {
        #[arg(long)]
        member: i64,
    },
    /// Record a payment from a member
    Pay {
        #[arg(long)]
        member: i64,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, value_enum, default_value_t = Method::Cash)]
        method: Method,
        #[arg(long)]
        reference: Option<String>,
    },
    /// Use a member's credit against their open obligations
    ApplyCredit {
        #[arg(long)]
        member: i64,
    },
    /// Assistance case lifecycle
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },
    /// Show, and optionally execute, the payout of an assistance case
    Payout {
        #[arg(long = "case")]
        case_id: i64,
        #[arg(long)]
        execute: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CaseAction {
    /// Open a pending case
    Open {
        #[arg(long)]
        member: i64,
        #[arg(long, value_enum)]
        event: Event,
        #[arg(long = "due-type")]
        due_type: i64,
        /// Event date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        description: Option<String>,
    },
    /// Bind a pending case to a period
    Assign {
        #[arg(long = "case")]
        case_id: i64,
        #[arg(long)]
        period: Period,
    },
    /// Cancel a pending case
    Cancel {
        #[arg(long = "case")]
        case_id: i64,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Method {
    Cash,
    BankTransfer,
    Cheque,
    MobileMoney,
}

impl From<Method> for PaymentMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Cash => Self::Cash,
            Method::BankTransfer => Self::BankTransfer,
            Method::Cheque => Self::Cheque,
            Method::MobileMoney => Self::MobileMoney,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Event {
    Birth,
    ChildMarriage,
    FamilyBereavement,
    HallCelebration,
    Other,
}

impl From<Event> for EventType {
    fn from(event: Event) -> Self {
        match event {
            Event::Birth => Self::Birth,
            Event::ChildMarriage => Self::ChildMarriage,
            Event::FamilyBereavement => Self::FamilyBereavement,
            Event::HallCelebration => Self::HallCelebration,
            Event::Other => Self::Other,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    run(cli.command, &db, &app_config).await
}

async fn run(command: Command, db: &DatabaseConnection, config: &AppConfig) -> Result<()> {
    let clock = SystemClock;

    match command {
        Command::Init => {
            let created = catalog::seed_catalog(db, config).await?;
            info!("Database ready, {} due types seeded", created);
            for due_type in catalog::list_due_types(db, true).await? {
                println!(
                    "#{} {} ({:?}) {}{}",
                    due_type.id,
                    due_type.name,
                    due_type.category,
                    report::format_amount(due_type.amount),
                    if due_type.active { "" } else { " [inactive]" }
                );
            }
        }
        Command::Generate { period, due_types } => {
            let members = StaticMemberDirectory::from_config(config);
            let request = GenerationRequest {
                period,
                due_type_ids: due_types,
            };
            let result =
                generation::generate_obligations(db, &request, &members, &config.settings).await?;
            println!("{}", report::format_generation_result(&result));
        }
        Command::Rollback { period } => {
            let removed = generation::remove_unpaid_obligations(db, period).await?;
            println!("Removed {removed} unpaid obligations for {period}");
        }
        Command::Summary { period } => {
            let summary = generation::period_summary(db, period, &clock).await?;
            println!("Period {period}");
            println!("{}", report::format_period_summary(&summary));
        }
        Command::Ledger { member } => {
            let statement = report::member_statement(db, member, &clock).await?;
            println!("{}", report::format_member_statement(&statement));
        }
        Command::Pay {
            member,
            amount,
            method,
            reference,
        } => {
            let mut request = PaymentRequest::new(member, amount, method.into());
            request.reference = reference;
            let outcome = payment::apply_payment(db, request, &clock).await?;
            println!("{}", report::format_payment_outcome(&outcome));
        }
        Command::ApplyCredit { member } => {
            match payment::apply_credit(db, member, &clock).await? {
                Some(outcome) => println!("{}", report::format_payment_outcome(&outcome)),
                None => println!("No credit to apply for member {member}"),
            }
        }
        Command::Case { action } => run_case(action, db, config).await?,
        Command::Payout { case_id, execute } => {
            let breakdown = payout::compute_payout(db, case_id, &clock).await?;
            println!("{}", report::format_payout_breakdown(&breakdown));
            if execute {
                let recorded = payout::execute_payout(db, case_id, &clock).await?;
                println!(
                    "Payout #{} executed: {} disbursed",
                    recorded.id,
                    report::format_amount(recorded.net_amount)
                );
            }
        }
    }
    Ok(())
}

async fn run_case(action: CaseAction, db: &DatabaseConnection, config: &AppConfig) -> Result<()> {
    match action {
        CaseAction::Open {
            member,
            event,
            due_type,
            date,
            description,
        } => {
            let amounts = ConfiguredAssistanceAmounts::resolve(db, config).await?;
            let case = assistance::create_assistance_case(
                db,
                NewAssistanceCase {
                    member_id: member,
                    event_type: event.into(),
                    due_type_id: due_type,
                    event_date: date,
                    description,
                },
                &amounts,
            )
            .await?;
            println!(
                "Case #{} opened for member {}: {}",
                case.id,
                case.member_id,
                report::format_amount(case.fixed_amount)
            );
        }
        CaseAction::Assign { case_id, period } => {
            let case =
                assistance::assign_assistance_to_period(db, case_id, period, &SystemClock).await?;
            println!("Case #{} assigned to {}", case.id, period);
        }
        CaseAction::Cancel { case_id } => {
            assistance::cancel_assistance_case(db, case_id).await?;
            println!("Case #{case_id} cancelled");
        }
    }
    Ok(())
}
