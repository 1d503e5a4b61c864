use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::application::{self, BalanceService, MonthlyReport, OrderService};
use crate::domain::{
    Cents, JournalEntry, OrderId, Reservation, ServiceId, UserBalance, UserId, format_cents,
    parse_cents,
};
use crate::io::export;
use crate::settings::{DatabaseSettings, Settings};
use crate::storage::Repository;
use crate::telemetry;

/// Billing - user balances and two-phase purchase reservations
#[derive(Parser)]
#[command(name = "billing")]
#[command(about = "User balances with an audited journal and two-phase purchase reservations")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML); defaults to ./billing.toml when present
    #[arg(short, long)]
    pub config: Option<String>,

    /// Database file path, overriding the configured url
    #[arg(short, long)]
    pub database: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Show a user's balance
    Balance {
        user: UserId,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Credit a user's balance (creates the user on first top-up)
    TopUp {
        user: UserId,

        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Move money from one user to another
    Transfer {
        /// Sending user
        from: UserId,

        /// Receiving user (created if unknown)
        to: UserId,

        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// List a user's journal
    Transactions {
        user: UserId,

        /// Sort field: amount or created, prefix with '-' for descending
        #[arg(long, default_value = "created", allow_hyphen_values = true)]
        sort: String,

        #[arg(short, long, default_value = "100")]
        limit: i64,

        #[arg(long, default_value = "0")]
        offset: i64,

        /// Output format: table, csv, json
        #[arg(long, default_value = "table", value_parser = ["table", "csv", "json"])]
        format: String,
    },

    /// Hold funds for an order
    Reserve(ReservationArgs),

    /// Confirm a reserved order
    Confirm(ReservationArgs),

    /// Reject a reserved order and refund its cost
    Reject(ReservationArgs),

    /// Show a reservation
    Reservation {
        #[arg(long)]
        order: OrderId,

        #[arg(long)]
        user: UserId,

        #[arg(long)]
        service: ServiceId,
    },

    /// Monthly revenue per service
    Report {
        year: i32,

        month: u32,

        /// Output format: table, csv, json
        #[arg(long, default_value = "table", value_parser = ["table", "csv", "json"])]
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Args)]
pub struct ReservationArgs {
    #[arg(long)]
    pub order: OrderId,

    #[arg(long)]
    pub user: UserId,

    #[arg(long)]
    pub service: ServiceId,

    /// Cost (e.g., "6.00" or "6")
    #[arg(long, allow_hyphen_values = true)]
    pub cost: String,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings =
            Settings::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(path) = &self.database {
            settings.database.url = DatabaseSettings::sqlite(path).url;
        }
        if self.verbose {
            settings.logging.level = "debug".to_string();
        }
        Ok(settings)
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings()?;
        telemetry::init(&settings.logging);

        let repo = match self.command {
            Commands::Init => Repository::init(&settings.database).await?,
            _ => Repository::connect(&settings.database)
                .await
                .context("Failed to open database (run `billing init` first)")?,
        };

        let result = self.command.execute(&repo, &settings.database.url).await;
        repo.close().await;
        result
    }
}

impl Commands {
    async fn execute(self, repo: &Repository, url: &str) -> Result<()> {
        let (balances, orders) = application::services(repo.clone());

        match self {
            Commands::Init => {
                println!("Database initialized: {}", url);
            }

            Commands::Balance { user, json } => {
                let balance = balances.get_balance(user).await?;
                if json {
                    let entry = UserBalance {
                        user_id: user,
                        balance,
                    };
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                } else {
                    println!("User {}: {}", user, format_cents(balance));
                }
            }

            Commands::TopUp { user, amount } => {
                let amount = parse_amount(&amount)?;
                let balance = balances.top_up(user, amount).await?;
                println!(
                    "Topped up {} for user {}, balance: {}",
                    format_cents(amount),
                    user,
                    format_cents(balance)
                );
            }

            Commands::Transfer { from, to, amount } => {
                let amount = parse_amount(&amount)?;
                let balance = balances.transfer(from, to, amount).await?;
                println!(
                    "Transferred {} from user {} to user {}, balance: {}",
                    format_cents(amount),
                    from,
                    to,
                    format_cents(balance)
                );
            }

            Commands::Transactions {
                user,
                sort,
                limit,
                offset,
                format,
            } => {
                run_transactions_command(&balances, user, &sort, limit, offset, &format).await?;
            }

            Commands::Reserve(args) => {
                let cost = parse_amount(&args.cost)?;
                let reservation = orders
                    .reserve(args.order, args.user, args.service, cost)
                    .await?;
                print_reservation(&reservation);
            }

            Commands::Confirm(args) => {
                let cost = parse_amount(&args.cost)?;
                let reservation = orders
                    .confirm(args.order, args.user, args.service, cost)
                    .await?;
                print_reservation(&reservation);
            }

            Commands::Reject(args) => {
                let cost = parse_amount(&args.cost)?;
                let reservation = orders
                    .reject(args.order, args.user, args.service, cost)
                    .await?;
                print_reservation(&reservation);
            }

            Commands::Reservation {
                order,
                user,
                service,
            } => {
                let reservation = orders.get_reservation(order, user, service).await?;
                print_reservation(&reservation);
                println!("  Created:  {}", reservation.created.format("%Y-%m-%d %H:%M:%S"));
                println!("  Updated:  {}", reservation.updated.format("%Y-%m-%d %H:%M:%S"));
            }

            Commands::Report {
                year,
                month,
                format,
                output,
            } => {
                run_report_command(&orders, year, month, &format, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input).context("Invalid amount format. Use '50.00' or '50'")
}

fn print_reservation(reservation: &Reservation) {
    println!(
        "Reservation {}: {} ({})",
        reservation.key,
        reservation.status,
        format_cents(reservation.cost)
    );
}

async fn run_transactions_command(
    service: &BalanceService,
    user: UserId,
    sort: &str,
    limit: i64,
    offset: i64,
    format: &str,
) -> Result<()> {
    let entries = service.list_transactions(user, sort, limit, offset).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        "csv" => {
            export::write_journal_csv(&entries, io::stdout().lock())?;
        }
        _ => print_journal_table(&entries),
    }

    Ok(())
}

fn print_journal_table(entries: &[JournalEntry]) {
    if entries.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!(
        "{:<8} {:<20} {:>12}  {}",
        "ID", "DATE", "AMOUNT", "MESSAGE"
    );
    println!("{}", "-".repeat(72));
    for entry in entries {
        println!(
            "{:<8} {:<20} {:>12}  {}",
            entry.id,
            entry.created.format("%Y-%m-%d %H:%M:%S"),
            format_cents(entry.amount),
            entry.message
        );
    }
}

async fn run_report_command(
    service: &OrderService,
    year: i32,
    month: u32,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    let report = service.report(year, month).await?;

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        "csv" => {
            let rows = export::write_report_csv(&report, writer)?;
            if let Some(path) = output {
                eprintln!("Exported {} services to {}", rows, path);
            }
        }
        "json" => export::write_report_json(&report, writer)?,
        _ => write_report_table(&report, writer)?,
    }

    Ok(())
}

fn write_report_table(report: &MonthlyReport, mut writer: impl Write) -> Result<()> {
    writeln!(writer, "Revenue Report {}", report.id)?;
    writeln!(
        writer,
        "Period: {} to {}",
        report.period_start.format("%Y-%m-%d"),
        report.period_end.format("%Y-%m-%d")
    )?;
    writeln!(writer)?;

    if report.services.is_empty() {
        writeln!(writer, "No confirmed reservations in this period.")?;
        return Ok(());
    }

    writeln!(writer, "{:<12} {:>15}", "SERVICE", "REVENUE")?;
    writeln!(writer, "{}", "-".repeat(28))?;
    for service in &report.services {
        writeln!(
            writer,
            "{:<12} {:>15}",
            service.service_id,
            format_cents(service.total_revenue)
        )?;
    }
    writeln!(writer, "{}", "-".repeat(28))?;
    writeln!(writer, "{:<12} {:>15}", "TOTAL", format_cents(report.total))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reserve_with_negative_cost() {
        let cli = Cli::try_parse_from([
            "billing", "reserve", "--order", "7", "--user", "42", "--service", "3", "--cost",
            "-1",
        ])
        .unwrap();

        match cli.command {
            Commands::Reserve(args) => {
                assert_eq!((args.order, args.user, args.service), (7, 42, 3));
                assert_eq!(args.cost, "-1");
            }
            _ => panic!("expected reserve"),
        }
    }

    #[test]
    fn test_parse_descending_sort() {
        let cli =
            Cli::try_parse_from(["billing", "transactions", "42", "--sort", "-amount"]).unwrap();
        match cli.command {
            Commands::Transactions { sort, limit, .. } => {
                assert_eq!(sort, "-amount");
                assert_eq!(limit, 100);
            }
            _ => panic!("expected transactions"),
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["billing", "report", "2024", "6", "--format", "xml"]).is_err());
        assert!(
            Cli::try_parse_from(["billing", "transactions", "42", "--format", "yaml"]).is_err()
        );

        let cli = Cli::try_parse_from(["billing", "report", "2024", "6", "--format", "csv"]).unwrap();
        match cli.command {
            Commands::Report { format, .. } => assert_eq!(format, "csv"),
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn test_report_table() {
        let report = MonthlyReport::new(
            crate::domain::ReportPeriod::new(2024, 6).unwrap(),
            vec![crate::application::ServiceRevenue {
                service_id: 3,
                total_revenue: 90000,
            }],
        )
        .unwrap();
        let mut out = Vec::new();
        write_report_table(&report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Revenue Report 2024-06\n"));
        assert!(text.contains("900.00"));
    }
}
