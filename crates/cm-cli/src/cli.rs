//! Command-line arguments

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cm_models::material::SupplyStatus;
use cm_models::phase::Phase;

/// Work order records for a furniture workshop
#[derive(Parser, Debug)]
#[command(name = "commesse", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the storage directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List work orders
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Show the archive instead of active work orders
        #[arg(long)]
        archived: bool,
    },
    /// Show one work order
    Show {
        id: String,
        #[arg(long, value_enum, default_value_t = Tab::Info)]
        tab: Tab,
    },
    /// Progress board of active work orders
    Board {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Create a work order
    New {
        name: String,
        #[command(flatten)]
        fields: WorkOrderArgs,
    },
    /// Change work order fields
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: WorkOrderArgs,
    },
    /// Move a work order to the archive
    Archive { id: String },
    /// Move an archived work order back to the active list
    Restore { id: String },
    /// Delete a work order permanently
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Invoices of a work order
    #[command(subcommand)]
    Invoice(InvoiceCommand),
    /// Furniture items of a work order
    #[command(subcommand)]
    Item(ItemCommand),
    /// Material orders of a furniture item
    #[command(subcommand)]
    Order(OrderCommand),
    /// Lines of a material order
    #[command(subcommand)]
    Material(MaterialCommand),
    /// Documents of a work order or furniture item
    #[command(subcommand)]
    Doc(DocCommand),
    /// Report which stored layout was found and upgraded
    Migrate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Info,
    Invoices,
    Items,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Match name, client, architect or quote number
    #[arg(short, long)]
    pub search: Option<String>,
    /// Only work orders in this phase
    #[arg(short, long)]
    pub phase: Option<Phase>,
}

/// Optional work order fields; a date or amount flag without a value clears it
#[derive(Args, Debug, Clone, Default)]
pub struct WorkOrderArgs {
    #[arg(long)]
    pub phase: Option<Phase>,
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long, num_args = 0..=1)]
    pub installation_date: Option<Option<NaiveDate>>,

    #[arg(long)]
    pub client: Option<String>,
    #[arg(long)]
    pub tax_id: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub client_note: Option<String>,

    #[arg(long)]
    pub architect: Option<String>,
    #[arg(long)]
    pub architect_phone: Option<String>,
    #[arg(long)]
    pub architect_note: Option<String>,

    #[arg(long)]
    pub quote_number: Option<String>,
    #[arg(long, num_args = 0..=1)]
    pub quote_date: Option<Option<NaiveDate>>,
    #[arg(long, num_args = 0..=1)]
    pub quote_amount: Option<Option<f64>>,
}

#[derive(Subcommand, Debug)]
pub enum InvoiceCommand {
    Add {
        id: String,
        #[command(flatten)]
        fields: InvoiceArgs,
    },
    Update {
        id: String,
        invoice: String,
        #[command(flatten)]
        fields: InvoiceArgs,
    },
    /// Mark paid; the payment date defaults to today
    Pay { id: String, invoice: String },
    Unpay { id: String, invoice: String },
    Remove { id: String, invoice: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct InvoiceArgs {
    #[arg(long)]
    pub number: Option<String>,
    #[arg(long, num_args = 0..=1)]
    pub date: Option<Option<NaiveDate>>,
    #[arg(long, num_args = 0..=1)]
    pub amount: Option<Option<f64>>,
    /// Share of the work order total, 0-100
    #[arg(long, num_args = 0..=1)]
    pub percentage: Option<Option<f64>>,
    #[arg(long, num_args = 0..=1)]
    pub payment_date: Option<Option<NaiveDate>>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    Add {
        id: String,
        #[command(flatten)]
        fields: ItemArgs,
    },
    Update {
        id: String,
        item: String,
        #[command(flatten)]
        fields: ItemArgs,
    },
    Remove { id: String, item: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ItemArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub phase: Option<Phase>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    Add {
        id: String,
        item: String,
        #[command(flatten)]
        fields: OrderArgs,
    },
    Update {
        id: String,
        item: String,
        order: String,
        #[command(flatten)]
        fields: OrderArgs,
    },
    Remove {
        id: String,
        item: String,
        order: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct OrderArgs {
    #[arg(long)]
    pub supplier: Option<String>,
    #[arg(long, num_args = 0..=1)]
    pub order_date: Option<Option<NaiveDate>>,
    /// da-ordinare, ordinato or consegnato
    #[arg(long)]
    pub status: Option<SupplyStatus>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum MaterialCommand {
    Add {
        id: String,
        item: String,
        order: String,
        #[command(flatten)]
        fields: LineArgs,
    },
    Update {
        id: String,
        item: String,
        order: String,
        line: String,
        #[command(flatten)]
        fields: LineArgs,
    },
    Remove {
        id: String,
        item: String,
        order: String,
        line: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct LineArgs {
    #[arg(long)]
    pub material: Option<String>,
    #[arg(long)]
    pub spec: Option<String>,
    #[arg(long)]
    pub quantity: Option<String>,
    #[arg(long)]
    pub status: Option<SupplyStatus>,
}

/// Selects a work order, or one of its items with `--item`
#[derive(Args, Debug, Clone)]
pub struct DocTarget {
    pub id: String,
    #[arg(long)]
    pub item: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum DocCommand {
    Add {
        #[command(flatten)]
        target: DocTarget,
        category: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List one category, or every category when omitted
    List {
        #[command(flatten)]
        target: DocTarget,
        category: Option<String>,
    },
    Remove {
        #[command(flatten)]
        target: DocTarget,
        category: String,
        /// Position as shown by `doc list`
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
    },
    Rename {
        #[command(flatten)]
        target: DocTarget,
        category: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
        name: String,
    },
    /// Open with the system viewer
    Open {
        #[command(flatten)]
        target: DocTarget,
        category: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
    },
    Download {
        #[command(flatten)]
        target: DocTarget,
        category: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
        /// Destination directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_optional_values_clear() {
        let cli = Cli::parse_from([
            "commesse",
            "set",
            "abc",
            "--installation-date",
            "--quote-date",
            "2024-03-01",
            "--phase",
            "in lavorazione",
        ]);
        match cli.command {
            Command::Set { id, fields, .. } => {
                assert_eq!(id, "abc");
                assert_eq!(fields.installation_date, Some(None));
                assert_eq!(
                    fields.quote_date,
                    Some(NaiveDate::from_ymd_opt(2024, 3, 1))
                );
                assert_eq!(fields.phase, Some(Phase::InProduction));
                assert_eq!(fields.quote_amount, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_doc_positions_start_at_one() {
        assert!(Cli::try_parse_from(["commesse", "doc", "remove", "abc", "disegni", "0"]).is_err());
        let cli = Cli::try_parse_from([
            "commesse", "doc", "open", "abc", "--item", "m1", "disegni", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Doc(DocCommand::Open {
                target, position, ..
            }) => {
                assert_eq!(target.item.as_deref(), Some("m1"));
                assert_eq!(position, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
