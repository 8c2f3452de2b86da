//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// makerstock - browse, borrow and return makerspace components
#[derive(Parser, Debug)]
#[command(name = "makerstock")]
#[command(about = "Makerspace inventory from the terminal")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show live stock, grouped by case
    Stock {
        /// Only show components or cases containing this text
        #[arg(long, short)]
        search: Option<String>,
        /// Show cached stock without contacting the backend
        #[arg(long, conflicts_with = "refresh")]
        cached_only: bool,
        /// Ignore the cache and fetch now
        #[arg(long)]
        refresh: bool,
    },
    /// List storage cases
    Cases {
        /// Also list each case's components
        #[arg(long)]
        components: bool,
    },
    /// List the components stored in a case
    Components {
        #[arg(value_name = "CASE")]
        case_name: String,
    },
    /// Show what a user has borrowed
    Holdings {
        /// User ID (defaults to the last one used)
        #[arg(long)]
        user: Option<String>,
    },
    /// Borrow components from a case
    Borrow {
        #[arg(long = "case", value_name = "CASE")]
        case_name: String,
        #[arg(long)]
        component: String,
        /// Whole number of items, at least 1
        #[arg(long, allow_hyphen_values = true)]
        quantity: String,
        /// User ID (defaults to the last one used)
        #[arg(long)]
        user: Option<String>,
    },
    /// Return borrowed components
    Return {
        #[arg(long)]
        component: String,
        /// Whole number of items, at least 1
        #[arg(long, allow_hyphen_values = true)]
        quantity: String,
        /// User ID (defaults to the last one used)
        #[arg(long)]
        user: Option<String>,
    },
    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Drop one cached key, or everything
    Clear {
        #[arg(value_name = "KEY")]
        key: Option<String>,
    },
    /// List cached keys with their age
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_defaults() {
        let cli = Cli::parse_from(["makerstock", "stock"]);
        match cli.command {
            Command::Stock {
                search,
                cached_only,
                refresh,
            } => {
                assert!(search.is_none());
                assert!(!cached_only);
                assert!(!refresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn test_cached_only_conflicts_with_refresh() {
        let result = Cli::try_parse_from(["makerstock", "stock", "--cached-only", "--refresh"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_borrow_keeps_quantity_as_typed() {
        let cli = Cli::parse_from([
            "makerstock",
            "borrow",
            "--case",
            "CaseA",
            "--component",
            "Servo",
            "--quantity",
            "2.5",
        ]);
        match cli.command {
            Command::Borrow {
                case_name,
                quantity,
                user,
                ..
            } => {
                assert_eq!(case_name, "CaseA");
                assert_eq!(quantity, "2.5");
                assert!(user.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_negative_quantity_reaches_validation() {
        let cli = Cli::try_parse_from([
            "makerstock",
            "return",
            "--component",
            "Servo",
            "--quantity",
            "-1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Return { quantity, .. } if quantity == "-1"));
    }

    #[test]
    fn test_log_dir_is_global() {
        let cli = Cli::parse_from(["makerstock", "cache", "show", "--log-dir", "/tmp/logs"]);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Show
            }
        ));
    }

    #[test]
    fn test_borrow_requires_case() {
        let result = Cli::try_parse_from([
            "makerstock",
            "borrow",
            "--component",
            "Servo",
            "--quantity",
            "1",
        ]);
        assert!(result.is_err());
    }
}
