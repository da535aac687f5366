use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "coloring-book-fulfillment",
    version,
    about = "Generates and delivers custom coloring books for completed orders"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service and the fulfillment worker (default)
    Serve(ServeArgs),
    /// Generate one book in the foreground from an order JSON file
    Generate {
        /// Order JSON in the same shape as `POST /orders`
        #[arg(long)]
        order: PathBuf,
        /// Where to write the PDF
        #[arg(long)]
        out: PathBuf,
        /// Email the finished book instead of only logging the delivery
        #[arg(long)]
        deliver: bool,
    },
    /// Remove stored documents and finished job records older than N days
    Purge {
        #[arg(long, default_value_t = 7)]
        days: u64,
    },
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Overrides BIND_ADDRESS
    #[arg(long)]
    pub bind: Option<String>,
    /// Overrides PORT
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Serve(ServeArgs::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["coloring-book-fulfillment"]).unwrap();
        assert_eq!(cli.command(), Command::Serve(ServeArgs::default()));
    }

    #[test]
    fn serve_flags_override_address() {
        let cli = Cli::try_parse_from(["coloring-book-fulfillment", "serve", "--bind", "127.0.0.1", "--port", "8080"])
            .unwrap();
        assert_eq!(
            cli.command(),
            Command::Serve(ServeArgs {
                bind: Some("127.0.0.1".to_string()),
                port: Some(8080),
            })
        );
    }

    #[test]
    fn generate_requires_order_and_output() {
        assert!(Cli::try_parse_from(["coloring-book-fulfillment", "generate", "--order", "o.json"]).is_err());

        let cli = Cli::try_parse_from([
            "coloring-book-fulfillment",
            "generate",
            "--order",
            "o.json",
            "--out",
            "book.pdf",
            "--deliver",
        ])
        .unwrap();
        assert_eq!(
            cli.command(),
            Command::Generate {
                order: PathBuf::from("o.json"),
                out: PathBuf::from("book.pdf"),
                deliver: true,
            }
        );
    }

    #[test]
    fn purge_defaults_to_a_week() {
        let cli = Cli::try_parse_from(["coloring-book-fulfillment", "purge"]).unwrap();
        assert_eq!(cli.command(), Command::Purge { days: 7 });
    }
}
