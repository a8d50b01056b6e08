//! Command-line interface definition for mskpipe
//!
//! This module defines the CLI structure using clap's derive API, providing
//! the producer and consumer entry points.

use clap::{Parser, Subcommand};

/// mskpipe - bridge an MSK topic and an OpenSearch index
///
/// `produce` accepts HTTP payloads and publishes each one synchronously to
/// the configured topic; `consume` reads the topic and writes every record
/// into the configured index, committing offsets only after the write
/// succeeded.
#[derive(Parser, Debug, Clone)]
#[command(name = "mskpipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for mskpipe
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP-to-stream producer
    Produce {
        /// Listen address override (falls back to MSKPIPE_HTTP_ADDR)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run the stream-to-index consumer
    Consume,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_produce_command() {
        let cli = Cli::try_parse_from(["mskpipe", "produce"]).unwrap();
        assert!(matches!(cli.command, Commands::Produce { listen: None }));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_produce_with_listen_override() {
        let cli =
            Cli::try_parse_from(["mskpipe", "produce", "--listen", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Commands::Produce { listen } => {
                assert_eq!(listen.as_deref(), Some("127.0.0.1:9000"));
            }
            other => panic!("expected produce command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_consume_command() {
        let cli = Cli::try_parse_from(["mskpipe", "--verbose", "consume"]).unwrap();
        assert!(matches!(cli.command, Commands::Consume));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_requires_a_command() {
        let result = Cli::try_parse_from(["mskpipe"]);
        assert!(result.is_err());
    }
}
