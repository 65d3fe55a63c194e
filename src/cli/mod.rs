//! CLI command handlers
//!
//! Argument parsing, turn input parsing, command routing and output.

pub mod args;
pub mod input;
pub mod output;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;

/// Log filter for a `-v` count
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,reqwest=debug", // -vvv shows everything including dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_log_levels() {
        assert_eq!(get_log_level(0), "info");
        assert_eq!(get_log_level(1), "debug");
        assert!(get_log_level(5).starts_with("trace"));
    }

    #[test]
    fn test_resume_requires_a_decision() {
        assert!(Cli::try_parse_from(["fitpal", "resume"]).is_err());
        assert!(Cli::try_parse_from(["fitpal", "resume", "--approve", "--reject"]).is_err());
        assert!(Cli::try_parse_from(["fitpal", "resume", "--reject"]).is_ok());
    }

    #[test]
    fn test_log_accepts_repeated_items() {
        let cli = Cli::try_parse_from([
            "fitpal", "log", "-i", "apple:150", "-i", "bread:50", "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Log { items, mode, .. } => {
                assert_eq!(items.len(), 2);
                assert!(mode.auto_approve);
            }
            _ => panic!("expected log"),
        }
    }
}
