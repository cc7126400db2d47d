//! Command-line interface for dialwatch
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Alarm panel dial-out monitor
#[derive(Parser, Debug)]
#[command(
    name = "dialwatch",
    version,
    about = "Detects alarm panel dial-outs on a phone line and notifies a webhook"
)]
pub struct Cli {
    /// Subcommand to execute (default: listen)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: digits and delivery attempts, -vv: per-window tracing)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration such as `100ms`, `2s` or `1m30s`.
///
/// Bare numbers are milliseconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor the modem line and deliver alarm notifications (default)
    Listen {
        /// Serial device of the voice modem (overrides config)
        #[arg(long, value_name = "DEVICE")]
        port: Option<String>,

        /// Webhook URL (overrides config)
        #[arg(long, value_name = "URL")]
        webhook_url: Option<String>,
    },

    /// Run detection over a WAV recording and print what was found
    Analyze {
        /// WAV file to analyze
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Also deliver detected alarms to the configured webhook
        #[arg(long)]
        deliver: bool,
    },

    /// Synthesize a DTMF dial sequence into a WAV file
    Generate {
        /// Keypad symbols to dial (0-9, A-D, *, #; ',' inserts a pause)
        #[arg(value_name = "SYMBOLS")]
        symbols: String,

        /// Output WAV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Duration of each tone (e.g., 100ms)
        #[arg(
            long,
            value_name = "DURATION",
            default_value = "100ms",
            value_parser = parse_duration
        )]
        tone: Duration,

        /// Silence after each tone (e.g., 100ms)
        #[arg(
            long,
            value_name = "DURATION",
            default_value = "100ms",
            value_parser = parse_duration
        )]
        gap: Duration,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file, defaults and environment) as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["dialwatch"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["dialwatch", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_listen_overrides() {
        let cli = Cli::try_parse_from([
            "dialwatch",
            "listen",
            "--port",
            "/dev/ttyUSB0",
            "--webhook-url",
            "https://example.net/hook",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Listen { port, webhook_url }) => {
                assert_eq!(port.as_deref(), Some("/dev/ttyUSB0"));
                assert_eq!(webhook_url.as_deref(), Some("https://example.net/hook"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["dialwatch", "analyze", "line.wav", "--deliver"]).unwrap();
        match cli.command {
            Some(Commands::Analyze { input, deliver }) => {
                assert_eq!(input, PathBuf::from("line.wav"));
                assert!(deliver);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["dialwatch", "generate", "1234#", "-o", "out.wav"]).unwrap();
        match cli.command {
            Some(Commands::Generate {
                symbols,
                output,
                tone,
                gap,
            }) => {
                assert_eq!(symbols, "1234#");
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(tone, Duration::from_millis(100));
                assert_eq!(gap, Duration::from_millis(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generate_durations() {
        let cli = Cli::try_parse_from([
            "dialwatch", "generate", "5", "-o", "five.wav", "--tone", "150ms", "--gap", "1s",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Generate { tone, gap, .. }) => {
                assert_eq!(tone, Duration::from_millis(150));
                assert_eq!(gap, Duration::from_secs(1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("40").unwrap(), Duration::from_millis(40));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["dialwatch", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
        let cli = Cli::try_parse_from(["dialwatch", "--config", "/tmp/d.toml", "config", "path"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.toml")));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["dialwatch", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
