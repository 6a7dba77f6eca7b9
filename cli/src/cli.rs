use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "promptd",
    version = promptd_core::version(),
    about = "promptd - keeps permission prompts alive until the last one is dismissed",
)]
pub struct Args {
    /// Specify custom configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Validate configuration and exit without starting
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Use default configuration and ignore config files
    #[arg(long = "defaults")]
    pub use_defaults: bool,

    /// Close every prompt after this many milliseconds, as if the user answered it
    #[arg(long = "auto-dismiss", value_name = "MS")]
    pub auto_dismiss_ms: Option<u64>,

    /// Only log info and above
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log everything, including trace output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from(["promptd", "-c", "/tmp/p.yaml", "--auto-dismiss", "250", "-v"]);
        assert_eq!(args.config_path, Some(PathBuf::from("/tmp/p.yaml")));
        assert_eq!(args.auto_dismiss_ms, Some(250));
        assert!(args.verbose);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["promptd", "-q", "-v"]).is_err());
    }
}
