use clap::Parser;
use std::path::PathBuf;

pub mod cleanup;
pub mod deploy;

#[derive(Parser, Debug)]
#[command(
    name = "dockhand",
    version,
    about = "Deploy a containerized web app to a single host behind nginx"
)]
pub struct Cli {
    /// Tear down the deployed container, image, nginx site and app directory
    #[arg(long)]
    pub cleanup: bool,

    /// Path to dockhand.toml (optional prompt defaults and remote settings)
    #[arg(short, long, default_value = "dockhand.toml")]
    pub config: PathBuf,

    /// Directory for the dated log file (overrides local.log_dir)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_deploy() {
        let cli = Cli::try_parse_from(["dockhand"]).expect("parse");
        assert!(!cli.cleanup);
        assert_eq!(cli.config, PathBuf::from("dockhand.toml"));
        assert!(cli.log_dir.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parses_cleanup_and_verbosity() {
        let cli = Cli::try_parse_from(["dockhand", "--cleanup", "-vv", "--log-dir", "/tmp/logs"])
            .expect("parse");
        assert!(cli.cleanup);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["dockhand", "--force"]).is_err());
    }
}
