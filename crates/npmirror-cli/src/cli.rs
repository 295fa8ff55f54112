use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use npmirror_config::remote::Policy;

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable the progress spinner
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Command-line spelling of a remote's content policy.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    Immediate,
    OnDemand,
    Streamed,
}

impl From<PolicyArg> for Policy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Immediate => Policy::Immediate,
            PolicyArg::OnDemand => Policy::OnDemand,
            PolicyArg::Streamed => Policy::Streamed,
        }
    }
}

/// Options shared by `sync` and `plan` for picking what to walk.
#[derive(clap::Args, Clone, Debug)]
pub struct Selection {
    /// Configured remote to use (default: the first one)
    pub remote: Option<String>,

    /// Packument URL of the root package, overriding the remote's
    #[arg(long, value_hint = ValueHint::Url)]
    pub url: Option<String>,

    /// Registry base URL used to resolve dependencies
    #[arg(long, value_hint = ValueHint::Url)]
    pub registry: Option<String>,

    /// Only mirror the root package, not its dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Maximum number of packuments fetched at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror a package tree into the store
    #[command(visible_alias = "s")]
    Sync {
        #[command(flatten)]
        selection: Selection,

        /// Content policy for this run
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Replace the previously mirrored set instead of adding to it
        #[arg(long)]
        mirror: bool,

        /// Check that each tarball exists before declaring it
        #[arg(long)]
        probe: bool,

        /// Store directory, overriding the configuration
        #[arg(long, value_hint = ValueHint::DirPath)]
        store: Option<String>,
    },

    /// Walk a package tree and print what would be mirrored
    #[command(visible_alias = "p")]
    Plan {
        #[command(flatten)]
        selection: Selection,
    },

    /// Print the storage path of a package tarball
    #[command(arg_required_else_help = true)]
    Path {
        /// Package name
        name: String,

        /// Package version
        version: String,
    },

    /// Generate a default configuration file
    #[clap(name = "defconfig")]
    DefConfig,

    /// Print the active configuration to stdout
    Config,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let args = Args::parse_from([
            "npmirror",
            "-v",
            "sync",
            "npmjs",
            "--no-deps",
            "--policy",
            "on-demand",
            "--mirror",
        ]);
        assert_eq!(args.verbose, 1);

        let Commands::Sync {
            selection,
            policy,
            mirror,
            probe,
            store,
        } = args.command
        else {
            panic!("expected sync");
        };
        assert_eq!(selection.remote.as_deref(), Some("npmjs"));
        assert!(selection.no_deps);
        assert!(matches!(policy, Some(PolicyArg::OnDemand)));
        assert!(mirror);
        assert!(!probe);
        assert!(store.is_none());
    }
}
