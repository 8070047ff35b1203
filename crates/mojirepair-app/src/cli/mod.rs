use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "mojirepair",
    version,
    author,
    about = "Find and repair mojibake in a PostgREST places catalogue"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// Supported subcommands. Without one, a full repair run is performed.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the store, repair corrupted titles, and write them back.
    Run(RunArgs),
    /// Sanitize literal values and print the outcome without touching the store.
    Sanitize(SanitizeArgs),
}

#[derive(Debug, Args, Default)]
pub struct RunArgs {
    /// Report fixes without writing them back.
    #[arg(long)]
    pub dry_run: bool,
    /// Records requested per page (overrides `repair.page_size`).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,
    /// Offset of the first page (overrides `repair.start_offset`).
    #[arg(long)]
    pub offset: Option<usize>,
    /// Stop after this many pages.
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Skip the oracle; only dictionary corrections are applied.
    #[arg(long)]
    pub no_oracle: bool,
    /// Sanitize descriptions as well as titles.
    #[arg(long)]
    pub descriptions: bool,
}

#[derive(Debug, Args)]
pub struct SanitizeArgs {
    /// Values to sanitize.
    #[arg(required = true)]
    pub inputs: Vec<String>,
    /// Skip the oracle; only dictionary corrections are applied.
    #[arg(long)]
    pub no_oracle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["mojirepair"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "mojirepair",
            "run",
            "--dry-run",
            "--page-size",
            "50",
            "--no-oracle",
            "-vv",
        ])
        .expect("parse");
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        assert!(args.dry_run);
        assert!(args.no_oracle);
        assert_eq!(args.page_size, Some(50));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(Cli::try_parse_from(["mojirepair", "run", "--page-size", "0"]).is_err());
    }
}
