use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use provisioning::HandlerSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Apply provisioning hierarchies to a collaboration tenant", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a hierarchy package to the tenant
    Apply(ApplyArgs),

    /// Describe the contents of a local package
    Show(ShowArgs),

    /// List handler kinds in execution order
    Handlers,

    /// Show the config file location and effective settings
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args)]
pub struct ApplyArgs {
    /// Package path, or absolute url of a package in a document library
    #[arg(value_name = "PATH|URL")]
    pub package: String,

    /// Apply only this sequence
    #[arg(short, long)]
    pub sequence: Option<String>,

    /// Directory to read template assets from instead of the package
    #[arg(long, value_name = "DIR")]
    pub resource_folder: Option<String>,

    /// Handlers to run, comma separated (wins over --exclude-handlers)
    #[arg(long, value_name = "LIST", value_parser = parse_handler_set)]
    pub handlers: Option<HandlerSet>,

    /// Handlers to skip, comma separated
    #[arg(long, value_name = "LIST", value_parser = parse_handler_set)]
    pub exclude_handlers: Option<HandlerSet>,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Tenant root url
    #[arg(long, env = "PROVCTL_TENANT")]
    pub tenant: Option<String>,

    /// Attempts per remote call before giving up
    #[arg(long)]
    pub retries: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run against an in-memory tenant and report what would change
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Default)]
pub struct OverrideArgs {
    /// Allow writing reserved property bag keys
    #[arg(long)]
    pub overwrite_system_properties: bool,

    /// Treat duplicate data rows as unchanged
    #[arg(long)]
    pub ignore_duplicate_rows: bool,

    /// Remove existing navigation nodes first
    #[arg(long)]
    pub clear_navigation: bool,

    /// Provision content types into subsites too
    #[arg(long)]
    pub content_types_to_subwebs: bool,

    /// Provision site columns into subsites too
    #[arg(long)]
    pub fields_to_subwebs: bool,
}

// ============================================================================
// Show
// ============================================================================

#[derive(Args)]
pub struct ShowArgs {
    /// Package path (raw markup or container)
    pub path: PathBuf,

    /// Print the hierarchy as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_handler_set(value: &str) -> Result<HandlerSet, String> {
    value.parse().map_err(|e: provisioning::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use provisioning::HandlerKind;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_parses_handler_lists() {
        let cli = Cli::try_parse_from([
            "provctl",
            "apply",
            "intranet.pnp",
            "--handlers",
            "Fields,Lists",
            "--sequence",
            "main",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        let handlers = args.handlers.unwrap();
        assert!(handlers.contains(HandlerKind::Fields));
        assert!(handlers.contains(HandlerKind::Lists));
        assert_eq!(handlers.len(), 2);
        assert_eq!(args.sequence.as_deref(), Some("main"));
    }

    #[test]
    fn test_apply_rejects_unknown_handler() {
        let result = Cli::try_parse_from(["provctl", "apply", "x.xml", "--handlers", "Bogus"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_override_switches() {
        let cli = Cli::try_parse_from([
            "provctl",
            "apply",
            "x.xml",
            "--ignore-duplicate-rows",
            "--clear-navigation",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.overrides.ignore_duplicate_rows);
        assert!(args.overrides.clear_navigation);
        assert!(!args.overrides.fields_to_subwebs);
    }
}
