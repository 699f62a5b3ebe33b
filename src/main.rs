use clap::Parser;
use tracing_subscriber::EnvFilter;
use vaultsync::cli::{Cli, Commands};

fn main() {
    // Logs go to stderr so they don't interfere with command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VAULTSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { ref desired } => vaultsync::cli::commands::check::execute(&cli, desired),
        Commands::Expand {
            ref category,
            ref tokens,
        } => vaultsync::cli::commands::expand::execute(category, tokens),
        Commands::Diff {
            ref desired,
            ref live,
            report,
        } => vaultsync::cli::commands::diff::execute(&cli, desired, live, report),
        Commands::Apply {
            ref desired,
            ref live,
            ref identities,
            force,
            strict,
        } => vaultsync::cli::commands::apply::execute(
            &cli, desired, live, identities, force, strict,
        ),
        Commands::Audit {
            last,
            ref since,
            ref vault,
        } => vaultsync::cli::commands::audit_cmd::execute(
            &cli,
            last,
            since.as_deref(),
            vault.as_deref(),
        ),
        Commands::Completions { ref shell, ref dir } => {
            vaultsync::cli::commands::completions::execute(shell, dir.as_deref())
        }
        Commands::Version => vaultsync::cli::commands::version::execute(),
    };

    if let Err(e) = result {
        tracing::debug!(kind = e.kind(), "command failed");
        vaultsync::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
