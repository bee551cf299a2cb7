//! `copyr` command line: analyze works and maintain the local cache.

use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "copyr", version, about = "Determine the copyright status of literary and musical works")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Log debug output from the metadata sources.
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(commands::run(cli.command)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["copyr", "countries", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_analyze_requires_title_and_author() {
        assert!(Cli::try_parse_from(["copyr", "analyze", "Emma"]).is_err());
        assert!(Cli::try_parse_from(["copyr", "analyze", "Emma", "Jane Austen"]).is_ok());
    }
}
