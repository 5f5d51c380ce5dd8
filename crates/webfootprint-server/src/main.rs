use std::net::IpAddr;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use webfootprint_server::cli;

#[derive(Parser)]
#[command(
    name = "webfootprint",
    about = "Webfootprint: map where a web page's content is really served from",
    version,
    after_help = "Run 'webfootprint <command> --help' for details on each command."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP analysis service
    Serve {
        /// Port for the REST API
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: IpAddr,
    },
    /// Analyze one URL and print the footprint report
    Analyze {
        /// Page URL to analyze
        url: String,
        /// Print the raw analysis record as JSON
        #[arg(long)]
        json: bool,
        /// Maximum seconds to wait for the analysis to finish
        #[arg(long, default_value = "120")]
        wait_secs: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, bind } => {
            cli::init_tracing(if cli.verbose {
                "webfootprint=debug"
            } else {
                "webfootprint=info"
            });
            cli::serve::run(bind, port).await
        }
        Commands::Analyze {
            url,
            json,
            wait_secs,
        } => {
            // Keep the report readable: pipeline logs stay quiet by default.
            cli::init_tracing(if cli.verbose {
                "webfootprint=debug"
            } else {
                "webfootprint=warn"
            });
            cli::analyze::run(&url, json, wait_secs).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "webfootprint", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}
