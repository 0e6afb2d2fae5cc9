// Copyright 2026 Pitchkit Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pitchkit_runtime::cli;
use pitchkit_runtime::config::{DeployMode, ExtractorConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pitchkit",
    about = "Pitchkit: product page extraction for generative funnels",
    version,
    after_help = "Run 'pitchkit <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Use the serverless browser profile (headless shell, single process)
    #[arg(long, global = true)]
    serverless: bool,

    /// Explicit browser binary
    #[arg(long, global = true, env = "PITCHKIT_CHROMIUM_PATH")]
    chromium_path: Option<PathBuf>,

    /// Attach to a running browser's DevTools websocket instead of launching one
    #[arg(long, global = true, env = "PITCHKIT_BROWSER_WS_URL")]
    browser_ws_url: Option<String>,

    /// Never launch a browser; use static HTML only
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and preprocess the content of a URL
    Extract {
        /// Page to extract (http or https)
        url: String,
    },
    /// Classify a saved HTML file as static content or an app shell
    Classify {
        /// HTML file, or '-' for stdin
        file: PathBuf,
    },
    /// Serve the REST API
    Serve {
        /// Port to listen on (127.0.0.1)
        #[arg(long, default_value = "7878")]
        port: u16,
    },
    /// Check environment and diagnose issues
    Doctor {
        /// Also launch and close the browser once
        #[arg(long)]
        launch: bool,
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

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("PITCHKIT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("PITCHKIT_QUIET", "1");
    }

    init_tracing(cli.verbose, cli.json);

    let mut config = ExtractorConfig::from_env();
    if cli.serverless {
        config.deploy_mode = DeployMode::Serverless;
    }
    if let Some(path) = cli.chromium_path {
        config.chromium_path = Some(path);
    }
    if let Some(ws_url) = cli.browser_ws_url {
        config.browser_ws_url = Some(ws_url);
    }

    let result = match cli.command {
        Commands::Extract { url } => cli::extract_cmd::run(&url, &config, cli.no_browser).await,
        Commands::Classify { file } => cli::classify_cmd::run(&file),
        Commands::Serve { port } => cli::serve_cmd::run(port, &config, cli.no_browser).await,
        Commands::Doctor { launch } => cli::doctor::run(&config, launch).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pitchkit", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

/// Logs go to stderr so stdout stays clean for extracted text.
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "pitchkit_runtime=debug,pitchkit=debug"
    } else {
        "pitchkit_runtime=info,pitchkit=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
