//! Kakari CLI - command-line access to the Kakari session.

mod commands;
mod output;

use clap::{Parser, Subcommand};

/// Kakari CLI - sign in to the Kakari task service and inspect the session.
#[derive(Parser)]
#[command(name = "kakari")]
#[command(about = "Kakari CLI for authentication and session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Identity service base URL, e.g. http://localhost:8000/api/v1
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check authentication status
    Status,

    /// Login with email and password
    Login {
        /// Account email; prompted for when omitted
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear the persisted session
    Logout,

    /// Create an account (does not log in)
    Register {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Public username
        #[arg(short, long)]
        username: String,
    },

    /// Print the signed-in user's profile
    Whoami,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match commands::Context::load(cli.api_url.as_deref(), cli.log_level.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{e:#}"), &cli.format);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Status => commands::status(&ctx, &cli.format).await,
        Commands::Login { email } => commands::login(&ctx, email, &cli.format).await,
        Commands::Logout => commands::logout(&ctx, &cli.format).await,
        Commands::Register { email, username } => {
            commands::register(&ctx, email, username, &cli.format).await
        }
        Commands::Whoami => commands::whoami(&ctx, &cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{e:#}"), &cli.format);
        std::process::exit(1);
    }
}
