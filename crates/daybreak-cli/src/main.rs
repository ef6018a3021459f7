use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "daybreak-cli", version, about = "Daybreak alarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule alarms on the in-process host backend and wait for them to fire
    Run {
        /// Alarm spec: id=<n>,label=<text>,in=<seconds> or at=<epoch-millis> (repeatable)
        #[arg(long = "alarm", required = true)]
        alarms: Vec<String>,
        /// Cancel these ids right after scheduling
        #[arg(long = "cancel")]
        cancels: Vec<i64>,
        /// Pretend the exact-alarm grant is missing
        #[arg(long)]
        deny_exact: bool,
        /// Use the legacy capability profile (window flags, no amplitude control)
        #[arg(long)]
        legacy: bool,
    },
    /// Issue a raw bridge call: method name plus JSON arguments
    Call {
        method: String,
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            alarms,
            cancels,
            deny_exact,
            legacy,
        } => commands::run::run(alarms, cancels, deny_exact, legacy).await,
        Commands::Call { method, args } => commands::call::run(&method, &args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
