use clap::{Parser, Subcommand, ValueEnum};

mod assembly;
mod commands;

#[derive(Parser)]
#[command(
    name = "skyport",
    about = "skyport — load-balanced, auto-scaling container services",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a skyport.toml scaffold for the default web server stack
    Init {
        /// Directory to write skyport.toml into
        #[arg(short, long, default_value = ".")]
        path: String,
        /// Stack name (default: directory name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Assemble the stack and print the synthesized template
    Synth {
        #[arg(short, long, default_value = "skyport.toml")]
        config: String,
        /// Container image repository.
        #[arg(long, env = assembly::REPOSITORY_ENV, default_value = "")]
        repository: String,
        /// Write the template here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Check skyport.toml without synthesizing anything
    Validate {
        #[arg(short, long, default_value = "skyport.toml")]
        config: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,skyport=debug"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command {
        Commands::Init { path, name } => commands::init::init(&path, name.as_deref()),
        Commands::Synth {
            config,
            repository,
            output,
        } => commands::synth::synth(&config, &repository, output.as_deref()),
        Commands::Validate { config } => commands::validate::validate(&config),
    }
}
