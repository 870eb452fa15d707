//! phonotest CLI — run and report pretest/posttest phoneme experiments.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use phonotest_core::model::{Category, TrialSetKey};
use phonotest_core::statistics::OrganizerKey;

mod commands;

#[derive(Parser)]
#[command(name = "phonotest", version, about = "Pretest/posttest phoneme perception experiments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and sample trial sets
    Init,

    /// Validate trial-set TOML files
    Validate {
        /// Path to a trial-set file or directory
        #[arg(long)]
        trial_sets: PathBuf,
    },

    /// Print the trials of one phase as JSON
    Start {
        /// Subject ID
        #[arg(long)]
        subject: String,

        /// Phase: wpre, spre, wpost, spost (or e.g. "word-pre")
        #[arg(long)]
        phase: TrialSetKey,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Submit a subject's responses for one phase
    Submit {
        /// Subject ID
        #[arg(long)]
        subject: String,

        /// Phase: wpre, spre, wpost, spost
        #[arg(long)]
        phase: TrialSetKey,

        /// JSON array of chosen response indices
        #[arg(long)]
        responses: String,

        /// JSON array of reaction times
        #[arg(long)]
        reaction_times: String,

        /// JSON array of client timestamps
        #[arg(long)]
        timestamps: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Export a CSV report (requires the download password)
    Export {
        /// Download password
        #[arg(long)]
        password: String,

        /// 1 sentence/phoneme, 2 word/token, 3 sentence/token, 4 word/phoneme
        #[arg(long)]
        file_type: String,

        /// Write the CSV here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show aggregate pre/post results as a table
    Summary {
        /// word or sentence
        #[arg(long)]
        category: Category,

        /// phoneme or token
        #[arg(long, default_value = "phoneme")]
        organize_by: OrganizerKey,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the SHA-256 digest of a download password for the config
    HashSecret {
        /// Password to hash
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phonotest=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { trial_sets } => commands::validate::execute(trial_sets),
        Commands::Start {
            subject,
            phase,
            config,
        } => commands::start::execute(subject, phase, config),
        Commands::Submit {
            subject,
            phase,
            responses,
            reaction_times,
            timestamps,
            config,
        } => {
            commands::submit::execute(subject, phase, responses, reaction_times, timestamps, config)
                .await
        }
        Commands::Export {
            password,
            file_type,
            output,
            config,
        } => commands::export::execute(password, file_type, output, config).await,
        Commands::Summary {
            category,
            organize_by,
            config,
        } => commands::summary::execute(category, organize_by, config).await,
        Commands::HashSecret { password } => commands::hash_secret::execute(password),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
