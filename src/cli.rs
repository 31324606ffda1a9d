use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use crate::api::{server, AppState};
use crate::config::{ConfigError, ConfigManager};
use crate::models::{NewQuestion, DEFAULT_CATEGORIES};
use crate::storage::{open_storage, Storage, StorageError};

#[derive(Parser, Debug)]
#[command(name = "trivia", version, about = "REST backend for a trivia game")]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "TRIVIA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Delete all questions and categories, then seed the default categories
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Also insert a handful of sample questions
        #[arg(long)]
        samples: bool,
    },
    /// Apply pending schema migrations, or move to an explicit version
    Migrate {
        /// Target schema version, lower than the current one to roll back
        #[arg(long)]
        to: Option<i32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Sample questions as (question, answer, index into DEFAULT_CATEGORIES, difficulty).
const SAMPLE_QUESTIONS: &[(&str, &str, usize, u32)] = &[
    ("What is the heaviest organ in the human body?", "The Liver", 0, 4),
    ("Who discovered penicillin?", "Alexander Fleming", 0, 3),
    ("La Giaconda is better known as what?", "Mona Lisa", 1, 3),
    ("How many paintings did Van Gogh sell in his lifetime?", "One", 1, 4),
    ("What is the largest lake in Africa?", "Lake Victoria", 2, 2),
    ("Whose autobiography is entitled 'I Know Why the Caged Bird Sings'?", "Maya Angelou", 3, 2),
    ("What movie earned Tom Hanks his third straight Oscar nomination, in 1996?", "Apollo 13", 4, 4),
    ("Which is the only team to play in every soccer World Cup tournament?", "Brazil", 5, 3),
];

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let mut manager = ConfigManager::new(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => {
            let config = manager.config();
            let storage = open_storage(&config.database_path()?)?;
            let state = AppState::new(Arc::new(storage), config.questions_per_page());

            let host = host.unwrap_or_else(|| config.host());
            let port = port.unwrap_or_else(|| config.port());
            info!(%host, port, "Starting trivia API");
            server::serve(state, &host, port).await?;
        }
        Command::Db { command } => {
            let storage = open_storage(&manager.config().database_path()?)?;
            match command {
                DbCommand::Reset { yes, samples } => {
                    let stdin = io::stdin();
                    reset_database(&storage, yes, samples, &mut stdin.lock(), &mut io::stdout())?;
                }
                DbCommand::Migrate { to } => {
                    let version = match to {
                        Some(version) => storage.migrate_to(version)?,
                        None => storage.schema_version()?,
                    };
                    println!("Schema is at version {}", version);
                }
            }
        }
        Command::Config { command } => match command {
            ConfigCommand::Get { key } => match manager.get(&key)? {
                Some(value) => println!("{}", value),
                None => println!("{} is not set", key),
            },
            ConfigCommand::Set { key, value } => {
                manager.set(&key, &value)?;
                println!("Set {} = {}", key, value);
            }
            ConfigCommand::Unset { key } => {
                manager.unset(&key)?;
                println!("Unset {}", key);
            }
            ConfigCommand::List => {
                println!("# {}", manager.path().display());
                for (key, value, is_default) in manager.list() {
                    let marker = if is_default { " (default)" } else { "" };
                    println!("{} = {}{}", key, value, marker);
                }
            }
        },
    }

    Ok(())
}

/// Wipes the store after confirmation and seeds the default categories.
pub fn reset_database<R: BufRead, W: Write>(
    storage: &dyn Storage,
    skip_prompt: bool,
    samples: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool, CliError> {
    if !skip_prompt {
        writeln!(
            output,
            "Warning: This will delete all questions and categories."
        )?;
        write!(output, "Are you sure you want to continue? [y/N] ")?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            writeln!(output, "Operation cancelled")?;
            return Ok(false);
        }
    }

    let categories = storage.reset(DEFAULT_CATEGORIES)?;
    if samples {
        for (question, answer, category, difficulty) in SAMPLE_QUESTIONS {
            let new_question = NewQuestion::new(
                question.to_string(),
                answer.to_string(),
                categories[*category].id,
                *difficulty,
            )
            .map_err(StorageError::from)?;
            storage.insert_question(&new_question)?;
        }
    }

    writeln!(
        output,
        "Database has been reset to initial state with default categories"
    )?;
    if samples {
        writeln!(output, "Inserted {} sample questions", SAMPLE_QUESTIONS.len())?;
    }
    Ok(true)
}
