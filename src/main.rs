use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use clap::Parser;
use promptkit::{
    config::PromptKitConfig,
    models::{CreatePrompt, CreateShareLink, ExecuteRun, ModelParameters, RateRun, ShareLinkKind, UpdatePrompt},
    observability,
    services::{MockModel, ServiceError, Services},
    transfer::{self, Format, TransferError},
};
use serde_json::Value;
use thiserror::Error;

/// CLI arguments for promptkit
#[derive(Parser, Debug)]
#[command(version, about = "Offline-first prompt knowledge base", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./promptkit.toml if it exists,
    /// otherwise built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// List prompts, newest first (default)
    List,
    /// Print one prompt as JSON
    Show { id: String },
    /// Create a prompt
    Add {
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Parse title and sections from a text file instead
        #[arg(long, conflicts_with_all = ["title", "content", "description"])]
        from_text: Option<PathBuf>,
    },
    /// Change fields of a prompt
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Replaces all tags; repeatable
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    /// Delete a prompt
    Rm { id: String },
    /// Search prompt titles and content
    Search {
        query: String,
        /// Only prompts carrying every given tag
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Export all prompts
    Export {
        /// json, csv or markdown
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import prompts from a JSON or CSV file
    Import {
        file: PathBuf,
        /// Defaults to the file extension
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Execute a prompt with the mock model
    Run {
        prompt_id: String,
        #[arg(short, long, default_value = "mock")]
        model: String,
        /// Placeholder value as name=value; repeatable
        #[arg(short, long = "input", value_parser = parse_key_value)]
        inputs: Vec<(String, String)>,
        #[arg(long)]
        temperature: Option<f64>,
    },
    /// List runs
    Runs {
        /// Only runs of this prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Rate a run from 1 to 5
    Rate {
        run_id: String,
        rating: u8,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Create a share link for a prompt
    Share {
        prompt_id: String,
        /// readonly, reusable or forkable
        #[arg(long = "type", default_value = "readonly")]
        kind: String,
        /// Lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Open a share link by token
    Open { token: String },
    /// Print the prompt list whenever it changes, until Ctrl-C
    Watch,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Input(String),
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

/// Resolve the config path. `None` means no file: use defaults.
fn resolve_config_path(explicit_path: Option<&str>) -> Result<Option<PathBuf>, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path));
    }

    let cwd_config = PathBuf::from("promptkit.toml");
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }
    Ok(None)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match resolve_config_path(args.config.as_deref()) {
        Ok(Some(path)) => match PromptKitConfig::from_file(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        Ok(None) => PromptKitConfig::default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let services = match promptkit::open(&config, Arc::new(MockModel)).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open local store: {}", e);
            std::process::exit(1);
        }
    };

    let result = run_command(&services, args.command.unwrap_or(Command::List)).await;

    // Give detached remote writes a chance to land before exiting.
    services.sync.flush().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(services: &Services, command: Command) -> Result<(), CliError> {
    match command {
        Command::List => {
            for prompt in services.prompts.list().await? {
                println!("{}  {}", prompt.id, prompt.title);
            }
        }
        Command::Show { id } => {
            let prompt = services.prompts.require(&id).await?;
            println!("{}", serde_json::to_string_pretty(&prompt)?);
        }
        Command::Add {
            title,
            content,
            description,
            tags,
            from_text,
        } => {
            let prompt = match from_text {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)?;
                    services.prompts.create_from_text(&text).await?
                }
                None => {
                    services
                        .prompts
                        .create(CreatePrompt {
                            title,
                            description,
                            content,
                            tags,
                        })
                        .await?
                }
            };
            println!("{}", prompt.id);
        }
        Command::Edit {
            id,
            title,
            content,
            description,
            tags,
        } => {
            let prompt = services
                .prompts
                .update(
                    &id,
                    UpdatePrompt {
                        title,
                        description,
                        content,
                        tags,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&prompt)?);
        }
        Command::Rm { id } => services.prompts.delete(&id).await?,
        Command::Search { query, tags } => {
            let mut hits = services.prompts.search(&query).await?;
            hits.retain(|p| tags.iter().all(|t| p.tags.contains(t)));
            for prompt in hits {
                println!("{}  {}", prompt.id, prompt.title);
            }
        }
        Command::Export { format, output } => {
            let format: Format = format.parse()?;
            let prompts = services.prompts.list().await?;
            let rendered = transfer::export_prompts(&prompts, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    eprintln!("Exported {} prompts to {}", prompts.len(), path.display());
                }
                None => println!("{}", rendered),
            }
        }
        Command::Import { file, format } => {
            let format: Format = match format {
                Some(f) => f.parse()?,
                None => file
                    .extension()
                    .and_then(|e| e.to_str())
                    .ok_or_else(|| CliError::Input("cannot infer format; pass --format".into()))?
                    .parse()?,
            };
            let text = std::fs::read_to_string(&file)?;
            let prompts = transfer::import_prompts(&text, format)?;
            let count = services.prompts.import(&prompts).await?;
            eprintln!("Imported {} prompts", count);
        }
        Command::Run {
            prompt_id,
            model,
            inputs,
            temperature,
        } => {
            let input: BTreeMap<String, Value> = inputs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            let run = services
                .runs
                .execute(ExecuteRun {
                    prompt_id,
                    input,
                    model,
                    parameters: ModelParameters {
                        temperature,
                        ..Default::default()
                    },
                    tags: Vec::new(),
                    ab_test_group: None,
                })
                .await?;
            println!("{}", run.output);
            eprintln!("run {} ({} ms)", run.id, run.latency);
        }
        Command::Runs { prompt } => {
            let runs = match prompt {
                Some(id) => services.runs.runs_for_prompt(&id).await?,
                None => services.runs.list().await?,
            };
            for run in runs {
                let rating = run.rating.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
                println!("{}  {}  {}  {} ms  rating {}", run.id, run.prompt_id, run.model, run.latency, rating);
            }
        }
        Command::Rate {
            run_id,
            rating,
            notes,
        } => {
            services.runs.rate(&run_id, RateRun { rating, notes }).await?;
        }
        Command::Share {
            prompt_id,
            kind,
            expires_in,
        } => {
            let kind: ShareLinkKind = kind.parse().map_err(CliError::Input)?;
            let link = services
                .share_links
                .create(CreateShareLink {
                    prompt_id,
                    kind,
                    expires_in_secs: expires_in,
                })
                .await?;
            println!("{}", link.token);
        }
        Command::Open { token } => {
            let (link, prompt) = services.share_links.resolve(&token).await?;
            eprintln!("{:?} link, opened {} times", link.kind, link.access_count);
            println!("{}", serde_json::to_string_pretty(&prompt)?);
        }
        Command::Watch => {
            let subscription = services.prompts.subscribe(|prompts| {
                println!("--- {} prompts", prompts.len());
                for prompt in prompts {
                    println!("{}  {}", prompt.id, prompt.title);
                }
            });
            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe();
        }
    }
    Ok(())
}
