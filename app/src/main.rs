use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use imagecompare_core::agents::credentials::{self, CredentialProvider};
use imagecompare_core::agents::{
    build_client, default_providers, Orchestrator, RequestSequencer, SettingsCredentialStore,
    StaticCredential,
};
use imagecompare_core::api::v1::{self, ApiState, GenerateView};
use imagecompare_core::config::AppConfig;
use imagecompare_core::db::{init_db, DbPool};
use imagecompare_core::history::{HistoryEntry, HistoryStore};
use imagecompare_core::mapping::PromptResolver;
use imagecompare_core::media::{decode_inline_image, download_filename};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imagecompare")]
#[command(about = "Generate an image with several providers and compare the results")]
struct Args {
    /// Directory holding the history database (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt to every provider
    Generate {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Write inline images into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Inspect or prune saved prompts
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
    /// Store the token from the login redirect URL
    Login { redirect_url: String },
    /// Forget the stored token
    Logout,
    /// Show the effective configuration
    Config,
    /// List prompts the offline table can answer
    Prompts,
}

#[derive(Subcommand)]
enum HistoryCommand {
    List,
    Show { id: i64 },
    Delete { id: i64 },
    Clear,
}

fn workspace_dir(config: &AppConfig, override_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir.or_else(|| config.data_dir.clone()) {
        return dir;
    }
    if let Some(proj) = ProjectDirs::from("com", "ImageCompare", "ImageCompare") {
        proj.data_dir().to_path_buf()
    } else {
        std::env::temp_dir().join("ImageCompare")
    }
}

fn load_resolver(config: &AppConfig) -> Result<PromptResolver> {
    match &config.mapping_path {
        Some(path) => PromptResolver::from_json_file(path),
        None => Ok(PromptResolver::builtin()),
    }
}

fn build_state(config: AppConfig, pool: DbPool) -> Result<ApiState> {
    let resolver = Arc::new(load_resolver(&config)?);
    let credentials: Arc<dyn CredentialProvider> = match &config.access_token {
        Some(token) => Arc::new(StaticCredential::new(token.clone())),
        None => Arc::new(SettingsCredentialStore::new(pool.clone())),
    };
    let client = build_client(&config, resolver.clone(), credentials.clone())?;
    let orchestrator = Orchestrator::new(default_providers(), client, HistoryStore::new(pool));
    Ok(ApiState {
        config,
        orchestrator: Arc::new(orchestrator),
        resolver,
        credentials,
        sequencer: Arc::new(RequestSequencer::new()),
    })
}

/// Used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

// Single-threaded on purpose: the fan-out is cooperative on one task.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env();
    let dir = workspace_dir(&config, args.data_dir);
    let pool = init_db(dir.clone())
        .with_context(|| format!("failed to open history in {}", dir.display()))?;

    match args.command {
        Command::Login { redirect_url } => {
            credentials::login(&pool, &redirect_url)?;
            println!("Signed in.");
            Ok(())
        }
        Command::Logout => {
            credentials::logout(&pool)?;
            println!("Signed out.");
            Ok(())
        }
        command => {
            let state = build_state(config, pool)?;
            run(&state, command, args.json).await
        }
    }
}

async fn run(state: &ApiState, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Generate { prompt, save_dir } => {
            let prompt = prompt.join(" ");
            let view = v1::generate(state, &prompt).await.map_err(|e| anyhow!(e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_generation(&view);
            }
            if let Some(dir) = save_dir {
                save_images(&dir, &view)?;
            }
            if view.no_mapping || view.images.is_empty() {
                bail!("{}", view.notice);
            }
            Ok(())
        }
        Command::History { action } => match action {
            HistoryCommand::List => {
                let entries = v1::list_history(state).await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else if entries.is_empty() {
                    println!("No saved prompts.");
                } else {
                    for entry in &entries {
                        print_history_line(entry);
                    }
                }
                Ok(())
            }
            HistoryCommand::Show { id } => {
                let entry = v1::get_history(state, id).await.map_err(|e| anyhow!(e))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                } else {
                    print_history_line(&entry);
                    for (provider, image) in &entry.images {
                        println!("  {provider}: {}", abbreviate(image));
                    }
                }
                Ok(())
            }
            HistoryCommand::Delete { id } => {
                v1::delete_history(state, id).await;
                Ok(())
            }
            HistoryCommand::Clear => {
                v1::clear_history(state).await;
                println!("History cleared.");
                Ok(())
            }
        },
        Command::Config => {
            let summary = v1::config_summary(state).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Prompts => {
            for prompt in v1::available_prompts(state) {
                println!("{prompt}");
            }
            Ok(())
        }
        Command::Login { .. } | Command::Logout => {
            bail!("login and logout do not need a provider client")
        }
    }
}

fn print_generation(view: &GenerateView) {
    if view.no_mapping {
        println!("{}", view.notice);
        return;
    }
    for panel in &view.panels {
        match (view.images.get(&panel.provider), view.errors.get(&panel.provider)) {
            (Some(image), _) => println!("{:<10} {}", panel.display_name, abbreviate(image)),
            (None, Some(error)) => println!("{:<10} error: {error}", panel.display_name),
            (None, None) => println!("{:<10} -", panel.display_name),
        }
    }
    println!("{}", view.notice);
}

fn print_history_line(entry: &HistoryEntry) {
    println!(
        "#{:<5} {}  {} ({} image(s))",
        entry.id,
        entry.timestamp,
        entry.prompt,
        entry.images.len()
    );
}

const PREVIEW_CHARS: usize = 40;

fn abbreviate(reference: &str) -> String {
    if !reference.starts_with("data:") || reference.len() <= 48 {
        return reference.to_string();
    }
    match reference.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}… ({} bytes)", &reference[..end], reference.len()),
        None => reference.to_string(),
    }
}

fn save_images(dir: &Path, view: &GenerateView) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (provider, image) in &view.images {
        let Some(bytes) = decode_inline_image(image) else {
            log::info!("{provider} returned a reference, not inline data; nothing to save");
            continue;
        };
        let path = dir.join(download_filename(provider, &view.prompt));
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("saved {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_shows_info_events() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::INFO)
        );
    }

    #[test]
    fn short_references_are_printed_whole() {
        assert_eq!(abbreviate("/sample-images/dalle3/cat.png"), "/sample-images/dalle3/cat.png");
        assert_eq!(abbreviate("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
    }

    #[test]
    fn inline_payloads_are_shortened() {
        let reference = format!("data:image/png;base64,{}", "A".repeat(100));
        let shown = abbreviate(&reference);
        assert!(shown.starts_with("data:image/png;base64,AAAA"));
        assert!(shown.ends_with(&format!("… ({} bytes)", reference.len())));
    }

    #[test]
    fn multibyte_payloads_are_cut_on_char_boundaries() {
        let reference = format!("data:image/svg+xml;utf8,<svg>{}</svg>", "é".repeat(30));
        let shown = abbreviate(&reference);
        let preview: String = reference.chars().take(PREVIEW_CHARS).collect();
        assert_eq!(shown, format!("{preview}… ({} bytes)", reference.len()));
    }
}
