use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use calmkit_core::*;
use calmkit_memory::{MoodLog, TechniqueIndex};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod setup;

use setup::ensure_skeleton;

#[derive(Parser)]
#[command(name = "calmkit", version, about = "calmkit wellness companion")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.calmkit",
        help = "Config root directory (contains config/ and data/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a default config and starter technique corpus")]
    Init,
    #[command(about = "Validate config")]
    Validate,
    #[command(about = "Start an interactive chat session")]
    Chat {
        #[arg(long, help = "User id recorded with each mood entry")]
        user: Option<String>,
    },
    #[command(about = "Classify a single message and print the result as JSON")]
    Classify { text: String },
    #[command(about = "Retrieve coping techniques for a query")]
    Retrieve {
        query: String,
        #[arg(long, default_value_t = 1)]
        top_k: usize,
    },
    #[command(about = "Show recent mood entries and the rolling summary")]
    History {
        #[arg(long, default_value_t = 7)]
        last: usize,
    },
    #[command(about = "Print the rolling mood summary")]
    Summary {
        #[arg(long, default_value_t = 30)]
        window: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "calmkit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root.as_path();
    match command {
        Commands::Init => {
            if ensure_skeleton(root)? {
                println!("Created {}", root.join(CONFIG_FILE).display());
            } else {
                println!("Config already exists at {}", root.join(CONFIG_FILE).display());
            }
        }
        Commands::Validate => {
            let config = load_config(root)?;
            let data = config.resolved_data(root);
            let techniques = TechniqueIndex::load(&data.techniques_dir)?;
            println!(
                "Config valid. user={}, classifier llm={}, responder llm={}, {} techniques.",
                config.user_id,
                config.classifier.use_llm,
                config.responder.use_llm,
                techniques.len()
            );
        }
        Commands::Chat { user } => {
            run_chat(root, user).await?;
        }
        Commands::Classify { text } => {
            println!("{}", classify_text(root, &text).await?);
        }
        Commands::Retrieve { query, top_k } => {
            let config = load_config(root)?;
            let index = TechniqueIndex::load(&config.resolved_data(root).techniques_dir)?;
            for (i, text) in index.retrieve(&query, top_k).iter().enumerate() {
                println!("[{}] {text}", i + 1);
            }
        }
        Commands::History { last } => {
            let log = open_mood_log(root).await?;
            println!("{}", log.history_report(last).await?);
        }
        Commands::Summary { window } => {
            let log = open_mood_log(root).await?;
            println!("{}", log.summary(window).await?);
        }
    }

    Ok(())
}

/// Classify one message without opening the mood log or technique corpus.
async fn classify_text(root: &Path, text: &str) -> Result<String> {
    let config = load_config(root)?;
    let classification = EmotionClassifier::from_config(&config).classify(text).await;
    Ok(serde_json::to_string_pretty(&classification)?)
}

async fn open_mood_log(root: &Path) -> Result<MoodLog> {
    let config = load_config(root)?;
    MoodLog::open(config.resolved_data(root).mood_log).await
}

async fn run_chat(root: &Path, user: Option<String>) -> Result<()> {
    ensure_skeleton(root)?;
    let config = load_config(root)?;
    let user_id = user.unwrap_or_else(|| config.user_id.clone());
    let orchestrator = Orchestrator::from_config(&config, root).await?;

    println!("calmkit is ready (user: {user_id}). Type 'quit' or 'exit' to end the session.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("You > ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match orchestrator.handle_turn(&user_id, input).await {
            Ok(outcome) => println!("Buddy > {}", outcome.reply),
            Err(err) => eprintln!("Error: {err:#}"),
        }
    }

    println!("Session ended. Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classify_leaves_data_dir_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("config")).unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "classifier:\n  use_llm: false\n").unwrap();

        let json = classify_text(tmp.path(), "my heart racing again").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["emotion"], "panic");
        assert_eq!(value["intensity"], 5);
        assert!(!tmp.path().join("data").exists());
    }
}
