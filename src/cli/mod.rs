//! Command-line interface.
//!
//! Four commands: one-shot `ask`, interactive `chat`, retrieval-only
//! `search` and `stats`. The index is built in-process from the corpus
//! file at startup.

use crate::config::{ArcanaConfig, LlmConfig, LlmProviderKind};
use crate::llm::{ChatCompletion, LlmHttpConfig, LmStudioClient, OpenAiClient};
use crate::models::QueryOptions;
use crate::session::Session;
use crate::store::{FileCorpus, PseudoEmbedIndex};
use crate::{Error, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Retrieval-augmented question answering over an esoteric book corpus.
#[derive(Debug, Parser)]
#[command(name = "arcana", version, about)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Corpus text file (overrides the config).
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask a single question and print the answer.
    Ask {
        /// The question.
        question: Vec<String>,

        /// Use the agentic tool loop instead of one-shot retrieval.
        #[arg(long)]
        agent: bool,
    },

    /// Interactive conversation with memory.
    Chat {
        /// Use the agentic tool loop for every question.
        #[arg(long)]
        agent: bool,
    },

    /// Retrieval only: print ranked fragments without generation.
    Search {
        /// The query.
        query: Vec<String>,

        /// How many fragments to print.
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Print corpus and configuration statistics.
    Stats,
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns an error if the corpus cannot be loaded or a command fails.
pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ask { question, agent } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                return Err(Error::InvalidInput("пустой вопрос".to_string()));
            }
            let mut session = build_session(config)?;
            if agent {
                let response = session.ask_agentic(&question);
                println!("{}", response.answer);
                if !response.tool_calls.is_empty() {
                    eprintln!(
                        "[инструментов: {}, итераций: {}]",
                        response.tool_calls.len(),
                        response.iterations
                    );
                }
            } else {
                let response = session.query(&question, &QueryOptions::default())?;
                println!("{}", response.answer);
                eprintln!("[источников: {}]", response.source_documents.len());
            }
            Ok(())
        },
        Commands::Chat { agent } => {
            let session = build_session(config)?;
            chat_loop(session, agent)
        },
        Commands::Search { query, top_k } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                return Err(Error::InvalidInput("пустой запрос".to_string()));
            }
            let index = build_index(&config)?;
            let ranker = crate::retrieval::HybridRanker::new(config.retrieval.clone())?;
            let scored = ranker.rank_scored(&index, &query, top_k)?;
            for (i, doc) in scored.iter().enumerate() {
                println!(
                    "{}. [score {:.1}, совпадений {}]\n{}\n",
                    i + 1,
                    doc.score,
                    doc.keyword_matches,
                    doc.document.content
                );
            }
            Ok(())
        },
        Commands::Stats => {
            let index = build_index(&config)?;
            println!("Корпус: {}", config.corpus_path.display());
            println!("Фрагментов в индексе: {}", index.len());
            println!("Режим ранжирования: {}", config.retrieval.mode.as_str());
            println!("top_k: {}", config.retrieval.top_k);
            println!(
                "Память: короткая {} ходов, бюджет {} токенов, порог {}",
                config.memory.max_short_memory,
                config.memory.max_context_tokens,
                config.memory.summarize_threshold
            );
            Ok(())
        },
    }
}

fn load_config(cli: &Cli) -> Result<ArcanaConfig> {
    let mut config = match &cli.config {
        Some(path) => ArcanaConfig::load_from_file(path)?,
        None => ArcanaConfig::load_default(),
    };
    if let Some(corpus) = &cli.corpus {
        config = config.with_corpus_path(corpus.clone());
    }
    Ok(config)
}

fn build_index(config: &ArcanaConfig) -> Result<PseudoEmbedIndex> {
    let corpus = FileCorpus::new(&config.corpus_path);
    let chunks = corpus.chunks()?;
    if chunks.is_empty() {
        return Err(Error::NotReady(format!(
            "корпус пуст: {}",
            config.corpus_path.display()
        )));
    }
    tracing::info!(chunks = chunks.len(), "index built");
    Ok(PseudoEmbedIndex::new(chunks))
}

fn build_llm(config: &LlmConfig) -> Box<dyn ChatCompletion> {
    let http = LlmHttpConfig::from_config(config);
    match config.provider {
        LlmProviderKind::LmStudio => {
            let mut client = LmStudioClient::new().with_http_config(http);
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url.clone());
            }
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            Box::new(client)
        },
        LlmProviderKind::OpenAi => {
            let mut client = OpenAiClient::new().with_http_config(http);
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url.clone());
            }
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            if let Some(api_key) = &config.api_key {
                client = client.with_api_key(api_key.clone());
            }
            Box::new(client)
        },
    }
}

fn build_session(config: ArcanaConfig) -> Result<Session> {
    let index = build_index(&config)?;
    let llm = build_llm(&config.llm);
    let corpus = FileCorpus::new(&config.corpus_path);
    Ok(Session::new(config, Box::new(index), llm)?.with_corpus(Box::new(corpus)))
}

fn chat_loop(mut session: Session, agent: bool) -> Result<()> {
    println!("Диалог начат. Команды: clear, clear all, stats, summarize, export, quit");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("\nВы: ");
        stdout.flush().map_err(|e| Error::OperationFailed {
            operation: "chat".to_string(),
            cause: e.to_string(),
        })?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| {
            Error::OperationFailed {
                operation: "chat".to_string(),
                cause: e.to_string(),
            }
        })?;
        if read == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" | "выход" => break,
            "clear" => {
                session.clear_memory(true);
                println!("Недавние сообщения очищены, суммаризации сохранены.");
            },
            "clear all" => {
                session.clear_memory(false);
                println!("Память полностью очищена.");
            },
            "stats" | "статистика" => {
                let stats = session.memory_stats();
                println!(
                    "Сессия: {} с | коротких: {} | суммаризаций: {} | токенов: {}",
                    stats.session_duration_secs,
                    stats.short_count,
                    stats.long_count,
                    stats
                        .tokens_used
                        .map_or_else(|| "-".to_string(), |t| t.to_string())
                );
            },
            "summarize" | "суммаризируй" => match session.summarize_now() {
                Some(summary) => println!("Суммаризация: {summary}"),
                None => println!("Суммаризировать пока нечего."),
            },
            "export" | "экспорт" => {
                let path = export_path();
                std::fs::write(&path, session.export_conversation()).map_err(|e| {
                    Error::OperationFailed {
                        operation: "export".to_string(),
                        cause: e.to_string(),
                    }
                })?;
                println!("Диалог сохранён в {}", path.display());
            },
            _ => {
                if agent {
                    let response = session.ask_agentic(input);
                    println!("\nАссистент: {}", response.answer);
                } else {
                    let response = session.query(input, &QueryOptions::default())?;
                    println!("\nАссистент: {}", response.answer);
                }
            },
        }
    }

    println!("Диалог завершён.");
    Ok(())
}

fn export_path() -> PathBuf {
    PathBuf::from(format!(
        "conversation_{}.txt",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}
