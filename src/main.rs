use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wikiqa::utils::{clean_answer, emphasize_answer, ensure_parent_directory};
use wikiqa::{
    Answer, AnswerError, AnswerOutcome, AnswerScanner, AnswerService, Config, DocumentResolver,
    HfQaClient, HfQaClientBuilder, QueryTitleCache, Resolution, SearchError, SerpApiClientBuilder,
    TitleSource, WikipediaClientBuilder, validate_query,
};

// ANSI codes for terminal output
const BOLD: &str = "\x1b[1m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

// The scanner tolerates a few failed paragraphs on its own, so each scoring
// call gets one quick retry instead of the full backoff schedule.
const SCORER_RETRY_DELAYS: [Duration; 1] = [Duration::from_secs(1)];

/// wikiqa - answer questions from Wikipedia
#[derive(Parser)]
#[command(name = "wikiqa")]
#[command(about = "Answer natural-language questions from the most relevant Wikipedia article")]
#[command(version)]
struct Cli {
    /// Query-title cache file (overrides WIKIQA_CACHE_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    cache_path: Option<PathBuf>,

    /// SerpApi key (overrides SERP_API_KEY)
    #[arg(long, global = true, value_name = "KEY")]
    serp_api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Answer a question
    Ask(AskCommand),
    /// Show which article a query resolves to
    Resolve(ResolveCommand),
    /// Inspect the query-title cache
    Cache(CacheCommand),
}

/// Answer a question
#[derive(Parser)]
struct AskCommand {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    question: String,

    /// Search this article instead of resolving one
    #[arg(short, long, value_name = "TITLE")]
    article: Option<String>,

    /// Confidence above which scanning stops early (0.0-1.0)
    #[arg(short, long, value_name = "SCORE")]
    threshold: Option<f64>,
}

/// Resolve a query to an article title
#[derive(Parser)]
struct ResolveCommand {
    /// The query to resolve
    #[arg(value_name = "QUERY")]
    query: String,
}

/// Inspect the query-title cache
#[derive(Parser)]
struct CacheCommand {
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached query → title pairs
    List,
    /// Print the cache file location
    Path,
}

fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Ask(cmd) => handle_ask(&cli, cmd),
        Commands::Resolve(cmd) => handle_resolve(&cli, cmd),
        Commands::Cache(cmd) => handle_cache(&cli, cmd),
    };

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are invalid questions and invalid configuration values.
/// Everything else (providers, cache I/O) is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<AnswerError>()
            .is_some_and(AnswerError::is_user_error)
            || cause.downcast_ref::<wikiqa::ConfigError>().is_some()
    })
}

/// Loads configuration, applying global CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(path) = &cli.cache_path {
        config.cache_path = path.clone();
    }
    Ok(config)
}

/// Opens the query-title cache, creating its directory and file if needed.
fn open_cache(config: &Config) -> Result<QueryTitleCache> {
    ensure_parent_directory(&config.cache_path)?;
    QueryTitleCache::load(&config.cache_path).context("Failed to open query-title cache")
}

/// Builds the resolver, falling back to cache-only mode without a search key.
fn build_resolver(cli: &Cli, config: &Config, cache: QueryTitleCache) -> Result<DocumentResolver> {
    let mut builder = SerpApiClientBuilder::new().timeout(config.timeout);
    if let Some(key) = &cli.serp_api_key {
        builder = builder.api_key(key);
    }

    let resolver = match builder.build() {
        Ok(client) => DocumentResolver::new(cache, Arc::new(client)),
        Err(SearchError::NotConfigured) => {
            eprintln!(
                "{YELLOW}Warning:{RESET} no SerpApi key provided or found; only cached article titles can be used."
            );
            DocumentResolver::cache_only(cache)
        }
        Err(e) => return Err(e).context("Failed to create search client"),
    };

    Ok(resolver.with_similarity_threshold(config.similarity_threshold))
}

/// Builds the full question-answering service from configuration.
fn build_service(cli: &Cli, config: &Config) -> Result<AnswerService> {
    let cache = open_cache(config)?;
    let resolver = build_resolver(cli, config, cache)?;

    let content = WikipediaClientBuilder::new()
        .language(&config.language)
        .timeout(config.timeout)
        .build()
        .context("Failed to create Wikipedia client")?;

    let scorer = build_scorer(config)?;

    Ok(AnswerService::new(
        resolver,
        Arc::new(content),
        AnswerScanner::new(Arc::new(scorer)),
    )
    .with_score_threshold(config.score_threshold)
    .with_query_max_chars(config.query_max_chars))
}

/// Builds the QA scorer with the scanner's shorter retry schedule.
fn build_scorer(config: &Config) -> Result<HfQaClient> {
    HfQaClientBuilder::new()
        .timeout(config.timeout)
        .retry_delays(SCORER_RETRY_DELAYS.to_vec())
        .build()
        .context("Failed to create QA client")
}

/// Handles the ask command.
fn handle_ask(cli: &Cli, cmd: &AskCommand) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(threshold) = cmd.threshold {
        config.score_threshold = Config::validate_threshold("--threshold", threshold)?;
    }

    let service = build_service(cli, &config)?;

    let outcome = match &cmd.article {
        Some(title) => service.answer_from_title(&cmd.question, title),
        None => service.answer_question(&cmd.question),
    }
    .context("Failed to answer question")?;

    match outcome {
        AnswerOutcome::Answered(answer) => print_answer(&cmd.question, &answer),
        AnswerOutcome::NotFound(reason) => {
            println!("{YELLOW}No answer:{RESET} {reason}.");
        }
    }

    Ok(())
}

/// Prints an answer with its score and highlighted source paragraph.
fn print_answer(question: &str, answer: &Answer) {
    let text = clean_answer(&answer.answer_text);
    let source = title_note(answer.title_source);

    println!("Question: {question}");
    println!("Article:  {}{DIM}{source}{RESET}", answer.document_title);
    println!(
        "Answer:   {BOLD}{text}{RESET} {DIM}(score: {:.3}){RESET}",
        answer.score
    );
    println!();
    println!(
        "{}",
        emphasize_answer(&answer.source_paragraph, text, BOLD, RESET)
    );
}

/// Describes how an answer's article was chosen, for display after its title.
fn title_note(source: TitleSource) -> &'static str {
    match source {
        TitleSource::Cached => " (cached)",
        TitleSource::Searched { cached: true } => "",
        TitleSource::Searched { cached: false } => " (searched, not cached)",
        TitleSource::Manual => " (chosen manually)",
    }
}

/// Handles the resolve command.
fn handle_resolve(cli: &Cli, cmd: &ResolveCommand) -> Result<()> {
    let config = load_config(cli)?;
    let cache = open_cache(&config)?;
    let resolver = build_resolver(cli, &config, cache)?;

    // Same validation as `ask`, without building the content and QA clients.
    let query = validate_query(&cmd.query, config.query_max_chars)?;

    let resolution = resolver
        .resolve(query)
        .map_err(AnswerError::from)
        .context("Failed to resolve query")?;

    match resolution {
        Resolution::Cached {
            title,
            matched_query,
            similarity,
        } => println!(
            "{title} {DIM}(cached via \"{matched_query}\", similarity {similarity:.3}){RESET}"
        ),
        Resolution::Searched { title, cached } => {
            let note = if cached { "searched" } else { "searched, not cached" };
            println!("{title} {DIM}({note}){RESET}");
        }
        Resolution::Unresolved => println!("{YELLOW}No article found for this query.{RESET}"),
    }

    Ok(())
}

/// Handles the cache subcommands.
fn handle_cache(cli: &Cli, cmd: &CacheCommand) -> Result<()> {
    let config = load_config(cli)?;

    match cmd.action {
        CacheAction::Path => println!("{}", config.cache_path.display()),
        CacheAction::List => {
            let cache = open_cache(&config)?;
            let entries = cache.snapshot();
            if entries.is_empty() {
                println!("Cache is empty.");
            }
            for (query, title) in entries {
                println!("{query} {DIM}→{RESET} {title}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_ask_with_article_and_threshold() {
        let cli = Cli::try_parse_from([
            "wikiqa",
            "ask",
            "When did Kurt Godel die?",
            "--article",
            "Kurt Gödel",
            "--threshold",
            "0.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.question, "When did Kurt Godel die?");
                assert_eq!(cmd.article.as_deref(), Some("Kurt Gödel"));
                assert_eq!(cmd.threshold, Some(0.5));
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn cli_accepts_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wikiqa",
            "cache",
            "list",
            "--cache-path",
            "/tmp/cache.json",
        ])
        .unwrap();

        assert_eq!(cli.cache_path, Some(PathBuf::from("/tmp/cache.json")));
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheCommand {
                action: CacheAction::List
            })
        ));
    }

    #[test]
    fn cli_requires_a_question() {
        assert!(Cli::try_parse_from(["wikiqa", "ask"]).is_err());
    }

    #[test]
    fn empty_question_is_a_user_error() {
        let err = anyhow::Error::from(AnswerError::EmptyQuery).context("Failed to answer question");
        assert!(is_user_error(&err));
    }

    #[test]
    fn provider_failure_is_an_internal_error() {
        let err = anyhow::Error::from(AnswerError::Search(SearchError::Http { status: 500 }))
            .context("Failed to answer question");
        assert!(!is_user_error(&err));
    }

    #[test]
    fn uncached_search_result_is_flagged_in_output() {
        assert_eq!(
            title_note(TitleSource::Searched { cached: false }),
            " (searched, not cached)"
        );
        assert_eq!(title_note(TitleSource::Searched { cached: true }), "");
        assert_eq!(title_note(TitleSource::Cached), " (cached)");
    }

    #[test]
    fn scorer_retries_fit_within_a_scan() {
        let scorer = build_scorer(&Config::default()).unwrap();

        let budget: Duration = scorer.retry_delays().iter().sum();
        assert!(budget <= Duration::from_secs(1), "retry budget was {budget:?}");
    }

    #[test]
    fn overlong_query_is_a_user_error() {
        let err = anyhow::Error::from(validate_query(&"x".repeat(400), 386).unwrap_err());
        assert!(is_user_error(&err));
    }

    #[test]
    fn out_of_range_threshold_is_a_user_error() {
        let err = anyhow::Error::from(
            Config::validate_threshold("--threshold", 2.0).unwrap_err(),
        );
        assert!(is_user_error(&err));
    }
}
