use std::cmp;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use atty::Stream;
use cablebus_rs::chat::{ChatEvent, ChatWidget};
use cablebus_rs::config::SiteConfig;
use cablebus_rs::faq::FaqIndex;
use cablebus_rs::metrics::{FileStore, Metrics, TopQuery};
use cablebus_rs::router::{ConversationState, Reply, Router};
use cablebus_rs::timer::Millis;
use cablebus_rs::video::{self, VideoSource};
use cablebus_rs::KnowledgeBase;
use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use regex::Regex;
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break pattern"));
static STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?strong>").expect("valid strong pattern"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

const EXIT_WORDS: &[&str] = &["salir", "exit", "quit"];

#[derive(Parser, Debug)]
#[command(
    name = "cablebus-rs",
    about = "Talk to the Cablebús assistant and inspect site data",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Site configuration file (JSON). Built-in defaults otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the FAQ metrics files.
    #[arg(long, global = true, default_value = ".cablebus")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat session on stdin.
    Chat {
        /// Seed the response picker for reproducible sessions.
        #[arg(long)]
        seed: Option<u64>,
        /// Skip the simulated typing delay.
        #[arg(long)]
        instant: bool,
    },
    /// Answer a single message and exit.
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List the knowledge base topics.
    Topics,
    /// FAQ page search.
    #[command(subcommand)]
    Faq(FaqCommand),
    /// FAQ page metrics.
    #[command(subcommand)]
    Metrics(MetricsCommand),
    /// Video URL helpers.
    #[command(subcommand)]
    Video(VideoCommand),
}

#[derive(Subcommand, Debug)]
enum FaqCommand {
    /// Search questions and answers.
    Search {
        term: String,
        /// Count the search in the metrics store.
        #[arg(long)]
        track: bool,
    },
    /// Question suggestions for a partial term.
    Suggest { term: String },
}

#[derive(Subcommand, Debug)]
enum MetricsCommand {
    /// Most frequent searches and question clicks.
    Top {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Totals plus the top ten.
    Stats,
    /// Clear all counters.
    Reset,
    /// Write a dated JSON export.
    Export {
        /// Target directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum VideoCommand {
    /// Classify a YouTube or video file URL.
    Classify { url: String },
    /// Decode the `video` parameter from a query string.
    Query { query: String },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let config = match &cli.config {
        Some(path) => SiteConfig::from_path(path)?,
        None => SiteConfig::default(),
    };
    match cli.command {
        Command::Chat { seed, instant } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(chat_session(&config, seed, instant, cli.json))
        }
        Command::Ask { message, seed } => handle_ask(&config, &message.join(" "), seed, cli.json),
        Command::Topics => handle_topics(cli.json),
        Command::Faq(FaqCommand::Search { term, track }) => {
            handle_faq_search(&config, &cli.data_dir, &term, track, cli.json)
        }
        Command::Faq(FaqCommand::Suggest { term }) => handle_faq_suggest(&config, &term, cli.json),
        Command::Metrics(command) => handle_metrics(&config, &cli.data_dir, command, cli.json),
        Command::Video(VideoCommand::Classify { url }) => handle_video_classify(&url, cli.json),
        Command::Video(VideoCommand::Query { query }) => handle_video_query(&query, cli.json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

fn open_metrics(config: &SiteConfig, data_dir: &Path) -> Metrics {
    Metrics::open(FileStore::new(data_dir), config.storage.clone())
}

async fn chat_session(
    config: &SiteConfig,
    seed: Option<u64>,
    instant: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let clock = Instant::now();
    let elapsed = || clock.elapsed().as_millis() as Millis;
    let router = Router::with_rng(config.chat.clone(), seeded_rng(seed));
    let mut widget = ChatWidget::with_router(router, elapsed());
    widget.toggle();
    info!(?seed, instant, "chat session started");

    if !as_json {
        println!("Asistente Cablebús. Escribe tu pregunta, un número de opción, o \"salir\".");
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut options: Vec<String> = Vec::new();
    loop {
        if !as_json {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let now = elapsed();
        match pick_option(input, &options) {
            Some(label) => widget.select_option(&label, now),
            None => {
                widget.submit(input, now);
            }
        }

        while let Some(deadline) = widget.next_deadline() {
            let now = if instant {
                deadline
            } else {
                let wait = deadline.saturating_sub(elapsed());
                tokio::time::sleep(Duration::from_millis(wait)).await;
                elapsed().max(deadline)
            };
            for event in widget.tick(now) {
                if let ChatEvent::Message(message) = event {
                    render_bot_message(&message.text, &message.options, as_json)?;
                    if !message.options.is_empty() {
                        options = message.options;
                    }
                }
            }
        }
    }
    info!(turns = widget.state().history().len(), "chat session ended");
    Ok(())
}

fn pick_option(input: &str, options: &[String]) -> Option<String> {
    let choice: usize = input.parse().ok()?;
    options.get(choice.checked_sub(1)?).cloned()
}

fn handle_ask(
    config: &SiteConfig,
    message: &str,
    seed: Option<u64>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut router = Router::with_rng(config.chat.clone(), seeded_rng(seed));
    let mut state = ConversationState::new();
    let reply = router.respond(&mut state, message);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        print_reply(&reply)?;
    }
    Ok(())
}

fn print_reply(reply: &Reply) -> Result<(), Box<dyn Error>> {
    render_bot_message(&reply.text, &reply.options, false)?;
    if let Some(follow_up) = &reply.follow_up {
        render_bot_message(&follow_up.text, &[], false)?;
    }
    Ok(())
}

fn handle_topics(as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload: Vec<_> = KnowledgeBase::topics()
            .map(|topic| {
                json!({
                    "key": topic.key(),
                    "question": topic.question(),
                    "short_answer": topic.short_answer(),
                    "keywords": topic.keywords().collect::<Vec<_>>(),
                    "related": topic.related().map(|related| related.key()).collect::<Vec<_>>(),
                    "options": topic.options().collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let rows: Vec<(&str, &str)> = KnowledgeBase::topics()
        .map(|topic| (topic.key(), topic.question()))
        .collect();
    let width = rows
        .iter()
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or(3)
        .max("KEY".len());
    println!("{:<width$}  {}", "KEY", "QUESTION", width = width);
    println!("{:-<width$}  {}", "", "--------", width = width);
    for (key, question) in rows {
        println!("{:<width$}  {}", key, question, width = width);
    }
    Ok(())
}

fn handle_faq_search(
    config: &SiteConfig,
    data_dir: &Path,
    term: &str,
    track: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if term.trim().is_empty() {
        return Err("Search term cannot be empty".into());
    }
    let index = FaqIndex::from_knowledge();
    let results = index.search(term);
    if track {
        let tracked = term.trim().chars().count() >= config.faq.min_tracked_chars
            && open_metrics(config, data_dir).track_search(term);
        info!(tracked, "faq search tracking");
    }
    if as_json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.no_results {
        println!("No se encontraron resultados para \"{}\".", results.term);
        return Ok(());
    }
    for hit in &results.hits {
        if let Some(item) = index.item(hit.category, hit.item) {
            println!("- {}", item.question);
        }
    }
    Ok(())
}

fn handle_faq_suggest(config: &SiteConfig, term: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let suggestions = FaqIndex::from_knowledge().suggestions(
        term,
        config.faq.min_suggestion_chars,
        config.faq.suggestion_limit,
    );
    if as_json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else if suggestions.is_empty() {
        println!("Sin sugerencias.");
    } else {
        for suggestion in suggestions {
            println!("- {suggestion}");
        }
    }
    Ok(())
}

fn handle_metrics(
    config: &SiteConfig,
    data_dir: &Path,
    command: MetricsCommand,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let metrics = open_metrics(config, data_dir);
    match command {
        MetricsCommand::Top { limit } => {
            let limit = cmp::max(1, limit.unwrap_or(config.faq.top_queries));
            let rows = metrics.top_queries(limit);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_top_table(&rows);
            }
        }
        MetricsCommand::Stats => {
            let summary = metrics.summary();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_top_table(&summary.top);
                println!();
                println!("Total búsquedas: {}", summary.total_searches);
                println!("Total clicks: {}", summary.total_clicks);
            }
        }
        MetricsCommand::Reset => {
            metrics.reset();
            if as_json {
                println!("{}", json!({ "reset": true }));
            } else {
                println!("Métricas reiniciadas.");
            }
        }
        MetricsCommand::Export { out } => {
            let path = metrics.write_export(&out)?;
            if as_json {
                println!("{}", json!({ "path": path.display().to_string() }));
            } else {
                println!("Exportado a {}", path.display());
            }
        }
    }
    Ok(())
}

fn print_top_table(rows: &[TopQuery]) {
    if rows.is_empty() {
        println!("Aún no hay datos.");
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.text.chars().count())
        .max()
        .unwrap_or(4)
        .max("TEXT".len());
    println!("{:<width$}  {:<8}  {}", "TEXT", "KIND", "COUNT", width = width);
    println!("{:-<width$}  {:-<8}  {}", "", "", "-----", width = width);
    for row in rows {
        let kind = format!("{:?}", row.kind).to_lowercase();
        println!("{:<width$}  {:<8}  {}", row.text, kind, row.count, width = width);
    }
}

fn handle_video_classify(url: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let source = video::classify(url)?;
    print_source(&source, as_json)
}

fn handle_video_query(query: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let url = video::video_param(query).ok_or("No video parameter in query string")?;
    if !as_json {
        println!("URL: {url}");
    }
    let source = video::classify(&url)?;
    print_source(&source, as_json)
}

fn print_source(source: &VideoSource, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let mut payload = serde_json::to_value(source)?;
        payload["src"] = json!(source.src());
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    match source {
        VideoSource::YouTube { id } => println!("YouTube video {id}"),
        VideoSource::File { mime, .. } => println!("Video file ({mime})"),
    }
    println!("src: {}", source.src());
    Ok(())
}

fn render_bot_message(text: &str, options: &[String], as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", json!({ "text": text, "options": options }));
        return Ok(());
    }
    render_markdown_block(&markup_to_markdown(text));
    for (idx, option) in options.iter().enumerate() {
        println!("  {}) {}", idx + 1, option);
    }
    Ok(())
}

/// Chat answers carry a little inline HTML; map it onto markdown for the terminal.
fn markup_to_markdown(markup: &str) -> String {
    let lines = LINE_BREAK.replace_all(markup, "\n");
    let bold = STRONG.replace_all(&lines, "**");
    TAG.replace_all(&bold, "").into_owned()
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    MadSkin::default()
}

fn render_markdown_block(body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    if stdout_is_tty() {
        let skin = markdown_skin();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_becomes_markdown() {
        assert_eq!(
            markup_to_markdown("Hola<br><strong>7 estaciones</strong> <a href=\"x\">aquí</a>"),
            "Hola\n**7 estaciones** aquí"
        );
    }

    #[test]
    fn numeric_input_picks_option() {
        let options = vec!["Ver tarifas".to_string(), "Ver horarios".to_string()];
        assert_eq!(pick_option("2", &options).as_deref(), Some("Ver horarios"));
        assert_eq!(pick_option("0", &options), None);
        assert_eq!(pick_option("3", &options), None);
        assert_eq!(pick_option("hola", &options), None);
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["cablebus-rs", "--json", "ask", "cuanto", "cuesta"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Ask { .. }));
    }
}
