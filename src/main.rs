use std::io::IsTerminal;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use medrag_core::{MedragConfig, OutputFormat, RetrievalHit, TriageResult, WebSearchConfig};
use medrag_retrieval::context::{fallback_response, format_context, DISCLAIMER};
use medrag_retrieval::embedding::EmbeddingClient;
use medrag_retrieval::web::SerperClient;
use medrag_retrieval::{Corpus, HybridResult, HybridSearch};
use medrag_triage::Triage;

#[derive(Parser)]
#[command(
    name = "medrag",
    version,
    about = "Hybrid evidence retrieval and triage for first-aid emergencies",
    long_about = "medrag triages a free-text emergency question and gathers ranked evidence for it\n\
                   from a vetted local corpus, a live web search, and keyword matching.\n\n\
                   It does not generate advice. Every answer built on its output must carry\n\
                   the medical disclaimer.\n\n\
                   Examples:\n  \
                     medrag triage 'crushing chest pain down my left arm'\n  \
                     medrag search 'glucometer reads 55 mg/dL' --context\n  \
                     medrag samples --search          Run the built-in sample questions\n  \
                     medrag doctor                    Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .medrag.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output (debug logs on stderr)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a question by condition and urgency
    #[command(long_about = "Classify a question by condition and urgency.\n\n\
        Runs only the rule-based triage: no corpus, embeddings, or network needed.\n\
        Reads the question from stdin when omitted.\n\n\
        Examples:\n  medrag triage 'my father is unconscious, sugar crashed'\n  echo 'flank pain after ibuprofen' | medrag triage")]
    Triage {
        /// The question to classify
        query: Option<String>,
    },
    /// Retrieve ranked evidence for a question
    #[command(
        long_about = "Retrieve ranked evidence for a question.\n\n\
        Embeds the local corpus, then runs semantic, web, and keyword search\n\
        concurrently and fuses them into at most five pieces of evidence.\n\
        Requires an embedding provider key and a Serper API key.\n\n\
        Examples:\n  medrag search 'CKD patient with potassium 6.1 mmol/L'\n  medrag search 'angina, how many nitroglycerin tablets' --context"
    )]
    Search {
        /// The question to search for
        query: Option<String>,

        /// Print the numbered citation block with the disclaimer
        #[arg(long)]
        context: bool,
    },
    /// Run the built-in sample emergency questions
    #[command(long_about = "Run the built-in sample emergency questions.\n\n\
        Triage only by default. With --search, runs the full hybrid search for each\n\
        question and reports timing and evidence counts.\n\n\
        Examples:\n  medrag samples\n  medrag samples --search --format json")]
    Samples {
        /// Run the full hybrid search, not just triage
        #[arg(long)]
        search: bool,
    },
    /// Create a default .medrag.toml configuration file
    Init,
    /// Check setup and environment
    Doctor,
    /// Generate shell completions
    #[command(
        long_about = "Generate shell completions for bash, zsh, fish, elvish, or powershell.\n\n\
        Examples:\n  medrag completions bash > ~/.bash_completion.d/medrag\n  medrag completions zsh > ~/.zfunc/_medrag"
    )]
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

const SAMPLE_QUERIES: [&str; 10] = [
    "I'm sweating, shaky, and my glucometer reads 55 mg/dL. What should I do right now?",
    "My diabetic father just became unconscious; we think his sugar crashed. What immediate first-aid should we give?",
    "A pregnant woman with gestational diabetes keeps getting fasting readings around 130 mg/dL. What does this mean and how should we manage it?",
    "Crushing chest pain shooting down my left arm. Do I chew aspirin first or call an ambulance?",
    "I'm having angina; how many nitroglycerin tablets can I safely take and when must I stop?",
    "Grandma has chronic heart failure, is suddenly short of breath, and her ankles are swelling. Any first-aid steps before we reach the ER?",
    "After working in the sun all day I've barely urinated and my creatinine just rose 0.4 mg/dL. Could this be acute kidney injury and what should I do?",
    "CKD patient with a potassium level of 6.1 mmol/L. What emergency measures can we start right away?",
    "I took ibuprofen for back pain; now my flanks hurt and I'm worried about kidney damage. Any immediate precautions?",
    "Type 2 diabetic, extremely thirsty, glucose meter says 'HI' but urine ketone strip is negative. What's happening and what's the first-aid?",
];

const DEFAULT_CONFIG: &str = r#"# medrag configuration

[corpus]
# JSON array of {"id": 1, "content": "..."} objects
# path = "data/corpus.json"
# Exact number of entries required; 0 disables the check
# expected_count = 60

[embedding]
# provider = "openai"            # openai | voyage | ollama
# model = "text-embedding-3-small"
# base_url = "https://api.openai.com/v1"
# batch_size = 64

[web_search]
# provider = "serper"            # key from SERPER_API_KEY when unset
# num_results = 3
# country = "us"
# language = "en"
# timeout_secs = 10

[retrieval]
# local_top_k = 3
# keyword_top_k = 3
# max_evidence = 5
# stream_timeout_secs = 10

[retrieval.weights]
# local = 0.5
# web = 0.3
# keyword = 0.2

# Replace a built-in triage vocabulary
# [triage]
# urgency = ["unconscious", "not breathing", "ambulance"]
"#;

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SampleRun {
    query: &'static str,
    #[serde(flatten)]
    triage: TriageResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidence_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_streams: Vec<medrag_core::SearchType>,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "warn,medrag=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[31m+\x1b[0m \x1b[1mmedrag\x1b[0m v{version}: evidence retrieval for first-aid emergencies\n");

        println!("Quick start:");
        println!("  \x1b[36mmedrag init\x1b[0m                   Create a .medrag.toml config file");
        println!("  \x1b[36mmedrag triage '<question>'\x1b[0m    Classify condition and urgency");
        println!("  \x1b[36mmedrag search '<question>'\x1b[0m    Retrieve ranked evidence\n");

        println!("All commands:");
        println!("  \x1b[32mtriage\x1b[0m       Rule-based condition and urgency");
        println!("  \x1b[32msearch\x1b[0m       Semantic + web + keyword hybrid search");
        println!("  \x1b[32msamples\x1b[0m      Run the built-in sample questions");
        println!("  \x1b[32mdoctor\x1b[0m       Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m         Create default configuration\n");
    } else {
        println!("medrag v{version}: evidence retrieval for first-aid emergencies\n");

        println!("Quick start:");
        println!("  medrag init                   Create a .medrag.toml config file");
        println!("  medrag triage '<question>'    Classify condition and urgency");
        println!("  medrag search '<question>'    Retrieve ranked evidence\n");

        println!("All commands:");
        println!("  triage       Rule-based condition and urgency");
        println!("  search       Semantic + web + keyword hybrid search");
        println!("  samples      Run the built-in sample questions");
        println!("  doctor       Check your setup and environment");
        println!("  init         Create default configuration\n");
    }

    println!("Run 'medrag <command> --help' for details.");
}

fn read_query(query: &Option<String>) -> Result<String> {
    let text = match query {
        Some(q) => q.clone(),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            input
        }
    };
    Ok(text.trim().to_string())
}

fn load_config(path: Option<&PathBuf>) -> Result<MedragConfig> {
    let config = match path {
        Some(path) => MedragConfig::from_file(path)
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = std::path::Path::new(".medrag.toml");
            if default_path.exists() {
                MedragConfig::from_file(default_path).wrap_err("loading .medrag.toml")?
            } else {
                MedragConfig::default()
            }
        }
    };
    Ok(config)
}

fn ensure_api_keys(config: &MedragConfig) -> Result<()> {
    if let Some(var) = config.embedding.api_key_env_var() {
        if config.embedding.api_key.is_none() && std::env::var(var).is_err() {
            miette::bail!(miette::miette!(
                help = format!("Set {var} or add api_key in your .medrag.toml under [embedding]"),
                "No API key configured for embedding provider '{}'",
                config.embedding.provider
            ));
        }
    }
    if config.web_search.api_key.is_none()
        && std::env::var(WebSearchConfig::API_KEY_ENV).is_err()
    {
        miette::bail!(miette::miette!(
            help = format!(
                "Set {} or add api_key in your .medrag.toml under [web_search]",
                WebSearchConfig::API_KEY_ENV
            ),
            "No API key configured for web search"
        ));
    }
    Ok(())
}

async fn build_engine(config: &MedragConfig) -> Result<HybridSearch> {
    ensure_api_keys(config)?;

    let corpus = Arc::new(Corpus::load(
        &config.corpus.path,
        config.corpus.expected_count,
    )?);
    let embedder = EmbeddingClient::with_config(&config.embedding)?;
    let web = SerperClient::with_config(&config.web_search)?;
    let engine = HybridSearch::from_config(corpus, Arc::new(embedder), Arc::new(web), config);

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
        {
            pb.set_style(style);
        }
        pb.set_message("Embedding corpus...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let indexed = engine.initialize().await.inspect_err(|_e| {
        if let Some(pb) = &spinner {
            pb.finish_with_message("Failed");
        }
    })?;

    if let Some(pb) = spinner {
        pb.finish_with_message(format!("Indexed {indexed} corpus entries"));
    }

    Ok(engine)
}

fn keyword_list(triage: &TriageResult) -> String {
    if triage.keywords.is_empty() {
        "-".into()
    } else {
        triage
            .keywords
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn condition_label(triage: &TriageResult) -> String {
    triage
        .condition
        .map_or_else(|| "none".to_string(), |c| c.to_string())
}

fn describe_hit(hit: &RetrievalHit) -> String {
    match (hit.sentence(), hit.web_item()) {
        (Some(entry), _) => format!("(ID {}) {}", entry.id, entry.content),
        (None, Some(item)) if item.link.is_empty() => format!("{}: {}", item.title, item.snippet),
        (None, Some(item)) => format!("{}: {} <{}>", item.title, item.snippet, item.link),
        (None, None) => String::new(),
    }
}

fn print_triage(triage: &TriageResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(triage).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Triage\n");
            println!("- **Condition:** {}", condition_label(triage));
            println!("- **Urgency:** {}", triage.urgency);
            println!("- **Keywords:** {}", keyword_list(triage));
        }
        OutputFormat::Text => {
            println!("Condition: {}", condition_label(triage));
            println!("Urgency:   {}", triage.urgency);
            println!("Keywords:  {}", keyword_list(triage));
        }
    }
    Ok(())
}

fn print_search(result: &HybridResult, format: OutputFormat, context: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(result).into_diagnostic()?;
            if context {
                value["context"] = serde_json::Value::String(format_context(&result.evidence));
                value["disclaimer"] = serde_json::Value::String(DISCLAIMER.to_string());
            }
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Evidence\n");
            println!(
                "**Condition:** {} | **Urgency:** {}\n",
                condition_label(&result.triage),
                result.triage.urgency
            );
            if result.evidence.is_empty() {
                println!("{}", fallback_response());
                return Ok(());
            }
            for (i, hit) in result.evidence.iter().enumerate() {
                println!(
                    "{}. `{}` (score: {:.3}) {}",
                    i + 1,
                    hit.search_type(),
                    hit.final_score,
                    describe_hit(hit)
                );
            }
            if context {
                println!("\n## Context\n\n{DISCLAIMER}\n\n{}", format_context(&result.evidence));
            }
        }
        OutputFormat::Text => {
            println!(
                "Condition: {}   Urgency: {}",
                condition_label(&result.triage),
                result.triage.urgency
            );
            println!("Keywords:  {}\n", keyword_list(&result.triage));
            if result.evidence.is_empty() {
                println!("{}", fallback_response());
            } else if context {
                println!("{DISCLAIMER}\n\n{}", format_context(&result.evidence));
            } else {
                for (i, hit) in result.evidence.iter().enumerate() {
                    println!(
                        "{:>2}. [{:.3}] {:<15} {}",
                        i + 1,
                        hit.final_score,
                        hit.search_type().to_string(),
                        describe_hit(hit)
                    );
                }
            }
            if !result.failed_streams.is_empty() {
                let names: Vec<String> =
                    result.failed_streams.iter().map(|s| s.to_string()).collect();
                eprintln!("\nUnavailable streams: {}", names.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_samples(config: &MedragConfig, search: bool, format: OutputFormat) -> Result<()> {
    let engine = if search {
        Some(build_engine(config).await?)
    } else {
        None
    };
    let triage = Triage::from_config(&config.triage);

    let mut runs = Vec::with_capacity(SAMPLE_QUERIES.len());
    for query in SAMPLE_QUERIES {
        let run = match &engine {
            Some(engine) => {
                let started = Instant::now();
                let result = engine.search(query).await?;
                SampleRun {
                    query,
                    evidence_count: Some(result.evidence.len()),
                    elapsed_ms: Some(started.elapsed().as_millis()),
                    failed_streams: result.failed_streams,
                    triage: result.triage,
                }
            }
            None => SampleRun {
                query,
                triage: triage.assess(query),
                evidence_count: None,
                elapsed_ms: None,
                failed_streams: Vec::new(),
            },
        };
        runs.push(run);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&runs).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("| # | Condition | Urgency | Evidence | ms | Question |");
            println!("|---|-----------|---------|----------|----|----------|");
            for (i, run) in runs.iter().enumerate() {
                println!(
                    "| {} | {} | {} | {} | {} | {} |",
                    i + 1,
                    condition_label(&run.triage),
                    run.triage.urgency,
                    run.evidence_count.map_or("-".into(), |n| n.to_string()),
                    run.elapsed_ms.map_or("-".into(), |n| n.to_string()),
                    run.query
                );
            }
        }
        OutputFormat::Text => {
            for (i, run) in runs.iter().enumerate() {
                let timing = match (run.evidence_count, run.elapsed_ms) {
                    (Some(n), Some(ms)) => format!("  {n} evidence in {ms} ms"),
                    _ => String::new(),
                };
                println!(
                    "{:>2}. {:<8} {:<9}{timing}\n    {}",
                    i + 1,
                    condition_label(&run.triage),
                    run.triage.urgency.to_string(),
                    run.query
                );
            }
            let detected = runs.iter().filter(|r| r.triage.condition.is_some()).count();
            println!("\n{detected}/{} questions matched a condition", runs.len());
        }
    }
    Ok(())
}

fn run_doctor(config: &MedragConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    let config_path = std::path::Path::new(".medrag.toml");
    if config_path.exists() {
        checks.push(CheckResult::pass("config_file", ".medrag.toml found"));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".medrag.toml not found",
            "run 'medrag init' to create a default config",
        ));
    }

    // 2. Corpus
    let corpus_path = &config.corpus.path;
    match Corpus::load(corpus_path, config.corpus.expected_count) {
        Ok(corpus) => {
            let (d, c, r) = (
                corpus.by_category(medrag_core::Category::Diabetes).count(),
                corpus.by_category(medrag_core::Category::Cardiac).count(),
                corpus.by_category(medrag_core::Category::Renal).count(),
            );
            checks.push(CheckResult::pass(
                "corpus",
                format!(
                    "{} entries ({d} diabetes, {c} cardiac, {r} renal)",
                    corpus.len()
                ),
            ));
        }
        Err(medrag_core::MedragError::FileNotFound(path)) => checks.push(CheckResult::fail(
            "corpus",
            format!("{} not found", path.display()),
            "set [corpus] path in .medrag.toml",
        )),
        Err(e) => checks.push(CheckResult::fail(
            "corpus",
            e.to_string(),
            "fix the corpus file or adjust [corpus] expected_count",
        )),
    }

    // 3. Embedding provider + API key
    let emb = &config.embedding;
    checks.push(CheckResult::pass(
        "embedding_provider",
        format!("{} (model: {})", emb.provider, emb.model),
    ));
    match emb.api_key_env_var() {
        None => checks.push(CheckResult::info(
            "embedding_api_key",
            format!("not needed for {}", emb.provider),
        )),
        Some(var) if emb.api_key.is_some() || std::env::var(var).is_ok() => {
            checks.push(CheckResult::pass("embedding_api_key", format!("{var} set")));
        }
        Some(var) => checks.push(CheckResult::fail(
            "embedding_api_key",
            format!("{var} not set"),
            format!("export {var}=... or set api_key in .medrag.toml [embedding]"),
        )),
    }

    // 4. Web search key
    let web_var = WebSearchConfig::API_KEY_ENV;
    if config.web_search.api_key.is_some() || std::env::var(web_var).is_ok() {
        checks.push(CheckResult::pass("web_search_api_key", format!("{web_var} set")));
    } else {
        checks.push(CheckResult::fail(
            "web_search_api_key",
            format!("{web_var} not set"),
            format!("export {web_var}=... (sign up at https://serper.dev)"),
        ));
    }

    // 5. Fusion weights
    let w = &config.retrieval.weights;
    checks.push(CheckResult::info(
        "fusion_weights",
        format!("local {} / web {} / keyword {}", w.local, w.web, w.keyword),
    ));

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("medrag v{version}: environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(format = %cli.format, corpus = %config.corpus.path.display(), "configuration loaded");

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Triage { ref query }) => {
            let query = read_query(query)?;
            let triage = Triage::from_config(&config.triage).assess(&query);
            print_triage(&triage, cli.format)?;
        }
        Some(Command::Search { ref query, context }) => {
            let query = read_query(query)?;
            let engine = build_engine(&config).await?;
            let result = engine.search(&query).await?;
            print_search(&result, cli.format, context)?;
        }
        Some(Command::Samples { search }) => {
            run_samples(&config, search, cli.format).await?;
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".medrag.toml");
            if path.exists() {
                miette::bail!(".medrag.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .medrag.toml with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "medrag", &mut std::io::stdout());
        }
    }

    Ok(())
}
