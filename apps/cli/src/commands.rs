//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use linkback_core::{KnownLinkbacks, LinkbackValidator, SelfLinkPolicy};
use linkback_fetcher::HttpFetcher;
use linkback_routing::UrlVariantGenerator;
use linkback_shared::{
    AppConfig, ContentRef, ExcerptOptions, FetchOptions, LinkbackCandidate, RejectionError,
    init_config, load_config, load_config_from,
};
use tracing::info;
use url::Url;

/// Exit status for a rejected claim (as opposed to an operational failure).
const EXIT_REJECTED: i32 = 2;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// linkback: verify that a remote page really links to local content.
#[derive(Parser)]
#[command(
    name = "linkback",
    version,
    about = "Verify received pingback/webmention claims against the source page.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.linkback/linkback.toml).
    #[arg(long, global = true, env = "LINKBACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Verify a linkback claim and print the accepted record as JSON.
    Verify {
        /// URL of the page claiming to link to local content.
        source_url: String,

        /// Local content id the claim points at.
        #[arg(short, long)]
        content: String,

        /// Protocol that produced the claim (pingback, webmention, ...).
        #[arg(long)]
        handler: Option<String>,

        /// Title supplied with the claim.
        #[arg(long, default_value = "")]
        title: String,

        /// Excerpt supplied with the claim.
        #[arg(long, default_value = "")]
        excerpt: String,

        /// Network origin of the submitter.
        #[arg(long)]
        origin: Option<String>,

        /// JSON array of already registered linkbacks.
        #[arg(long)]
        known: Option<PathBuf>,

        /// Override the Accept header sent to the source.
        #[arg(long)]
        accept: Option<String>,

        /// Override the fetch timeout.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the URL variants a backlink may use for a content id.
    Variants {
        /// Local content id.
        #[arg(short, long)]
        content: String,

        /// Include relative, per-locale and encoded forms.
        #[arg(long)]
        all_locales: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries results.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "linkback=info",
        1 => "linkback=debug",
        _ => "linkback=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Verify {
            source_url,
            content,
            handler,
            title,
            excerpt,
            origin,
            known,
            accept,
            timeout_secs,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(accept) = accept {
                config.fetch.accept = accept;
            }
            if let Some(secs) = timeout_secs {
                config.fetch.timeout_secs = secs;
            }
            let candidate = LinkbackCandidate {
                source_url,
                local_content_ref: Some(parse_content(&content)?),
                title,
                excerpt,
                handler,
                origin,
            };
            cmd_verify(&config, candidate, known.as_deref()).await
        }
        Command::Variants {
            content,
            all_locales,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_variants(&config, &parse_content(&content)?, all_locales)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

fn parse_content(raw: &str) -> Result<ContentRef> {
    raw.parse::<ContentRef>()
        .map_err(|e| eyre!("invalid --content '{raw}': {e}"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_verify(
    config: &AppConfig,
    candidate: LinkbackCandidate,
    known: Option<&Path>,
) -> Result<()> {
    let base_url = Url::parse(&config.site.base_url)
        .map_err(|e| eyre!("invalid site.base_url '{}': {e}", config.site.base_url))?;

    let known = match known {
        Some(path) => KnownLinkbacks::load(path)?,
        None => KnownLinkbacks::new(),
    };
    let policy = (SelfLinkPolicy::for_site(&base_url)?, known);

    let fetcher = HttpFetcher::new(&FetchOptions::from(config))?;
    let variants = UrlVariantGenerator::from_config(config)?;
    let validator = LinkbackValidator::new(fetcher, variants, policy)
        .with_excerpt_options(ExcerptOptions::from(config));

    info!(
        source_url = %candidate.source_url,
        handler = candidate.handler.as_deref().unwrap_or("-"),
        "verifying linkback"
    );

    let spinner = spinner(&format!("Verifying {}", candidate.source_url));
    let outcome = validator.validate(candidate).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(rejection) => {
            for line in rejection_report(&rejection) {
                eprintln!("{line}");
            }
            std::process::exit(EXIT_REJECTED);
        }
    }
}

/// Human-readable lines describing a rejection.
fn rejection_report(rejection: &RejectionError) -> Vec<String> {
    let mut lines = vec![format!("Rejected: {rejection}")];
    if let Some(status) = rejection.http_status() {
        lines.push(format!("  HTTP status: {status}"));
    }
    if rejection.kind.is_transient() {
        lines.push("  The source could not be fetched; a later attempt may succeed.".into());
    }
    lines
}

fn cmd_variants(config: &AppConfig, content: &ContentRef, all_locales: bool) -> Result<()> {
    let generator = UrlVariantGenerator::from_config(config)?;
    for url in generator.generate(content, all_locales).iter() {
        println!("{url}");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkback_shared::FetchError;

    #[test]
    fn verify_args_parse() {
        let cli = Cli::try_parse_from([
            "linkback",
            "verify",
            "http://example.com/post",
            "--content",
            "42",
            "--handler",
            "webmention",
            "--accept",
            "text/html",
        ])
        .expect("parse");

        match cli.command {
            Command::Verify {
                source_url,
                content,
                handler,
                title,
                accept,
                ..
            } => {
                assert_eq!(source_url, "http://example.com/post");
                assert_eq!(content, "42");
                assert_eq!(handler.as_deref(), Some("webmention"));
                assert!(title.is_empty());
                assert_eq!(accept.as_deref(), Some("text/html"));
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn handler_is_optional_on_the_command_line() {
        let cli = Cli::try_parse_from(["linkback", "verify", "http://x.test/", "-c", "1"])
            .expect("parse");
        assert!(matches!(cli.command, Command::Verify { handler: None, .. }));
    }

    #[test]
    fn content_id_must_be_valid() {
        assert!(parse_content("42").is_ok());
        assert!(parse_content("node/42").is_err());
    }

    #[test]
    fn transient_rejection_suggests_retry() {
        let fetch_failed = RejectionError::fetch_failed(
            "http://example.com/post",
            FetchError::Http {
                status: 503,
                reason: "Service Unavailable".into(),
            },
        );
        let report = rejection_report(&fetch_failed);
        assert_eq!(report.len(), 3);
        assert!(report[1].contains("503"));
        assert!(report[2].contains("later attempt"));

        let missing = RejectionError::backlink_not_found(&ContentRef::from(42u64));
        assert_eq!(rejection_report(&missing).len(), 1);
    }

    #[test]
    fn variants_use_config_file() {
        let dir = std::env::temp_dir().join(format!("lb-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("linkback.toml");
        std::fs::write(&path, "[site]\nbase_url = \"https://mysite.test\"\n").unwrap();

        let config = resolve_config(Some(&path)).expect("config");
        let generator = UrlVariantGenerator::from_config(&config).unwrap();
        let urls = generator.generate(&ContentRef::from(42u64), false).into_vec();
        assert_eq!(urls, ["https://mysite.test/node/42"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
