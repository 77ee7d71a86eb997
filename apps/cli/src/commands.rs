//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use manualchat_catalog::{Catalog, ProductCatalog, parse_products};
use manualchat_core::{ChatRequest, ContextComposer, DirectoryResolver, DocumentResolver};
use manualchat_shared::{AppConfig, expand_home, init_config, load_config, resolve_api_key};
use manualchat_upstream::OpenAiCompatibleClient;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// manualchat: product-support chat grounded in PDF manuals.
#[derive(Parser)]
#[command(
    name = "manualchat",
    version,
    about = "Product-support chat server that answers from PDF manuals and product metadata.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Start the HTTP chat server.
    Serve {
        /// Address to bind (overrides `server.bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the text of a PDF.
    Extract {
        /// PDF file.
        pdf: PathBuf,

        /// First page of a range (1-indexed, needs --end).
        #[arg(long)]
        start: Option<u32>,

        /// Last page of a range (inclusive, needs --start).
        #[arg(long)]
        end: Option<u32>,

        /// Print each page under its own header.
        #[arg(long, conflicts_with_all = ["start", "end"])]
        pages: bool,
    },

    /// Print the numbered sections of a PDF, optionally filtered by a question.
    Sections {
        /// PDF file.
        pdf: PathBuf,

        /// Question to select relevant sections with.
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Print the messages a chat request would send upstream, as JSON.
    Compose {
        /// Chat request body (JSON file).
        request: PathBuf,
    },

    /// Product catalog management.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum CatalogAction {
    /// Insert or replace products from a JSON array.
    Import {
        /// Products file.
        file: PathBuf,
    },
    /// List stored products.
    List,
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

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "manualchat=info,tower_http=info",
        1 => "manualchat=debug,tower_http=debug",
        _ => "manualchat=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    match cli.command {
        Command::Serve { bind } => cmd_serve(bind.as_deref()).await,
        Command::Extract {
            pdf,
            start,
            end,
            pages,
        } => cmd_extract(pdf, page_range(start, end)?, pages).await,
        Command::Sections { pdf, query } => cmd_sections(pdf, query.as_deref()).await,
        Command::Compose { request } => cmd_compose(&request).await,
        Command::Catalog { action } => match action {
            CatalogAction::Import { file } => cmd_catalog_import(&file).await,
            CatalogAction::List => cmd_catalog_list().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// `--start` and `--end` come as a pair.
fn page_range(start: Option<u32>, end: Option<u32>) -> Result<Option<(u32, u32)>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some((start, end))),
        (None, None) => Ok(None),
        _ => Err(eyre!("--start and --end must be given together")),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    let client = OpenAiCompatibleClient::new(&config.upstream, api_key)?;
    info!(model = client.model(), "upstream client ready");

    manualchat_server::serve(&config, Arc::new(client), bind).await?;
    Ok(())
}

async fn cmd_extract(pdf: PathBuf, range: Option<(u32, u32)>, pages: bool) -> Result<()> {
    let doc = manualchat_extract::load(pdf).await?;
    info!(path = %doc.path().display(), pages = doc.num_pages(), "extracted document");

    if pages {
        for page in doc.pages() {
            println!("--- page {} ---", page.page_number);
            println!("{}", page.text);
        }
        return Ok(());
    }

    let text = match range {
        Some((start, end)) => doc.section(start, end)?,
        None => doc.text().text,
    };
    println!("{text}");
    Ok(())
}

async fn cmd_sections(pdf: PathBuf, query: Option<&str>) -> Result<()> {
    let doc = manualchat_extract::load(pdf).await?;
    let sections = manualchat_sections::relevant_sections(&doc.text().text, query);

    if sections.is_empty() {
        println!("No numbered sections found.");
        return Ok(());
    }
    println!("{}", manualchat_sections::render_sections(&sections));
    Ok(())
}

async fn cmd_compose(request: &Path) -> Result<()> {
    let body = std::fs::read(request)
        .map_err(|e| eyre!("failed to read {}: {e}", request.display()))?;
    let request = ChatRequest::from_json(&body)?.validate()?;

    let config = load_config()?;
    let catalog: Arc<dyn ProductCatalog> =
        Arc::new(Catalog::open(&expand_home(&config.catalog.db_path)?).await?);
    let resolver: Arc<dyn DocumentResolver> =
        Arc::new(DirectoryResolver::from_config(&config.documents)?);
    let composer = ContextComposer::new(catalog, resolver, (&config.context).into());

    let messages = composer.compose(&request).await;
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

async fn cmd_catalog_import(file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .map_err(|e| eyre!("failed to read {}: {e}", file.display()))?;
    let products = parse_products(&json)?;

    let config = load_config()?;
    let db_path = expand_home(&config.catalog.db_path)?;
    let catalog = Catalog::open(&db_path).await?;
    let count = catalog.import_products(&products).await?;

    println!("Imported {count} product(s) into {}", db_path.display());
    Ok(())
}

async fn cmd_catalog_list() -> Result<()> {
    let config = load_config()?;
    let catalog = Catalog::open_readonly(&expand_home(&config.catalog.db_path)?).await?;
    let products = catalog.list_products().await?;

    if products.is_empty() {
        println!("No products in the catalog.");
        return Ok(());
    }
    for product in products {
        println!(
            "{:<14} {:<20} {}",
            product.product_type.as_str(),
            product.id,
            product.name
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
