//! memstore CLI
//!
//! Command-line access to every store, cache and generation operation.

use clap::{Args, Parser, Subcommand};
use console::style;
use memstore::cache::CacheLayer;
use memstore::config::{validate_config, CacheBackendType, CacheConfig, Config, LogConfig, LogFormat};
use memstore::core::types::{parse_metadata, EmbeddingRecord, Page, RecordUpdate, ScoredRecord};
use memstore::core::EmbeddingStore;
use memstore::database::{init_pool, init_pool_for_migrations, migrations, PgEmbeddingStore};
use memstore::memory::MemoryService;
use memstore::{provider, Error, Result, VERSION};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "memstore",
    version = VERSION,
    about = "memstore - semantic memory store with a typed cache",
    long_about = None
)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,

    /// Check configuration and connectivity
    Status,

    /// Generate a vector for TEXT and store it
    Save {
        text: String,
        #[arg(short, long)]
        category: Option<String>,
        /// Metadata as a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Similarity search by query text
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Exclusive minimum similarity
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f64>,
    },

    /// Case-insensitive substring search
    Find {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show one record
    Get { id: String },

    /// List records, newest first
    List {
        #[arg(short, long, allow_hyphen_values = true)]
        limit: Option<String>,
        #[arg(short, long, allow_hyphen_values = true)]
        offset: Option<String>,
    },

    /// List records in a category, newest first
    Category { name: String },

    /// Update text, category or metadata of a record
    Update {
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Delete a record
    Delete { id: String },

    /// Generate a vector without storing it
    Embed { text: String },

    /// Generate a completion
    Complete { prompt: String },

    /// Key/value cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
struct KeyArg {
    key: String,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Set a scalar
    Set {
        key: String,
        value: String,
        /// Expiry in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Get a scalar
    Get(KeyArg),
    /// Delete a key
    Del(KeyArg),
    /// Check whether a key exists
    Exists(KeyArg),
    /// Set a hash field
    Hset { key: String, field: String, value: String },
    /// Get a hash field
    Hget { key: String, field: String },
    /// Get all hash fields
    Hgetall(KeyArg),
    /// Delete a hash field
    Hdel { key: String, field: String },
    /// Append to a list
    Rpush { key: String, value: String },
    /// Prepend to a list
    Lpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Read a list range (inclusive, negative counts from the tail)
    Lrange {
        key: String,
        #[arg(allow_negative_numbers = true)]
        start: i64,
        #[arg(allow_negative_numbers = true)]
        end: i64,
    },
    /// Remove every occurrence of a value from a list
    Lrem { key: String, value: String },
    /// Add set members
    Sadd {
        key: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// List set members
    Smembers(KeyArg),
    /// Test set membership
    Sismember { key: String, member: String },
    /// Remove a set member
    Srem { key: String, member: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    init_logging(&config.log);
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Migrate => run_migrations(&config).await,
        Commands::Status => check_status(&config).await,
        Commands::Save { text, category, metadata } => {
            let metadata = metadata.as_deref().map(parse_metadata).transpose()?;
            let service = open_service(&config).await?;
            let record = service.save_text(&text, category, metadata).await?;
            out.record(&record)
        }
        Commands::Search { query, limit, threshold } => {
            let service = open_service(&config).await?;
            let results = service.search_by_text(&query, limit, threshold).await?;
            out.scored(&results)
        }
        Commands::Find { query, limit, category } => {
            let store = open_store(&config).await?;
            let records = store.search_by_text(&query, limit, category.as_deref()).await?;
            out.records(&records)
        }
        Commands::Get { id } => {
            let store = open_store(&config).await?;
            let record = store.fetch(parse_id(&id)?).await?;
            out.record(&record)
        }
        Commands::List { limit, offset } => {
            let page = Page::parse(limit.as_deref(), offset.as_deref())?;
            let store = open_store(&config).await?;
            let page = store.list_all(page).await?;
            if out.json {
                return out.print_json(&page);
            }
            out.records(&page.records)?;
            println!("{}", style(format!("{} of {} total", page.records.len(), page.total)).dim());
            Ok(())
        }
        Commands::Category { name } => {
            let store = open_store(&config).await?;
            out.records(&store.list_by_category(&name).await?)
        }
        Commands::Update { id, text, category, metadata } => {
            let update = RecordUpdate {
                text,
                category,
                metadata: metadata.as_deref().map(parse_metadata).transpose()?,
            };
            let store = open_store(&config).await?;
            let record = store.update(parse_id(&id)?, update).await?;
            out.record(&record)
        }
        Commands::Delete { id } => {
            let id = parse_id(&id)?;
            let store = open_store(&config).await?;
            let deleted = store.delete(id).await?;
            out.value(&deleted, &delete_summary(id, deleted))
        }
        Commands::Embed { text } => {
            let service = open_service(&config).await?;
            let vector = service.generate_vector(&text).await?;
            out.value(&vector, &format!("{} dimensions: {:?}", vector.len(), vector))
        }
        Commands::Complete { prompt } => {
            let service = open_service(&config).await?;
            let text = service.generate_completion(&prompt).await?;
            out.value(&text, &text)
        }
        Commands::Cache { action } => {
            require_shared_cache(&config.cache)?;
            let cache = CacheLayer::new();
            cache.connect(&config.cache).await?;
            let result = run_cache(&cache, action, &out).await;
            cache.disconnect().await?;
            result
        }
    }
}

fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// `cache` subcommands need a backend that outlives the process
fn require_shared_cache(config: &CacheConfig) -> Result<()> {
    if config.backend == CacheBackendType::Local {
        return Err(Error::Config(
            "cache commands need a shared backend; the local cache is dropped when the command exits \
             (set CACHE_BACKEND=redis)"
                .into(),
        ));
    }
    Ok(())
}

fn delete_summary(id: Uuid, deleted: bool) -> String {
    if deleted {
        format!("Deleted {}", id)
    } else {
        format!("false ({} not found)", id)
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Validation(format!("invalid id '{}': {}", raw, e)))
}

async fn open_store(config: &Config) -> Result<Arc<PgEmbeddingStore>> {
    let pool = init_pool(&config.database).await?;
    Ok(Arc::new(PgEmbeddingStore::open(pool, config.database.dimensions).await?))
}

async fn open_service(config: &Config) -> Result<MemoryService> {
    let store = open_store(config).await?;
    let providers = provider::build(&config.provider)?;

    let cache = Arc::new(CacheLayer::new());
    cache.connect(&config.cache).await?;

    let mut service = MemoryService::new(store, providers.embedder)
        .with_search_config(config.search.clone())
        .with_vector_cache(cache, config.cache.vector_ttl);
    if let Some(completer) = providers.completer {
        service = service.with_completer(completer);
    }
    Ok(service)
}

/// Run database migrations
async fn run_migrations(config: &Config) -> Result<()> {
    println!("Running database migrations...\n");

    // Use init_pool_for_migrations to skip pgvector check - migrations will create it
    let pool = init_pool_for_migrations(&config.database).await?;
    migrations::run(&pool).await?;

    println!("{} Migrations complete!", style("✓").green());
    Ok(())
}

/// Check configuration and connectivity
async fn check_status(config: &Config) -> Result<()> {
    println!("{}\n", style("memstore status").bold());

    let validation = validate_config(config);
    if validation.valid {
        println!("Configuration: {}", style("ok").green());
    } else {
        println!("Configuration: {}", style("invalid").red());
    }
    for issue in &validation.errors {
        println!("  {} {}", style("error").red(), issue);
    }
    for issue in &validation.warnings {
        println!("  {} {}", style("warn").yellow(), issue);
    }

    match open_store(config).await {
        Ok(store) => {
            let count = store.count().await?;
            let dims = store
                .dimensions()
                .map_or_else(|| "not established".to_string(), |d| d.to_string());
            println!("PostgreSQL: {} ({} records, dimensions {})", style("connected").green(), count, dims);
        }
        Err(e) => println!("PostgreSQL: {} {}", style("unavailable").red(), e),
    }

    let cache = CacheLayer::new();
    match cache.connect(&config.cache).await {
        Ok(()) => {
            println!("Cache ({}): {}", config.cache.backend, style("connected").green());
            if config.cache.backend == CacheBackendType::Local {
                println!(
                    "  {} local cache lives only for one process; set CACHE_BACKEND=redis to use `memstore cache`",
                    style("warn").yellow()
                );
            }
            cache.disconnect().await?;
        }
        Err(e) => println!("Cache ({}): {} {}", config.cache.backend, style("unavailable").red(), e),
    }

    println!("Provider: {}", config.provider.kind);
    Ok(())
}

async fn run_cache(cache: &CacheLayer, action: CacheAction, out: &Output) -> Result<()> {
    match action {
        CacheAction::Set { key, value, ttl } => {
            cache.set(&key, &value, ttl.map(Duration::from_secs)).await?;
            out.value(&"OK", "OK")
        }
        CacheAction::Get(KeyArg { key }) => out.optional(&cache.get(&key).await?),
        CacheAction::Del(KeyArg { key }) => out.count(cache.delete(&key).await?),
        CacheAction::Exists(KeyArg { key }) => out.flag(cache.exists(&key).await?),
        CacheAction::Hset { key, field, value } => out.count(cache.set_field(&key, &field, &value).await?),
        CacheAction::Hget { key, field } => out.optional(&cache.get_field(&key, &field).await?),
        CacheAction::Hgetall(KeyArg { key }) => {
            let fields = cache.get_all_fields(&key).await?;
            if out.json {
                return out.print_json(&fields);
            }
            let mut fields: Vec<_> = fields.into_iter().collect();
            fields.sort();
            for (field, value) in fields {
                println!("{} {}", style(field).cyan(), value);
            }
            Ok(())
        }
        CacheAction::Hdel { key, field } => out.count(cache.delete_field(&key, &field).await?),
        CacheAction::Rpush { key, value } => out.count(cache.append(&key, &value).await?),
        CacheAction::Lpush { key, values } => out.count(cache.prepend(&key, &values).await?),
        CacheAction::Lrange { key, start, end } => out.lines(&cache.range(&key, start, end).await?),
        CacheAction::Lrem { key, value } => out.count(cache.remove_from_list(&key, &value).await?),
        CacheAction::Sadd { key, members } => out.count(cache.add_members(&key, &members).await?),
        CacheAction::Smembers(KeyArg { key }) => out.lines(&cache.members(&key).await?),
        CacheAction::Sismember { key, member } => out.flag(cache.is_member(&key, &member).await?),
        CacheAction::Srem { key, member } => out.count(cache.remove_member(&key, &member).await?),
    }
}

/// Human or JSON rendering of command results
struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn value<T: serde::Serialize + ?Sized>(&self, value: &T, human: &str) -> Result<()> {
        if self.json {
            return self.print_json(value);
        }
        println!("{}", human);
        Ok(())
    }

    fn count(&self, n: u64) -> Result<()> {
        self.value(&n, &format!("(integer) {}", n))
    }

    fn flag(&self, b: bool) -> Result<()> {
        self.value(&b, if b { "true" } else { "false" })
    }

    fn optional(&self, value: &Option<String>) -> Result<()> {
        match value {
            Some(v) => self.value(v, v),
            None => self.value(&serde_json::Value::Null, &style("(nil)").dim().to_string()),
        }
    }

    fn lines(&self, values: &[String]) -> Result<()> {
        if self.json {
            return self.print_json(values);
        }
        if values.is_empty() {
            println!("{}", style("(empty)").dim());
        }
        for (i, v) in values.iter().enumerate() {
            println!("{}) {}", i + 1, v);
        }
        Ok(())
    }

    fn record(&self, record: &EmbeddingRecord) -> Result<()> {
        if self.json {
            return self.print_json(record);
        }
        print_record(record, None);
        Ok(())
    }

    fn records(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if self.json {
            return self.print_json(records);
        }
        if records.is_empty() {
            println!("{}", style("No records").dim());
        }
        for record in records {
            print_record(record, None);
        }
        Ok(())
    }

    fn scored(&self, results: &[ScoredRecord]) -> Result<()> {
        if self.json {
            return self.print_json(results);
        }
        if results.is_empty() {
            println!("{}", style("No matches").dim());
        }
        for result in results {
            print_record(&result.record, Some(result.similarity));
        }
        Ok(())
    }
}

fn print_record(record: &EmbeddingRecord, similarity: Option<f64>) {
    let score = similarity
        .map(|s| format!(" {}", style(format!("{:.4}", s)).green()))
        .unwrap_or_default();
    let category = record
        .category
        .as_deref()
        .map(|c| format!(" [{}]", style(c).cyan()))
        .unwrap_or_default();

    println!("{}{}{}", style(record.id).dim(), category, score);
    println!("  {}", record.text);
    if let Some(metadata) = &record.metadata {
        if let Ok(encoded) = serde_json::to_string(metadata) {
            println!("  {}", style(encoded).dim());
        }
    }
    println!(
        "  {} dims, created {}, updated {}",
        record.dimensions(),
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}
