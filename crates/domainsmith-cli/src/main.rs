mod registry;
mod workspace;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use domainsmith_core::{
    DEFAULT_SCHEMA, IntrospectionError, JoinType, TableRef, redact_connection_string,
    validate_descriptor,
};
use domainsmith_generate::{
    BatchReport, DomainGenerator, GenerateOptions, RenderSettings, TableStatus,
};
use domainsmith_introspect::{
    CatalogIntrospector, ObjectModel, ObjectModelError, ObjectSchemaIntrospector,
    SchemaIntrospector,
};
use registry::{
    RunContext, RunOptions, RunSource, init_run_logging, start_run, write_descriptor,
    write_summary,
};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;
use workspace::{
    APP_NAME_ENV, DirectoryStore, ProjectSettings, WorkspaceError, load_settings,
    parse_join_overrides, resolve_app_name,
};

const DEFAULT_OUT_DIR: &str = "domains";
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("{0}")]
    Workspace(#[from] WorkspaceError),
    #[error("introspection error: {0}")]
    Introspection(#[from] IntrospectionError),
    #[error("object model error: {0}")]
    Model(#[from] ObjectModelError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
    #[error("{failed} of {total} tables failed")]
    TablesFailed { failed: usize, total: usize },
}

#[derive(Parser, Debug)]
#[command(name = "domainsmith", version, about = "Generate domain configs from database schemas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate or regenerate domain config artifacts.
    Generate(GenerateArgs),
    /// Print the descriptor of one table as JSON.
    Introspect(IntrospectArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Postgres connection string.
    #[arg(long, value_name = "CONNECTION_STRING", required_unless_present = "models")]
    conn: Option<String>,
    /// Object model file with `[models.<Reference>]` entries.
    #[arg(long, value_name = "FILE", conflicts_with = "conn")]
    models: Option<PathBuf>,
    /// Schema for unqualified tables and for `--all`.
    #[arg(long)]
    schema: Option<String>,
    /// Settings file (defaults to ./domainsmith.toml when present).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Introspection budget per table, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Table to generate, optionally schema-qualified. Repeatable.
    #[arg(long = "table", value_name = "TABLE", required_unless_present = "all")]
    tables: Vec<String>,
    /// Generate every table of the schema.
    #[arg(long, default_value_t = false, conflicts_with = "tables")]
    all: bool,
    /// Directory the artifacts are written to.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Relationship expansion depth.
    #[arg(long = "expand", value_name = "DEPTH")]
    expansion_depth: Option<usize>,
    /// Join type override for an association, as name=type. Repeatable.
    #[arg(long = "join", value_name = "NAME=TYPE")]
    joins: Vec<String>,
    /// Application name used in artifact namespaces.
    #[arg(long)]
    app_name: Option<String>,
    /// Tables processed concurrently.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Print artifacts instead of writing them.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct IntrospectArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Table to introspect, optionally schema-qualified.
    #[arg(long)]
    table: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Introspect(args) => run_introspect(args).await,
    }
}

/// Settings file merged with flags shared by every command.
struct Resolved {
    settings: ProjectSettings,
    schema: String,
    concurrency: usize,
    timeout: Option<Duration>,
    run_source: RunSource,
}

fn resolve_common(source: &SourceArgs, concurrency: Option<usize>) -> Result<Resolved, CliError> {
    let cwd = std::env::current_dir()?;
    let settings = load_settings(source.config.as_deref(), &cwd)?;

    let schema = source
        .schema
        .clone()
        .or_else(|| settings.schema.clone())
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    let concurrency = concurrency
        .or(settings.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(CliError::InvalidConfig(
            "concurrency must be at least 1".to_string(),
        ));
    }
    let timeout = source
        .timeout_secs
        .or(settings.timeout_secs)
        .map(Duration::from_secs);

    let run_source = match (&source.conn, &source.models) {
        (Some(conn), None) => RunSource::Catalog {
            connection: redact_connection_string(conn),
        },
        (None, Some(path)) => RunSource::ObjectModel { path: path.clone() },
        _ => {
            return Err(CliError::InvalidConfig(
                "use exactly one of --conn or --models".to_string(),
            ));
        }
    };

    Ok(Resolved {
        settings,
        schema,
        concurrency,
        timeout,
        run_source,
    })
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let resolved = resolve_common(&args.source, args.concurrency)?;
    let settings = &resolved.settings;

    let join_overrides = parse_join_overrides(settings, &args.joins)?;
    let app_name = resolve_app_name(
        args.app_name.as_deref(),
        settings,
        std::env::var(APP_NAME_ENV).ok(),
    );
    let expansion_depth = args
        .expansion_depth
        .or(settings.expansion_depth)
        .unwrap_or(0);
    let out_dir = args
        .out_dir
        .clone()
        .or_else(|| settings.out_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.source.run_dir.clone(),
        options: RunOptions {
            command: "generate".to_string(),
            source: resolved.run_source.clone(),
            tables: args.tables.clone(),
            all: args.all,
            schema: resolved.schema.clone(),
            out_dir: out_dir.clone(),
            expansion_depth,
            joins: join_names(&join_overrides),
            app_name: app_name.clone(),
            concurrency: resolved.concurrency,
            timeout_secs: resolved.timeout.map(|limit| limit.as_secs()),
            dry_run: args.dry_run,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command = "generate",
        run_root = %run_paths.root.display(),
        app_name = %app_name,
        expansion_depth = expansion_depth
    );
    let timer = Instant::now();

    let introspector = connect(&args.source, resolved.concurrency).await?;

    let tables = if args.all {
        let names = introspector.list_tables(&resolved.schema).await?;
        tracing::info!(event = "tables_listed", schema = %resolved.schema, count = names.len());
        names
            .into_iter()
            .map(|name| TableRef::new(resolved.schema.clone(), name))
            .collect()
    } else {
        args.tables
            .iter()
            .map(|table| parse_table_ref(table, &resolved.schema))
            .collect::<Vec<_>>()
    };
    if tables.is_empty() {
        return Err(CliError::InvalidConfig(format!(
            "no tables to generate in schema {}",
            resolved.schema
        )));
    }

    let generator = DomainGenerator::new(
        introspector,
        GenerateOptions {
            expansion_depth,
            join_overrides,
            introspect_timeout: resolved.timeout,
            render: RenderSettings::new(app_name),
        },
    );
    let store = Arc::new(DirectoryStore::new(&out_dir).dry_run(args.dry_run));

    let report = generator
        .run_batch(tables, store, resolved.concurrency)
        .await;

    write_summary(&run_paths, &run_id, &report)?;
    print_summary(&report, &out_dir, &mut std::io::stderr())?;

    let duration_ms = timer.elapsed().as_millis();
    if report.has_failures() {
        tracing::info!(
            event = "run_finished",
            status = "failed",
            failed = report.failed(),
            duration_ms = duration_ms
        );
        return Err(CliError::TablesFailed {
            failed: report.failed(),
            total: report.outcomes.len(),
        });
    }

    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);
    Ok(())
}

async fn run_introspect(args: IntrospectArgs) -> Result<(), CliError> {
    let resolved = resolve_common(&args.source, None)?;
    let table = parse_table_ref(&args.table, &resolved.schema);

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.source.run_dir.clone(),
        options: RunOptions {
            command: "introspect".to_string(),
            source: resolved.run_source.clone(),
            tables: vec![table.to_string()],
            all: false,
            schema: resolved.schema.clone(),
            out_dir: PathBuf::new(),
            expansion_depth: 0,
            joins: BTreeMap::new(),
            app_name: String::new(),
            concurrency: 1,
            timeout_secs: resolved.timeout.map(|limit| limit.as_secs()),
            dry_run: false,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command = "introspect",
        run_root = %run_paths.root.display(),
        table = %table
    );
    let timer = Instant::now();

    let introspector = connect(&args.source, 1).await?;
    let work = introspector.introspect(&table);
    let descriptor = match resolved.timeout {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            IntrospectionError::Timeout {
                table: table.to_string(),
                seconds: limit.as_secs(),
            }
        })??,
        None => work.await?,
    };
    validate_descriptor(&descriptor)?;

    let path = write_descriptor(&run_paths, &descriptor)?;
    tracing::info!(event = "descriptor_written", path = %path.display());

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &descriptor)?;
    writeln!(stdout)?;

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);
    Ok(())
}

async fn connect(
    source: &SourceArgs,
    concurrency: usize,
) -> Result<Arc<dyn SchemaIntrospector>, CliError> {
    if let Some(path) = &source.models {
        let content = std::fs::read_to_string(path)?;
        let model = ObjectModel::from_toml_str(&content)?;
        tracing::info!(
            event = "object_model_loaded",
            path = %path.display(),
            references = model.references().count()
        );
        return Ok(Arc::new(ObjectSchemaIntrospector::new(model)));
    }

    let conn = source.conn.as_deref().ok_or_else(|| {
        CliError::InvalidConfig("connection string is required".to_string())
    })?;
    let engine = detect_engine(conn)?;
    tracing::info!(event = "engine_detected", engine = %engine);

    let pool = PgPoolOptions::new()
        .max_connections(u32::try_from(concurrency.max(1)).unwrap_or(u32::MAX))
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await?;
    Ok(Arc::new(CatalogIntrospector::new(pool)))
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}

/// `schema.table`, or a bare table in `default_schema`.
fn parse_table_ref(value: &str, default_schema: &str) -> TableRef {
    match value.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
            TableRef::new(schema, table)
        }
        _ => TableRef::new(default_schema, value),
    }
}

fn join_names(overrides: &BTreeMap<String, JoinType>) -> BTreeMap<String, String> {
    overrides
        .iter()
        .map(|(name, join_type)| (name.clone(), join_type.to_string()))
        .collect()
}

fn print_summary(
    report: &BatchReport,
    out_dir: &Path,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    for outcome in &report.outcomes {
        match &outcome.status {
            TableStatus::Written {
                file,
                preserved,
                conflicts,
            } => writeln!(
                writer,
                "ok      {:<32} {} (preserved {preserved}, conflicts {conflicts})",
                outcome.table,
                out_dir.join(file).display()
            )?,
            TableStatus::Failed { error } => {
                writeln!(writer, "failed  {:<32} {error}", outcome.table)?
            }
        }
    }
    writeln!(
        writer,
        "{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    )
}
