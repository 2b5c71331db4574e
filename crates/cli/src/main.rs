use anyhow::{Context as AnyhowContext, Result};
use cascade_http::{HttpLookupService, HttpOptionSource};
use cascade_protocol::{ListedOption, OptionId};
use cascade_resolver::{
    AutocompleteAdapter, CascadeConfig, CascadeController, FixtureLookupService,
    LogObserver, LookupClient, OptionSource,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

mod assignment;
mod recorder;

use assignment::{parse_assignment, Assignment};
use recorder::TransitionLog;

#[derive(Parser)]
#[command(name = "mesa-finder")]
#[command(about = "Resolve district/section/circuit/table identifiers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Cascade configuration file (TOML); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted sequence of inputs through the cascade and print the field states
    Resolve(ResolveArgs),

    /// Fetch the option list of an autocomplete picker
    Options(OptionsArgs),

    /// Print the JSON Schema of a lookup-service response
    Schema(SchemaArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct ResolveArgs {
    /// Field input, applied in order (e.g. --set "distrito=Buenos Aires")
    #[arg(long = "set", value_name = "FIELD=TEXT", value_parser = parse_assignment)]
    inputs: Vec<Assignment>,

    /// Stored id to hydrate before any input (e.g. --hydrate mesa=4501)
    #[arg(long = "hydrate", value_name = "FIELD=ID", value_parser = parse_assignment)]
    hydrate: Vec<Assignment>,

    /// Answer lookups from a JSON fixture file instead of the HTTP endpoints
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Do not re-query empty descendants after a field resolves
    #[arg(long)]
    no_autofill: bool,

    /// Do not re-query empty ancestors after a field resolves
    #[arg(long)]
    no_reverse_autofill: bool,

    /// Treat every field as applicable
    #[arg(long)]
    ungated: bool,

    /// Include every field transition in the output
    #[arg(long)]
    transitions: bool,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct OptionsArgs {
    /// Picker id (distrito, seccion, ...)
    field_id: String,

    /// Only children of this parent id
    #[arg(long)]
    parent: Option<String>,

    /// Rank descriptions against typed text
    #[arg(long)]
    query: Option<String>,

    /// Maximum number of suggestions when --query is given
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct SchemaArgs {
    #[arg(value_enum, default_value = "lookup")]
    kind: SchemaKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaKind {
    /// `{ results: [{ id, text, selected_text }] }`
    Lookup,
    /// `{ options: [{ value, text }] }`
    Options,
}

#[derive(Serialize)]
struct ResolveOutput {
    fields: Vec<cascade_resolver::FieldView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transitions: Option<Vec<cascade_resolver::FieldTransition>>,
}

#[derive(Serialize)]
struct OptionsOutput {
    field_id: String,
    input_id: String,
    pattern: String,
    message: String,
    options: Vec<ListedOption>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper internals only with --verbose
    if !cli.verbose {
        builder.filter_module("hyper_util", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = match &cli.config {
        Some(path) => CascadeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CascadeConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, config).await?,
        Commands::Options(args) => run_options(args, config).await?,
        Commands::Schema(args) => run_schema(args)?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

async fn run_resolve(args: ResolveArgs, mut config: CascadeConfig) -> Result<()> {
    if args.ungated {
        config.gates.clear();
    }
    let mut options = config.controller_options();
    options.autofill &= !args.no_autofill;
    options.reverse_autofill &= !args.no_reverse_autofill;

    let client = match &args.fixtures {
        Some(path) => LookupClient::from_service(
            FixtureLookupService::load(path)
                .with_context(|| format!("Failed to load fixtures {}", path.display()))?,
        ),
        None => LookupClient::from_service(
            HttpLookupService::new(&config).context("Failed to set up HTTP lookups")?,
        ),
    };

    let chain = config.chain().context("Invalid cascade chain")?;
    let mut controller = CascadeController::new(chain).with_options(options);
    controller.add_observer(Box::new(LogObserver));
    let recorded = TransitionLog::default();
    if args.transitions {
        controller.add_observer(Box::new(recorded.clone()));
    }

    for Assignment { field, value } in &args.hydrate {
        let state = controller
            .hydrate(*field, OptionId::from(value.as_str()), &client)
            .await?;
        log::info!("{field} hydrated as {:?}", state.status);
    }
    for Assignment { field, value } in &args.inputs {
        let state = controller.input(*field, value, &client).await?;
        log::info!("{field} = {value:?} -> {:?}", state.status);
    }

    let output = ResolveOutput {
        fields: controller.snapshot().fields,
        transitions: args.transitions.then(|| recorded.take()),
    };
    print_json(&output, args.pretty)
}

async fn run_options(args: OptionsArgs, config: CascadeConfig) -> Result<()> {
    let url = config
        .picker_url(&args.field_id)
        .with_context(|| format!("No picker configured for {}", args.field_id))?;
    let source =
        Arc::new(HttpOptionSource::from_config(&config).context("Failed to set up HTTP client")?);

    let parent = args.parent.as_deref().map(OptionId::from);
    let listed = source
        .fetch_options(&url, parent.as_ref())
        .await
        .with_context(|| format!("Failed to fetch options from {url}"))?;

    let mut adapter =
        AutocompleteAdapter::from_options(&args.field_id, Some(url), &listed, None, source)?;
    let options = match &args.query {
        Some(query) => {
            adapter.type_text(query.as_str());
            adapter
                .suggest(args.limit)
                .into_iter()
                .filter_map(|text| {
                    adapter
                        .values()
                        .id_for(&text)
                        .map(|id| ListedOption::new(id.clone(), text.clone()))
                })
                .collect()
        }
        None => listed.into_iter().filter(|option| !option.value.is_blank()).collect(),
    };

    let output = OptionsOutput {
        field_id: args.field_id.clone(),
        input_id: adapter.input_id(),
        pattern: adapter.validation_pattern(),
        message: adapter.validation_message(),
        options,
    };
    print_json(&output, args.pretty)
}

fn run_schema(args: SchemaArgs) -> Result<()> {
    let schema = match args.kind {
        SchemaKind::Lookup => cascade_protocol::lookup_response_schema()?,
        SchemaKind::Options => cascade_protocol::option_list_schema()?,
    };
    print_json(&schema, true)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
