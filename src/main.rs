//! docweave - turn one topic into a full set of engineering documents
//!
//! Usage:
//!   docweave run --topic "Build a login system"   → run all 19 tasks, then export
//!   docweave run --topic-file brief.txt --dry-run   → print the plan and exit
//!   docweave graph                                  → list agents, tasks and exports
//!   docweave init-config > docweave.toml            → default configuration
//!   docweave export notes.txt notes.docx            → format one text file as .docx

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use docweave_core::{Error, ModelConfig, PipelineConfig, ProviderKind};
use docweave_llm::{MockBehavior, ScriptedProvider};
use docweave_pipeline::{catalog, export, AgentRegistry, Executor, LocalFsDriver, ModelBinding, TemplateVars, VarSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "docweave",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sequential multi-agent pipeline that writes requirements, designs and reports for one topic"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration (missing file = defaults)
    #[arg(short, long, global = true, default_value = "docweave.toml")]
    config: PathBuf,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the documentation pipeline
    Run(RunArgs),
    /// Print the agents, tasks and exports in execution order
    Graph,
    /// Print a default configuration file
    InitConfig,
    /// Format a plain-text file as a Word document
    Export {
        input: PathBuf,
        output: PathBuf,
        /// Title placed at the top of the document
        #[arg(short, long, default_value = "Report")]
        title: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// The topic to document
    #[arg(short, long, conflicts_with = "topic_file")]
    topic: Option<String>,

    /// Read the topic from a file
    #[arg(long)]
    topic_file: Option<PathBuf>,

    /// Output directory (cleared of files before the run)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Provider for the run's model: anthropic or gemini
    #[arg(long)]
    provider: Option<String>,

    /// Model id, as the provider spells it
    #[arg(short, long)]
    model: Option<String>,

    /// Write the run manifest (YAML) here; must be outside the output directory
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Skip the .docx exports
    #[arg(long, default_value_t = false)]
    no_export: bool,

    /// Print the plan and exit without calling any model
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref());

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(path.as_os_str());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docweave=info,docweave_pipeline=info,docweave_llm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::InitConfig => {
            print!("{}", PipelineConfig::default().to_toml()?);
            Ok(())
        }
        Commands::Graph => {
            let config = PipelineConfig::load(&cli.config)?;
            let executor = offline_executor(&config)?;
            print!("{}", executor.describe());
            Ok(())
        }
        Commands::Export { input, output, title } => {
            export::export_file(&input, &output, &title)?;
            println!("{}", output.display());
            Ok(())
        }
        Commands::Run(args) => run(&cli.config, args).await,
    }
}

async fn run(config_path: &Path, args: RunArgs) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let mut config = PipelineConfig::load(config_path)?;
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    let topic = resolve_topic(&args, &config)?;

    if args.dry_run {
        let executor = offline_executor(&config)?;
        println!("Topic: {}\nOutput: {}\n", topic, config.run.output_dir.display());
        print!("{}", executor.describe());
        return Ok(());
    }

    let model = run_model(&config)?.clone();
    let api_key = api_key_for(model.provider)?;
    let binding = ModelBinding::connect(model, &api_key)?;

    let executor = build_executor(&config, binding)?;
    info!(
        topic = %topic,
        provider = %config.models[&config.run.model].provider,
        model = %config.models[&config.run.model].model,
        "starting pipeline"
    );

    let mut report = executor.run(TemplateVars::new(topic)).await?;
    for output in report.context.outputs() {
        println!("{}", output.written_to.display());
    }

    if config.run.export {
        for path in executor.export(&mut report).await? {
            println!("{}", path.display());
        }
    }

    info!(summary = %report.manifest.summary_line(), "done");
    Ok(())
}

fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(dir) = &args.output_dir {
        config.run.output_dir = dir.clone();
    }
    if let Some(path) = &args.manifest {
        config.run.manifest = Some(path.clone());
    }
    if args.no_export {
        config.run.export = false;
    }

    let key = config.run.model.clone();
    let model = config
        .models
        .get_mut(&key)
        .ok_or_else(|| Error::config(format!("run.model '{}' does not name a [models] entry", key)))?;
    if let Some(provider) = &args.provider {
        let provider: ProviderKind = provider.parse()?;
        if provider != model.provider {
            model.provider = provider;
            model.model = provider.default_model().to_string();
            model.base_url = None;
        }
    }
    if let Some(id) = &args.model {
        model.model = id.clone();
    }
    Ok(())
}

fn resolve_topic(args: &RunArgs, config: &PipelineConfig) -> anyhow::Result<String> {
    let topic = match (&args.topic, &args.topic_file) {
        (Some(topic), _) => topic.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading topic file {}", path.display()))?,
        (None, None) => config.run.default_topic.clone(),
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        return Err(Error::config("topic is empty").into());
    }
    Ok(topic)
}

fn run_model(config: &PipelineConfig) -> docweave_core::Result<&ModelConfig> {
    config
        .model(&config.run.model)
        .ok_or_else(|| Error::config(format!("run.model '{}' is not configured", config.run.model)))
}

fn api_key_for(provider: ProviderKind) -> docweave_core::Result<String> {
    let vars = provider.api_key_vars();
    vars.iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            Error::config(format!("{} not set (needed for provider {})", vars.join(" or "), provider))
        })
}

fn build_executor(config: &PipelineConfig, binding: ModelBinding) -> anyhow::Result<Executor> {
    let mut models = BTreeMap::new();
    models.insert(config.run.model.clone(), binding);
    let registry = AgentRegistry::new(models, VarSet::default());
    let graph = catalog::documentation_pipeline(registry, &config.run.model)?;

    let driver = Arc::new(LocalFsDriver::new(&config.run.output_dir));
    let mut executor = Executor::new(graph, driver);
    if config.run.export {
        executor = executor.with_exports(catalog::export_specs())?;
    }
    if let Some(path) = &config.run.manifest {
        executor = executor.with_manifest(path);
    }
    Ok(executor)
}

/// Executor whose model never gets called; used for listings.
fn offline_executor(config: &PipelineConfig) -> anyhow::Result<Executor> {
    let model = run_model(config)?.clone();
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::Echo));
    build_executor(config, ModelBinding::new(model, provider))
}
