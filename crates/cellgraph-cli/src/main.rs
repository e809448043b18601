use anyhow::{bail, Context, Result};
use cellgraph_core::{RuntimeConfig, Scheduler, Value};
use cellgraph_recipe::{ModuleRegistry, Recipe, RecipeDefinition, Runner};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod modules;

fn cli() -> Command {
    Command::new("cellgraph")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run reactive recipe graphs to settlement")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Tracing filter, overrides RUST_LOG (e.g. debug, cellgraph_core=trace)"),
        )
        .subcommand(
            Command::new("run")
                .about("Instantiate a recipe, wait for it to settle and print its state")
                .arg(
                    Arg::new("recipe")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Recipe definition (JSON)"),
                )
                .arg(
                    Arg::new("bindings")
                        .long("bindings")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file merged into the recipe's initial value"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Runtime limits (TOML)"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_parser(value_parser!(u64))
                        .help("Give up after this many seconds"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that a recipe definition parses and compiles")
                .arg(
                    Arg::new("recipe")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Recipe definition (JSON)"),
                ),
        )
}

fn init_tracing(level: Option<&String>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn load_bindings(path: Option<&PathBuf>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Undefined);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading bindings {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing bindings {}", path.display()))?;
    Ok(Value::from_json(json))
}

fn compile(path: &Path, registry: &ModuleRegistry) -> Result<(RecipeDefinition, Recipe)> {
    let definition = RecipeDefinition::from_file(path)
        .with_context(|| format!("loading recipe {}", path.display()))?;
    let recipe = Recipe::compile(&definition, registry)
        .with_context(|| format!("compiling recipe {}", path.display()))?;
    Ok((definition, recipe))
}

async fn run(args: &ArgMatches) -> Result<()> {
    let path = args
        .get_one::<PathBuf>("recipe")
        .context("missing recipe path")?;
    let config = load_config(args.get_one::<PathBuf>("config"))?;
    let bindings = load_bindings(args.get_one::<PathBuf>("bindings"))?;
    let (_, recipe) = compile(path, &modules::builtin_registry())?;

    let runner = Runner::new(Scheduler::with_config(config));
    let instance = runner.run(&recipe, bindings)?;

    let cancel = CancellationToken::new();
    if let Some(secs) = args.get_one::<u64>("timeout").copied() {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            cancel.cancel();
        });
    }
    instance
        .settle_with(&cancel)
        .await
        .context("waiting for the recipe to settle")?;
    debug!(stats = ?runner.scheduler().stats(), "settled");

    let state = instance.get().context("resolving settled state")?;
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);

    let errors = instance.node_errors();
    if !errors.is_empty() {
        for error in &errors {
            warn!(node = %error.node, error = %error.error, "node failed");
            eprintln!("{}: {}", error.node, error.error);
        }
        bail!("{} node(s) failed", errors.len());
    }
    Ok(())
}

fn validate(args: &ArgMatches) -> Result<()> {
    let path = args
        .get_one::<PathBuf>("recipe")
        .context("missing recipe path")?;
    let (definition, recipe) = compile(path, &modules::builtin_registry())?;

    println!("recipe: {}", recipe.name);
    println!("nodes: {}", definition.node_count());
    let functions: Vec<String> = definition.function_names().into_iter().collect();
    if !functions.is_empty() {
        println!("functions: {}", functions.join(", "));
    }
    println!("ok");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_one::<String>("log-level"));

    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("validate", args)) => validate(args),
        _ => unreachable!("clap requires a subcommand"),
    }
}
