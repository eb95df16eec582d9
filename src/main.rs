//! b3nd CLI - check and render binding fixtures

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use b3nd::expr::evaluate_declaration;
use b3nd::fixture::Fixture;
use b3nd::scope::Scope;
use b3nd::{
    B3ndError, BindConfig, Binder, Event, FixSuggestion, ManualScheduler, Model, Registry,
};

#[derive(Parser)]
#[command(name = "b3nd")]
#[command(about = "b3nd - declarative attribute-driven data binding")]
#[command(version)]
struct Cli {
    /// Path to a b3nd.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every declaration in a fixture and report problems
    Check {
        /// Path to a YAML or JSON fixture
        file: PathBuf,
    },

    /// Bind a fixture, apply writes and events, print the rendered tree
    Render {
        /// Path to a YAML or JSON fixture
        file: PathBuf,

        /// Model write applied after binding: key=json (repeatable)
        #[arg(long = "set", value_name = "KEY=JSON")]
        sets: Vec<String>,

        /// Type into an element and fire change/keyup: id=value (repeatable)
        #[arg(long = "input", value_name = "ID=VALUE")]
        inputs: Vec<String>,

        /// Click an element by id (repeatable)
        #[arg(long = "click", value_name = "ID")]
        clicks: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Check { file } => check(&file, &config),
        Commands::Render {
            file,
            sets,
            inputs,
            clicks,
        } => render(&file, config, &sets, &inputs, &clicks),
    });

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<B3ndError>().and_then(|e| e.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BindConfig> {
    let config = match path {
        Some(path) => BindConfig::load(path)?,
        None => BindConfig::default(),
    };
    Ok(config.with_env())
}

fn check(file: &Path, config: &BindConfig) -> anyhow::Result<()> {
    let fixture = Fixture::from_path(file)?;
    let built = fixture.build();
    let registry = Registry::builtin();
    let scope = Scope::build(built.view.as_ref(), built.model.as_ref())?;

    let root = built.document.root();
    let elements = root
        .descendants()
        .into_iter()
        .chain(std::iter::once(root.clone()))
        .filter(|el| el.has_attribute(&config.attribute));

    let mut checked = 0;
    let mut first_error: Option<B3ndError> = None;
    for el in elements {
        let Some(declaration) = el.attribute(&config.attribute) else {
            continue;
        };
        checked += 1;

        match evaluate_declaration(&declaration, &scope) {
            Ok(bindings) => {
                for (name, value) in bindings {
                    if registry.contains(&name) {
                        println!(
                            "{} {} {} = {}",
                            "✓".green(),
                            el.describe().cyan(),
                            name.bold(),
                            value.to_json()
                        );
                    } else {
                        println!(
                            "{} {} unknown binding '{}'",
                            "⚠".yellow(),
                            el.describe().cyan(),
                            name
                        );
                    }
                }
            }
            Err(source) => {
                let err = B3ndError::Declaration {
                    element: el.describe(),
                    declaration: declaration.clone(),
                    source,
                };
                println!("{} {}", "✗".red(), err);
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err.into());
    }
    println!(
        "{} {} declaration(s) in '{}' are valid",
        "✓".green(),
        checked,
        file.display()
    );
    Ok(())
}

fn render(
    file: &Path,
    config: BindConfig,
    sets: &[String],
    inputs: &[String],
    clicks: &[String],
) -> anyhow::Result<()> {
    let fixture = Fixture::from_path(file)?;
    let built = fixture.build();
    let scheduler = ManualScheduler::shared();

    let session = Binder::new(built.view.clone())
        .model(built.model.clone())
        .config(config)
        .scheduler(scheduler.clone())
        .bind()?;

    for set in sets {
        let (key, raw) = split_pair(set, "--set")?;
        // bare words are taken as strings
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        built.model.set(key, value)?;
    }

    for input in inputs {
        let (id, text) = split_pair(input, "--input")?;
        let el = built
            .document
            .find_by_id(id)
            .with_context(|| format!("no element with id '{id}'"))?;
        el.set_value(text);
        for kind in ["keyup", "change"] {
            built.document.dispatch_event(el.node_id(), &Event::new(kind))?;
        }
    }

    for id in clicks {
        let el = built
            .document
            .find_by_id(id)
            .with_context(|| format!("no element with id '{id}'"))?;
        built.document.dispatch_event(el.node_id(), &Event::new("click"))?;
    }

    // run debounced writes now instead of waiting
    scheduler.flush();

    println!("{}", built.document.render());
    session.unbind();
    Ok(())
}

fn split_pair<'a>(raw: &'a str, flag: &str) -> anyhow::Result<(&'a str, &'a str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("{flag} expects NAME=VALUE, got '{raw}'"),
    }
}
