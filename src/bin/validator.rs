//! Model Validator CLI
//!
//! Validates a directory of model files, decodes instances against them and
//! generates sample instances.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use model_registry::{split_fqn, GenerateOptions, GeneratorMode, ModelRegistry, ModelsConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-validator")]
#[command(about = "Validate models and the instances written against them")]
struct Cli {
    /// Directory of model AST files (overrides the configured model_dir)
    #[arg(short, long)]
    models: Option<PathBuf>,

    /// Extra config file layered over models.toml
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and strictly validate every model file
    Check,

    /// Decode an instance and re-encode it
    Decode {
        /// Instance JSON file
        instance: PathBuf,
        /// Accept DateTimes without an explicit offset
        #[arg(long)]
        lenient_dates: bool,
    },

    /// Generate an instance of a type
    Sample {
        /// Fully-qualified type name, e.g. org.acme@1.0.0.Car
        fqn: String,
        /// empty or sample
        #[arg(long)]
        mode: Option<GeneratorMode>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        include_optional: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ModelsConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.models {
        config.registry.model_dir = dir;
    }

    let registry = ModelRegistry::from_config(&config)
        .with_context(|| format!("Failed to load models from {}", config.model_dir_path().display()))?;

    match cli.command {
        Commands::Check => {
            println!("🔍 Validating models in {}", config.model_dir_path().display());
            registry.validate_model_files()?;
            for file in registry.model_files() {
                println!(
                    "  ✅ {} ({} declarations) {}",
                    file.namespace(),
                    file.declarations().len(),
                    file.file_name().unwrap_or_default()
                );
            }
            println!("✅ {} namespace(s) valid", registry.model_files().count());
            Ok(())
        }

        Commands::Decode { instance, lenient_dates } => {
            let content = std::fs::read_to_string(&instance)
                .with_context(|| format!("Failed to read {}", instance.display()))?;
            let json: serde_json::Value = serde_json::from_str(&content)?;

            let mut decode = config.serializer.decode.clone();
            if lenient_dates {
                decode.strict_qualified_date_times = false;
            }
            let serializer = registry
                .serializer()
                .with_encode_options(config.serializer.encode.clone())
                .with_decode_options(decode);

            match serializer.from_json(&json) {
                Ok(resource) => {
                    println!("✅ {} is valid", resource.fully_qualified_type());
                    println!("{}", serde_json::to_string_pretty(&serializer.to_json(&resource)?)?);
                    Ok(())
                }
                Err(e) => {
                    println!("❌ {}", e);
                    if let Some(path) = e.path() {
                        println!("   └─ at {}", path);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Sample {
            fqn,
            mode,
            seed,
            include_optional,
        } => {
            let (namespace, type_name) =
                split_fqn(&fqn).with_context(|| format!("{} is not a fully qualified type name", fqn))?;
            let options = GenerateOptions {
                mode: mode.unwrap_or(config.generator.mode),
                include_optional_fields: include_optional || config.generator.include_optional_fields,
                seed: seed.or(config.generator.seed),
            };

            let resource = registry
                .instance_generator()
                .generate(namespace, type_name, &options)?;
            let json = registry.serializer().to_json(&resource)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
    }
}
