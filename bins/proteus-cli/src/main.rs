use std::io::Read;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use proteus_api::converter::TypeConverter;
use proteus_api::value::{Record, Value};
use proteus_converter_object::{IDENTITY_KEY, InMemoryRepository, TYPE_KEY};
use proteus_engine::cache::FileStore;
use proteus_engine::catalog::StaticCatalog;
use proteus_engine::config::MapperConfig;
use proteus_engine::error::MappingError;
use proteus_engine::mapper::PropertyMapper;
use proteus_engine::registry::ConverterRegistry;

#[derive(Parser)]
#[command(name = "proteus", about = "Convert loosely-typed JSON into typed values")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "proteus.toml", env = "PROTEUS_CONFIG")]
    config: String,

    /// Directory for the converter table cache; overrides `cache_dir`.
    #[arg(long, env = "PROTEUS_CACHE_DIR")]
    cache_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a JSON document and print the value with its errors.
    Convert {
        /// Target type, e.g. `integer`, `Person` or `array<Point>`.
        #[arg(long)]
        target: String,
        /// JSON input file, `-` for stdin.
        #[arg(long, default_value = "-")]
        input: String,
        /// Named mapping from the configuration; allow-all when omitted.
        #[arg(long)]
        mapping: Option<String>,
        /// JSON list of stored entities (`__type`, `__identity`, fields).
        #[arg(long)]
        entities: Option<String>,
    },
    /// Print the converter table.
    Converters,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "proteus failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), MappingError> {
    tracing::debug!(config = %cli.config, "loading configuration");
    let config = if std::path::Path::new(&cli.config).exists() {
        MapperConfig::load(&cli.config)?
    } else {
        tracing::info!(config = %cli.config, "configuration file not found, using defaults");
        MapperConfig::default()
    };

    let types = Arc::new(config.type_system()?);
    let repository = Arc::new(InMemoryRepository::new(Arc::clone(&types)));
    if let Command::Convert { entities: Some(path), .. } = &cli.command {
        let stored = seed(&repository, path)?;
        tracing::info!(entities = stored, "loaded stored entities");
    }

    let converters: Vec<Arc<dyn TypeConverter>> = proteus_converter_scalar::converters()
        .into_iter()
        .chain(proteus_converter_object::converters(Arc::clone(&types), repository))
        .collect();
    let catalog = Arc::new(StaticCatalog::with_converters(converters)?);

    let registry = match cli.cache_dir.as_ref().or(config.cache_dir.as_ref()) {
        Some(dir) => {
            let store = FileStore::open(dir)?;
            ConverterRegistry::load_or_build(catalog.as_ref(), catalog.clone(), types, &store)?
        }
        None => ConverterRegistry::build(catalog.as_ref(), catalog.clone(), types)?,
    };

    match cli.command {
        Command::Converters => {
            for (source, targets) in registry.table() {
                for (target, bucket) in targets {
                    for (priority, name) in bucket.iter().rev() {
                        println!("{source} -> {target}\t{priority}\t{name}");
                    }
                }
            }
            Ok(())
        }
        Command::Convert {
            target,
            input,
            mapping,
            ..
        } => {
            let mapping = mapping
                .map(|name| config.mapping(&name, catalog.as_ref()))
                .transpose()?;
            let source = Value::from(read_json(&input)?);

            let mapper = PropertyMapper::with_config(Arc::new(registry), config);
            let mapped = mapper.map(&source, &target, mapping.as_ref())?;

            let errors = serde_json::to_value(mapped.messages.flattened_errors())
                .map_err(|e| MappingError::Config(e.to_string()))?;
            let out = serde_json::json!({
                "value": mapped.value.as_ref().map_or(serde_json::Value::Null, Value::to_json),
                "errors": errors,
            });
            println!("{out:#}");
            Ok(())
        }
    }
}

fn read_json(path: &str) -> Result<serde_json::Value, MappingError> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| MappingError::Config(format!("{path}: {e}")))?
    };
    serde_json::from_str(&raw).map_err(|e| MappingError::Config(format!("{path}: {e}")))
}

fn seed(repository: &InMemoryRepository, path: &str) -> Result<usize, MappingError> {
    let serde_json::Value::Array(items) = read_json(path)? else {
        return Err(MappingError::Config(format!("{path}: expected a list of entities")));
    };
    let count = items.len();
    for item in items {
        let Value::Map(mut fields) = Value::from(item) else {
            return Err(MappingError::Config(format!("{path}: every entity must be an object")));
        };
        let class = match fields.shift_remove(TYPE_KEY) {
            Some(Value::String(class)) => class,
            _ => return Err(MappingError::Config(format!("{path}: entity without '{TYPE_KEY}'"))),
        };
        let mut record = Record::new(class);
        if let Some(Value::String(identity)) = fields.shift_remove(IDENTITY_KEY) {
            record = record.with_identity(identity);
        }
        record.fields = fields;
        repository
            .insert(record)
            .map_err(|e| MappingError::from(e).with_context(path))?;
    }
    Ok(count)
}
