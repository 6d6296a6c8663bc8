use clap::Parser;
use qasearch::{
    ConfigDb,
    DataDir,
    Engine,
    Error,
    IndexBuilder,
    Result,
    SnapshotDb,
    config_db,
    corpus::{self, FixedEmbedder, LookupEmbedder},
    keyword_index::DEFAULT_VOCABULARY,
    search,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("QASEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Build(args) => {
            cmd_build(&data_dir, &args)?;
        }
        Command::Query(args) => {
            cmd_query(&config_db, &data_dir, &args)?;
        }
        Command::Status(args) => {
            cmd_status(&config_db, &data_dir, args.json)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => config_show(&config_db, json)?,
            ConfigAction::Set { key, value } => {
                config_db.set_setting(&key, &value)?;
                println!("Set {key} = {}", value.trim());
            }
            ConfigAction::Clear { key } => {
                config_db::validate_setting_key(&key)?;
                if config_db.remove_setting(&key)? {
                    println!("Cleared {key}");
                } else {
                    println!("{key} was not set");
                }
            }
        },
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_build(data_dir: &DataDir, args: &cli::BuildArgs) -> Result<()> {
    let pairs = corpus::load_corpus(&args.corpus)?;
    let embedder = LookupEmbedder::from_corpus(&pairs)?;

    let builder = match &args.vocabulary {
        Some(path) => {
            IndexBuilder::new(corpus::load_vocabulary(path)?.as_slice())
        }
        None => IndexBuilder::new(DEFAULT_VOCABULARY),
    };
    let snapshot = builder.build(&corpus::build_inputs(&pairs), &embedder)?;

    let db = SnapshotDb::create(&data_dir.snapshot_db())?;
    db.write(&snapshot)?;

    println!(
        "Built snapshot: {} documents, dimension {}, {} keyword terms",
        snapshot.len(),
        snapshot.vectors().dimension().unwrap_or(0),
        snapshot.keywords().len()
    );
    Ok(())
}

fn cmd_query(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::QueryArgs,
) -> Result<()> {
    let defaults = config_db.query_defaults()?;
    let top_k = args.count.unwrap_or(defaults.top_k);
    let threshold = args.threshold.unwrap_or(defaults.threshold);
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::Config(format!(
            "threshold must be a non-negative number, got {threshold}"
        )));
    }

    let snapshot = SnapshotDb::open(&data_dir.existing_snapshot()?)?.read()?;
    let engine = Engine::new(snapshot, config_db.scoring_config()?);
    let embedder = FixedEmbedder::new(corpus::read_embedding(&args.embedding)?);

    let answer = engine.answer(&embedder, &args.query, top_k, threshold)?;

    if args.json {
        search::format_json(&answer)?;
    } else {
        search::format_human(&answer);
    }
    Ok(())
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    json: bool,
) -> Result<()> {
    let summary = if data_dir.has_snapshot() {
        Some(SnapshotDb::open(&data_dir.snapshot_db())?.summary()?)
    } else {
        None
    };
    let settings = config_db.effective_settings()?;

    if json {
        let settings: serde_json::Map<String, serde_json::Value> = settings
            .iter()
            .map(|(key, value, _)| (key.to_string(), value.clone().into()))
            .collect();
        let status = serde_json::json!({
            "data_dir": data_dir.root().display().to_string(),
            "snapshot": summary,
            "settings": settings,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        match summary {
            Some(s) => {
                println!("Documents: {}", s.documents);
                println!("Dimension: {}", s.dimension);
                println!("Keyword terms: {}", s.terms);
                println!("Built at: {} (unix seconds)", s.built_at);
            }
            None => println!("No snapshot built yet."),
        }
        println!("Settings:");
        for (key, value, _) in &settings {
            println!("  {key} = {value}");
        }
    }
    Ok(())
}

fn config_show(config_db: &ConfigDb, json: bool) -> Result<()> {
    let settings = config_db.effective_settings()?;

    if json {
        let entries: Vec<serde_json::Value> = settings
            .iter()
            .map(|(key, value, stored)| {
                serde_json::json!({
                    "key": key,
                    "value": value,
                    "stored": stored,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (key, value, stored) in &settings {
            let marker = if *stored { "" } else { " (default)" };
            println!("{key} = {value}{marker}");
        }
    }
    Ok(())
}
