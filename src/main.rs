//! # Pokebot: notification-triggered automation for OneBot bots
//!
//! Usage:
//!   pokebot run                         # Receive events, start daily batches
//!   pokebot targets likes add 12345     # Edit the stored batch targets
//!   pokebot batch sign                  # Run one batch now
//!   pokebot init                        # Write the default config

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pokebot_core::PokebotConfig;
use pokebot_core::traits::{BotApi, MessageSink};
use pokebot_features::BotEngine;
use pokebot_features::engine::TARGETS_FILE;
use pokebot_onebot::OneBotClient;
use pokebot_scheduler::{BatchRunner, TargetStore, parse_target};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Events buffered between the receiver and the handler loop.
const EVENT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(
    name = "pokebot",
    version,
    about = "Poke replies, emoji reactions, daily likes and check-ins for OneBot bots"
)]
struct Cli {
    /// Config file (default ~/.pokebot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive event reports and run the configured schedules
    Run,
    /// Inspect or edit the stored batch targets
    Targets {
        feature: Feature,
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Run one batch immediately
    Batch { feature: Feature },
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    List,
    Add { id: String },
    Remove { id: String },
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Feature {
    Likes,
    Sign,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(PokebotConfig::default_path)
}

fn load_config(cli: &Cli) -> Result<PokebotConfig> {
    let config = match &cli.config {
        Some(path) => PokebotConfig::load_from(path)?,
        None => PokebotConfig::load()?,
    };
    Ok(config)
}

async fn build_engine(config: &PokebotConfig, client: Arc<OneBotClient>) -> Result<BotEngine> {
    let data_dir = config.data_path();
    std::fs::create_dir_all(&data_dir)?;
    let store = Arc::new(TargetStore::open(data_dir.join(TARGETS_FILE)).await);
    let api: Arc<dyn BotApi> = client.clone();
    let sink: Arc<dyn MessageSink> = client;
    Ok(BotEngine::new(config, api, sink, store))
}

fn runner(engine: &BotEngine, feature: Feature) -> &Arc<BatchRunner> {
    match feature {
        Feature::Likes => engine.likes().runner(),
        Feature::Sign => engine.sign().runner(),
    }
}

async fn run(mut config: PokebotConfig) -> Result<()> {
    let client = Arc::new(OneBotClient::new(&config.onebot));
    if config.onebot.self_id.is_empty() {
        match client.login_id().await {
            Ok(id) => {
                tracing::info!("Logged in as {id}");
                config.onebot.self_id = id;
            }
            Err(e) => tracing::warn!("Could not resolve bot account, using event reports: {e}"),
        }
    }

    let engine = Arc::new(build_engine(&config, client).await?);
    engine.start_schedules();

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let router = pokebot_onebot::build_router(
        tx,
        config.onebot.access_token.clone(),
        config.onebot.secret.clone(),
        &config.onebot.self_id,
    );
    let listen = config.onebot.listen.clone();
    let server = tokio::spawn(async move {
        let shutdown = async {
            tokio::signal::ctrl_c().await.ok();
        };
        pokebot_onebot::serve(&listen, router, shutdown).await
    });

    println!("Pokebot v{}", env!("CARGO_PKG_VERSION"));
    println!("   OneBot API: {}", config.onebot.api_url);
    println!("   Events:     http://{}", config.onebot.listen);
    println!("   Data Dir:   {}", config.data_path().display());
    println!();

    // Ends when the receiver drops its sender after shutdown.
    while let Some(event) = rx.recv().await {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine.handle(&event).await;
        });
    }

    engine.dispose();
    server.await??;
    tracing::info!("Pokebot stopped");
    Ok(())
}

async fn targets(config: &PokebotConfig, feature: Feature, action: TargetAction) -> Result<()> {
    let engine = build_engine(config, Arc::new(OneBotClient::new(&config.onebot))).await?;
    let runner = runner(&engine, feature);
    let ns = runner.namespace();
    let store = runner.store();

    let parse = |input: &str| {
        parse_target(input).ok_or_else(|| anyhow::anyhow!("'{input}' is not a valid target"))
    };
    match action {
        TargetAction::List => {
            let ids = store.get(ns).await;
            if ids.is_empty() {
                println!("No {ns} targets.");
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        TargetAction::Add { id } => {
            let id = parse(&id)?;
            if store.add(ns, &id).await {
                println!("Added {id} to {ns} targets.");
            } else {
                println!("{id} is already a {ns} target.");
            }
        }
        TargetAction::Remove { id } => {
            let id = parse(&id)?;
            if store.remove(ns, &id).await {
                println!("Removed {id} from {ns} targets.");
            } else {
                println!("{id} is not a {ns} target.");
            }
        }
        TargetAction::Clear => {
            if store.clear(ns).await {
                println!("Cleared {ns} targets.");
            } else {
                println!("No {ns} targets to clear.");
            }
        }
    }
    Ok(())
}

async fn batch(config: &PokebotConfig, feature: Feature) -> Result<()> {
    let engine = build_engine(config, Arc::new(OneBotClient::new(&config.onebot))).await?;
    let runner = runner(&engine, feature);
    let report = runner.run_batch().await;
    println!("[{}] {report} succeeded", runner.namespace());
    if report.total > 0 && report.succeeded == 0 {
        anyhow::bail!("every {} target failed", runner.namespace());
    }
    Ok(())
}

fn init(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite).", path.display());
        return Ok(());
    }
    PokebotConfig::default().save_to(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pokebot=debug,pokebot_core=debug,pokebot_responder=debug,pokebot_scheduler=debug,pokebot_onebot=debug,pokebot_features=debug,tower_http=debug"
    } else {
        "pokebot=info,pokebot_core=info,pokebot_responder=info,pokebot_scheduler=info,pokebot_onebot=info,pokebot_features=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Commands::Init { force } = cli.command {
        return init(config_path(&cli), force);
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Run => run(config).await,
        Commands::Targets { feature, action } => targets(&config, feature, action).await,
        Commands::Batch { feature } => batch(&config, feature).await,
        Commands::Init { .. } => Ok(()),
    }
}
