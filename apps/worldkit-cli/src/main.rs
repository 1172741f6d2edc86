mod demo;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use worldkit_kernel::{World, WorldConfig};
use worldkit_persist::WorldStore;

#[derive(Parser)]
#[command(name = "worldkit-cli", about = "CLI tool for worldkit operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World config as JSON; missing fields take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective world config
    Info,
    /// Run the demo world and print a summary
    Simulate {
        /// Number of objects to admit
        #[arg(short, long, default_value = "20")]
        objects: usize,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "60")]
        ticks: u64,
    },
    /// Simulate, write a snapshot to a store, reload it and compare
    Snapshot {
        /// Store directory
        #[arg(long)]
        out: PathBuf,
        #[arg(short, long, default_value = "20")]
        objects: usize,
        #[arg(short, long, default_value = "60")]
        ticks: u64,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorldConfig> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;
    let registry = demo::registry();

    match cli.command {
        Commands::Info => {
            println!("worldkit-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("world: name={}", config.name);
            println!("  log_hook_failures={}", config.log_hook_failures);
            println!("  record_events={}", config.record_events);
            println!("templates: {}", registry.keys().collect::<Vec<_>>().join(", "));
        }
        Commands::Simulate { objects, ticks } => {
            tracing::info!(objects, ticks, "starting simulation");
            let mut world = demo::build_world(config, &registry, objects)?;
            let summary = demo::run(&mut world, Instant::now(), ticks);
            print_world(&world);
            println!(
                "Run: ticks={}, stepped={}, purged={}, hook_failures={}",
                summary.ticks, summary.stepped, summary.purged, summary.hook_failures
            );
        }
        Commands::Snapshot {
            out,
            objects,
            ticks,
        } => {
            let mut world = demo::build_world(config.clone(), &registry, objects)?;
            demo::run(&mut world, Instant::now(), ticks);
            print_world(&world);

            let mut store = WorldStore::open(&out)
                .with_context(|| format!("opening store {}", out.display()))?;
            let index = store.save(&world)?;
            tracing::info!(index, root = %out.display(), "snapshot saved");

            let reopened = WorldStore::open(&out)?;
            let snap = reopened.load_latest()?;
            println!(
                "Snapshot #{index}: tick={}, objects={}, hash={}, valid={}",
                snap.tick,
                snap.objects.len(),
                snap.hash,
                snap.verify()
            );

            let mut restored = World::with_config(config);
            let report = snap.restore(&mut restored, &registry)?;
            println!(
                "Restored: admitted={}, skipped={}",
                report.admitted.len(),
                report.skipped.len()
            );
            println!(
                "Match: {}",
                if restored.save() == world.save() {
                    "OK"
                } else {
                    "MISMATCH"
                }
            );
        }
    }

    Ok(())
}

fn print_world(world: &World) {
    println!(
        "World {}: tick={}, objects={}, wanderers={}, mayflies={}, events={}",
        world.id(),
        world.tick(),
        world.len(),
        world.query().by_tag("wanderer").count(),
        world.query().by_tag("mayfly").count(),
        world.events().len()
    );
}
