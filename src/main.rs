//! Layered erosion CLI.
//!
//! Seeds a layered terrain from a soil profile, erodes it for a number of
//! ticks and writes height, color and normal maps.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use layered_erosion::export::{
    export_color_png, export_height_png, export_normal_png, PngExportOptions, RasterSnapshot,
};
use layered_erosion::pipeline::{Simulation, SimulationConfig};
use layered_erosion::soil::SoilProfile;

/// Particle erosion over layered terrain.
#[derive(Parser)]
#[command(name = "layered-erosion")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a terrain, erode it and export the result.
    Run {
        /// Simulation config as JSON; flags below override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Soil profile as JSON (soils and initial layers).
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Grid width in cells.
        #[arg(long)]
        width: Option<usize>,

        /// Grid depth in cells.
        #[arg(long)]
        depth: Option<usize>,

        /// Random seed for reproducible runs.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of ticks to simulate.
        #[arg(short, long, default_value = "50")]
        ticks: u64,

        /// Water particles per tick.
        #[arg(long)]
        water: Option<usize>,

        /// Wind particles per tick.
        #[arg(long)]
        wind: Option<usize>,

        /// Ticks between seepage passes (0 disables seepage).
        #[arg(long)]
        seep_interval: Option<u64>,

        /// Output directory for generated files.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Base name for output files.
        #[arg(short, long, default_value = "terrain")]
        name: String,
    },

    /// Print the soil table and layer stack of a profile.
    Info {
        /// Soil profile as JSON; the built-in profile if omitted.
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print the profile as JSON.
        #[arg(long)]
        json: bool,
    },
}

struct RunArgs {
    config: Option<PathBuf>,
    profile: Option<PathBuf>,
    width: Option<usize>,
    depth: Option<usize>,
    seed: Option<u64>,
    ticks: u64,
    water: Option<usize>,
    wind: Option<usize>,
    seep_interval: Option<u64>,
    output: PathBuf,
    name: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            profile,
            width,
            depth,
            seed,
            ticks,
            water,
            wind,
            seep_interval,
            output,
            name,
        } => run_simulation(RunArgs {
            config,
            profile,
            width,
            depth,
            seed,
            ticks,
            water,
            wind,
            seep_interval,
            output,
            name,
        }),
        Commands::Info { profile, json } => run_info(profile.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_profile(path: Option<&Path>) -> Result<SoilProfile, Box<dyn Error>> {
    Ok(match path {
        Some(path) => SoilProfile::load(path)?,
        None => SoilProfile::default(),
    })
}

fn run_simulation(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<SimulationConfig>(&fs::read_to_string(path)?)?,
        None => SimulationConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(depth) = args.depth {
        config.depth = depth;
    }
    if let Some(water) = args.water {
        config.water_per_tick = water;
    }
    if let Some(wind) = args.wind {
        config.wind_per_tick = wind;
    }
    if let Some(interval) = args.seep_interval {
        config.seep_interval = interval;
    }
    config.seed = args.seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    let profile = load_profile(args.profile.as_deref())?;

    println!("Layered Erosion");
    println!("===============");
    println!("Grid: {}x{}", config.width, config.depth);
    println!("Seed: {}", config.seed);
    println!(
        "Particles per tick: {} water, {} wind",
        config.water_per_tick, config.wind_per_tick
    );
    println!("Output: {}", args.output.display());

    let start = Instant::now();
    let mut sim = Simulation::from_profile(&config, &profile)?;
    println!("\nSeeded {} layers in {:.2?}", profile.layers.len(), start.elapsed());
    let seeded_volume = sim.terrain().total_volume();

    let start = Instant::now();
    let report_every = (args.ticks / 10).max(1);
    let stats = sim.run_with_callbacks(
        args.ticks,
        |_, _, _| {},
        |stats, total| {
            if stats.tick % report_every == 0 || stats.tick == total {
                println!(
                    "  [{}/{}] water steps {}, floods {} ({} drained), wind steps {}",
                    stats.tick, total, stats.water_steps, stats.floods, stats.drains, stats.wind_steps
                );
            }
        },
    )?;
    println!("Simulation completed in {:.2?}", start.elapsed());

    let terrain = sim.terrain();
    if let Some(last) = stats.last() {
        if last.pool_exhausted > 0 {
            println!("Warning: {} segment allocations failed", last.pool_exhausted);
        }
        if last.residue > 0 {
            println!("Warning: {} removals left a residue", last.residue);
        }
    }
    println!(
        "Volume: {:.3} -> {:.3} ({} segments in use)",
        seeded_volume,
        terrain.total_volume(),
        terrain.pool().len_used()
    );

    println!("\nExporting maps...");
    fs::create_dir_all(&args.output)?;

    let snapshot = RasterSnapshot::capture(terrain, sim.table());
    let (min_h, max_h) = snapshot.height_range();
    println!("Height range: [{:.4}, {:.4}]", min_h, max_h);

    let options = PngExportOptions::auto_range(&snapshot);
    let height_path = args.output.join(format!("{}_height.png", args.name));
    let color_path = args.output.join(format!("{}_color.png", args.name));
    let normal_path = args.output.join(format!("{}_normal.png", args.name));
    export_height_png(&snapshot, &height_path, &options)?;
    export_color_png(&snapshot, &color_path, &options)?;
    export_normal_png(&snapshot, &normal_path, &options)?;
    println!("  {}", height_path.display());
    println!("  {}", color_path.display());
    println!("  {}", normal_path.display());

    Ok(())
}

fn run_info(profile: Option<&Path>, json: bool) -> Result<(), Box<dyn Error>> {
    let profile = load_profile(profile)?;

    if json {
        println!("{}", profile.to_json_string()?);
        return Ok(());
    }

    let table = profile.build_table()?;
    println!("Soils ({}):", table.len());
    println!(
        "  {:<10} {:>8} {:>8} {:>10} {:>10} {:>10}  {}",
        "name", "porosity", "friction", "max_slope", "settling", "suspension", "transports/erodes/cascades/abrades"
    );
    for soil in table.types() {
        let p = table.param(soil);
        println!(
            "  {:<10} {:>8.3} {:>8.3} {:>10.4} {:>10.3} {:>10.4}  {}/{}/{}/{}",
            table.name(soil),
            p.porosity,
            p.friction,
            p.max_slope,
            p.settling,
            p.suspension,
            table.name(p.transports),
            table.name(p.erodes),
            table.name(p.cascades),
            table.name(p.abrades),
        );
    }

    println!("\nLayers (bottom to top):");
    for (i, layer) in profile.layers.iter().enumerate() {
        println!(
            "  {:>2}. {:<10} max({:.3}, {:.3} + {:.3} * noise), {} octaves at {:.1} cycles",
            i, layer.soil, layer.min, layer.bias, layer.scale, layer.octaves, layer.frequency
        );
    }
    Ok(())
}
