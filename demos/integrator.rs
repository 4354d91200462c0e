use std::collections::BTreeMap;

use clap::Parser;

use discretize_rs::boxes::{Aabb, BoxGeometry, BoxSet};
use discretize_rs::discretize::Discretizer;
use discretize_rs::dynamics::{Dynamics, HybridSys, Mode};
use discretize_rs::integrator::{Integrator, IntegratorOracle};
use discretize_rs::observer::{Decision, Snapshot};
use discretize_rs::params::{DiscretizeParams, SwitchedParams};
use discretize_rs::partition::prop_partition;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of grid cells per axis.
    #[arg(value_name = "INT", default_value = "4")]
    n: usize,

    /// Number of steps to reach the target region.
    #[clap(long, value_name = "INT", default_value = "1")]
    horizon: usize,

    /// Smallest volume a split piece may have.
    #[clap(long, value_name = "FLOAT", default_value = "0.2")]
    min_volume: f64,

    /// Input bound per axis.
    #[clap(long, value_name = "FLOAT", default_value = "0.5")]
    input: f64,

    /// Also abstract a switched system with a second, horizontal-only mode.
    #[clap(long)]
    switched: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    // Domain [0, n]^2 with "home" in the lower-left cell and "goal" in the upper-right one
    let n = args.n as f64;
    let domain = BoxSet::rect([0.0, 0.0], [n, n]);
    let props = BTreeMap::from([
        ("home".to_string(), BoxSet::rect([0.0, 0.0], [1.0, 1.0])),
        ("goal".to_string(), BoxSet::from_box(Aabb::new(vec![n - 1.0, n - 1.0], vec![n, n]))),
    ]);

    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let part = prop_partition(&g, domain.clone(), props)?;
    println!("Initial partition has {} regions", part.len());

    let params = DiscretizeParams::default()
        .with_horizon(args.horizon)
        .with_min_cell_volume(args.min_volume);
    println!("params = {}", params);

    let dynamics = Dynamics::linear(Integrator::new(domain.clone(), vec![args.input, args.input]));

    let mut splits = 0;
    let mut count_splits = |snapshot: &Snapshot<'_, BoxSet>| {
        if let Decision::Split { new_regions } = &snapshot.decision {
            splits += new_regions.len();
        }
    };
    let ab = Discretizer::new(&g, &oracle)
        .with_observer(&mut count_splits)
        .discretize(&part, &dynamics, &params)?;
    println!("Refinement added {} regions", splits);
    println!("{}", ab);

    let home = ab.ts().states().find(|&s| ab.ts().label_of(s).contains("home"));
    if let Some(home) = home {
        println!("Successors of home state {}: {:?}", home, ab.ts().successors(home));
    }

    if args.switched {
        let hybrid = HybridSys::new()
            .with_mode(Mode::new("e", "free"), dynamics)
            .with_mode(
                Mode::new("e", "rail"),
                Dynamics::linear(Integrator::new(domain, vec![args.input, 0.0])),
            );
        match Discretizer::new(&g, &oracle).discretize_switched(&part, &hybrid, &SwitchedParams::new(params))? {
            Some(switched) => println!("{}", switched),
            None => println!("No modes to abstract"),
        }
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.2} s", time_total.as_secs_f64());

    Ok(())
}
