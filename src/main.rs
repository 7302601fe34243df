use motorway_sim::{Lane, SimConfig, Simulation};
use std::process::ExitCode;
use std::time::Instant;

const USAGE: &str = "usage: motorway-sim <road_length> <on_ramp_start> <on_ramp_end>";

fn parse_args() -> Option<SimConfig> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let [road_length, on_ramp_start, on_ramp_end] = args.as_slice() else {
        return None;
    };
    Some(SimConfig {
        road_length: road_length.parse().ok()?,
        on_ramp_start: on_ramp_start.parse().ok()?,
        on_ramp_end: on_ramp_end.parse().ok()?,
        ..Default::default()
    })
}

fn main() -> ExitCode {
    let _ = env_logger::try_init();

    let Some(config) = parse_args() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!("Simulating...");
    let start = Instant::now();
    let stats = sim.run();
    println!(
        "Simulated {:.0} s in {} frames ({:?} wall clock)",
        sim.time(),
        sim.frame(),
        start.elapsed()
    );

    println!("Trips: {}", stats.trips);
    println!("Trip time:  mean {:.2}, sd {:.2}", stats.trip_time.mean, stats.trip_time.sd);
    println!("Fuel:       mean {:.6}, sd {:.6}", stats.fuel.mean, stats.fuel.sd);
    println!("Emissions:  mean {:.6}, sd {:.6}", stats.emissions.mean, stats.emissions.sd);

    for period in 0..stats.arrivals.periods() {
        let counts = Lane::ALL.map(|lane| {
            (
                stats.arrivals.group(period, lane, false),
                stats.arrivals.group(period, lane, true),
            )
        });
        println!(
            "Period {}: ramp {}/{}, right {}/{}, left {}/{} (light/heavy)",
            period,
            counts[0].0,
            counts[0].1,
            counts[1].0,
            counts[1].1,
            counts[2].0,
            counts[2].1
        );
    }

    ExitCode::SUCCESS
}
