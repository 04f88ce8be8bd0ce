// simulation_main.rs
//
// Usage: simulation_main [fixed|unsync|adaptive] [seconds]
//
// SIM_CONFIG=<file.json> overrides the default timings,
// SIM_TRACE=<file.csv> writes the event trace when the run ends.

use intersection_sim::communication::messages::{LogNotifier, SharedNotifier, TraceRecorder};
use intersection_sim::config::SimulationConfig;
use intersection_sim::error::SimResult;
use intersection_sim::shared_data::current_timestamp;
use intersection_sim::simulation_engine::simulation::{RunMode, Simulation};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RUN_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        eprintln!("simulation failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> SimResult<()> {
    let mut args = env::args().skip(1);
    let mode: RunMode = match args.next() {
        Some(arg) => arg.parse()?,
        None => RunMode::FixedCycle,
    };
    let secs = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_RUN_SECS);

    let config = match env::var("SIM_CONFIG") {
        Ok(path) => SimulationConfig::from_json_file(path)?,
        Err(_) => SimulationConfig::default(),
    };

    let trace_path = env::var("SIM_TRACE").ok();
    let recorder = trace_path.as_ref().map(|_| Arc::new(TraceRecorder::echoing()));
    let notifier: SharedNotifier = match &recorder {
        Some(recorder) => recorder.clone(),
        None => Arc::new(LogNotifier),
    };

    println!("Starting {} simulation at {} for {}s", mode, current_timestamp(), secs);
    let mut simulation = Simulation::new(config, notifier);
    simulation.start(mode)?;

    let deadline = tokio::time::sleep(Duration::from_secs(secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if simulation.is_collision_detected() {
                    println!("Collision detected, ending the run");
                    break;
                }
            }
        }
    }

    let summary = simulation.stop().await?;
    println!("Spawned:   {}", summary.spawned);
    println!("Departed:  {}", summary.departed);
    println!("Removed:   {}", summary.removed);
    println!("Active:    {}", summary.active);
    println!("Collision: {}", summary.collision_detected);

    if let (Some(path), Some(recorder)) = (trace_path, recorder) {
        recorder.write_csv(&path)?;
        println!("Trace written to {}", path);
    }
    Ok(())
}
