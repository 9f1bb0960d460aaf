use serde::Serialize;

use codrone_link::FlightConfig;

use crate::cmd::{connect_with, StopArgs};
use crate::exit::{flight_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct StopOutput {
    stopped: bool,
    frames_sent: u64,
}

pub fn run(args: StopArgs, format: OutputFormat) -> CliResult<i32> {
    // Stopping must not wait on a status round trip.
    let mut config = args.connect.link_config()?;
    config.verify_on_connect = false;
    let drone = connect_with(&args.connect, config, FlightConfig::default())?;

    drone
        .emergency_stop()
        .map_err(|err| flight_error("stop failed", err))?;

    let out = StopOutput {
        stopped: true,
        frames_sent: drone.commands().frames_sent(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => println!("motors stopped"),
    }
    Ok(SUCCESS)
}
