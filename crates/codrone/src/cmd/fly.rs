use std::sync::Arc;
use std::time::Instant;

use codrone_link::{FlightConfig, FlightStage};
use tracing::{info, warn};

use crate::cmd::{connect, on_interrupt, parse_duration, FlyArgs};
use crate::exit::{flight_error, CliResult, SUCCESS};
use crate::output::{print_flight, OutputFormat};

pub fn run(args: FlyArgs, format: OutputFormat) -> CliResult<i32> {
    let hover = parse_duration(&args.hover)?;
    let flight_config = FlightConfig {
        takeoff_timeout: parse_duration(&args.takeoff_timeout)?,
        landing_timeout: parse_duration(&args.landing_timeout)?,
        ..FlightConfig::default()
    };

    let drone = connect(&args.connect, flight_config)?;

    // Ctrl-C cuts the motors wherever the flight is.
    let flight = Arc::clone(drone.flight());
    on_interrupt(move || {
        warn!("interrupted, stopping motors");
        if let Err(err) = flight.emergency_stop() {
            warn!(%err, "emergency stop failed");
        }
    })?;

    let takeoff = drone
        .takeoff()
        .map_err(|err| flight_error("takeoff failed", err))?;

    info!(?hover, "hovering");
    let started = Instant::now();
    let hovered = drone.hover(hover);
    let hover_time = started.elapsed();
    if let Err(err) = hovered {
        if drone.stage() == FlightStage::Flight {
            if let Err(land_err) = drone.land() {
                warn!(%land_err, "landing after failed hover did not complete");
            }
        }
        return Err(flight_error("hover failed", err));
    }

    drone
        .land()
        .map_err(|err| flight_error("landing failed", err))?;

    print_flight(&takeoff, hover_time, true, drone.stage(), format);
    Ok(SUCCESS)
}
