use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use codrone_link::FlightConfig;
use codrone_packet::{DataType, State};

use crate::cmd::request::parse_data_type;
use crate::cmd::{connect, on_interrupt, parse_duration, MonitorArgs};
use crate::exit::{link_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_snapshot, print_status, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let extra = args
        .types
        .iter()
        .map(|name| parse_data_type(name))
        .collect::<CliResult<Vec<_>>>()?;

    let drone = connect(&args.connect, FlightConfig::default())?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    on_interrupt(move || flag.store(false, Ordering::SeqCst))?;

    let mut polls = 0usize;
    while running.load(Ordering::SeqCst) {
        for data_type in [DataType::State, DataType::Error].iter().chain(&extra) {
            drone
                .send_request(*data_type)
                .map_err(|err| link_error("poll failed", err))?;
        }
        thread::sleep(interval);

        if !drone.is_connected() {
            tracing::error!("drone link lost");
            return Ok(FAILURE);
        }

        let mode = drone
            .latest::<State>()
            .map(|state| format!("{:?}", state.flight()));
        print_status(&drone.monitor().report(), drone.stage(), mode, format);
        for data_type in &extra {
            if let Some(snapshot) = drone.snapshot(*data_type) {
                print_snapshot(&snapshot, format);
            }
        }

        polls += 1;
        if args.count.is_some_and(|count| polls >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}
