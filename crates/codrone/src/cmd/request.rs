use codrone_link::FlightConfig;
use codrone_packet::DataType;

use crate::cmd::{connect, parse_duration, RequestArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_snapshot, OutputFormat};

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let data_type = parse_data_type(&args.data_type)?;
    let timeout = parse_duration(&args.timeout)?;

    let drone = connect(&args.connect, FlightConfig::default())?;
    let snapshot = drone
        .request_and_wait(data_type, timeout)
        .map_err(|err| link_error(&format!("request {data_type} failed"), err))?;

    print_snapshot(&snapshot, format);
    Ok(SUCCESS)
}

/// A data type the drone can be asked for.
pub fn parse_data_type(name: &str) -> CliResult<DataType> {
    let data_type = DataType::from_name(name).ok_or_else(|| {
        let known = DataType::ALL
            .iter()
            .filter(|t| !t.is_outgoing())
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ");
        CliError::new(USAGE, format!("unknown data type {name:?} (known: {known})"))
    })?;
    if data_type.is_outgoing() {
        return Err(CliError::new(
            USAGE,
            format!("{data_type} is sent to the drone, not requested from it"),
        ));
    }
    Ok(data_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_types_parse() {
        assert_eq!(parse_data_type("attitude").unwrap(), DataType::Attitude);
        assert_eq!(parse_data_type("State").unwrap(), DataType::State);
    }

    #[test]
    fn outgoing_and_unknown_types_are_usage_errors() {
        assert_eq!(parse_data_type("control").unwrap_err().code, USAGE);
        let err = parse_data_type("warp-drive").unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("attitude"));
    }
}
