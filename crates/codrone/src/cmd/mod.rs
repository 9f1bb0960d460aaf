use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use codrone_link::{Drone, FlightConfig, LinkConfig};
use codrone_transport::DEFAULT_BAUD_RATE;

use crate::exit::{link_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod fly;
pub mod monitor;
pub mod ports;
pub mod request;
pub mod stop;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports and mark the controller.
    Ports(PortsArgs),
    /// Poll battery, flight mode and fault flags.
    Monitor(MonitorArgs),
    /// Request one telemetry packet and print it.
    Request(RequestArgs),
    /// Take off, hover, then land.
    Fly(FlyArgs),
    /// Stop all motors immediately.
    Stop(StopArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Request(args) => request::run(args, format),
        Command::Fly(args) => fly::run(args, format),
        Command::Stop(args) => stop::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the drone.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Controller serial port. Found by USB vendor id when omitted.
    #[arg(long, short = 'p', env = "CODRONE_PORT", conflicts_with = "socket")]
    pub port: Option<PathBuf>,
    /// Unix socket of a bridge or simulator, used instead of a serial port.
    #[arg(long, env = "CODRONE_SOCKET")]
    pub socket: Option<PathBuf>,
    /// Serial line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// How long the drone has to answer after connecting (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub verify_timeout: String,
    /// Skip the connect-time status check.
    #[arg(long)]
    pub no_verify: bool,
}

impl ConnectArgs {
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        let mut config = LinkConfig {
            verify_on_connect: !self.no_verify,
            verify_timeout: parse_duration(&self.verify_timeout)?,
            ..LinkConfig::default()
        };
        config.serial.baud_rate = self.baud;
        Ok(config)
    }
}

pub fn connect(args: &ConnectArgs, flight: FlightConfig) -> CliResult<Drone> {
    connect_with(args, args.link_config()?, flight)
}

pub fn connect_with(args: &ConnectArgs, config: LinkConfig, flight: FlightConfig) -> CliResult<Drone> {
    #[cfg(not(unix))]
    {
        let _ = (args, config, flight);
        return Err(CliError::new(
            crate::exit::TRANSPORT_ERROR,
            "the codrone CLI needs a Unix serial or socket transport",
        ));
    }

    #[cfg(unix)]
    {
        let result = match (&args.socket, &args.port) {
            (Some(socket), _) => Drone::connect_socket(socket, config, flight),
            (None, Some(port)) => Drone::connect(port, config, flight),
            (None, None) => Drone::connect_auto(config, flight),
        };
        result.map_err(|err| link_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Only list ports that look like the controller.
    #[arg(long)]
    pub controller: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Time between polls (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Exit after N polls.
    #[arg(long)]
    pub count: Option<usize>,
    /// Extra data types to poll and print (comma-separated, e.g. attitude,range).
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Data type to request, e.g. state, attitude, information.
    pub data_type: String,
    /// How long to wait for the answer (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct FlyArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// How long to hover between takeoff and landing (e.g. 3s).
    #[arg(long, default_value = "3s")]
    pub hover: String,
    /// Time allowed for the drone to report it is airborne.
    #[arg(long, default_value = "4s")]
    pub takeoff_timeout: String,
    /// Time allowed for each landing phase.
    #[arg(long, default_value = "4s")]
    pub landing_timeout: String,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Install a Ctrl-C handler once per process.
pub fn on_interrupt(handler: impl Fn() + Send + 'static) -> CliResult<()> {
    ctrlc::set_handler(handler).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        for bad in ["0s", "bad", "", "-1s", "1.5s"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.code, USAGE, "{bad:?}");
        }
    }

    #[test]
    fn link_config_from_args() {
        let args = ConnectArgs {
            port: None,
            socket: None,
            baud: 57_600,
            verify_timeout: "250ms".to_string(),
            no_verify: true,
        };
        let config = args.link_config().unwrap();
        assert_eq!(config.serial.baud_rate, 57_600);
        assert_eq!(config.verify_timeout, Duration::from_millis(250));
        assert!(!config.verify_on_connect);
    }
}
