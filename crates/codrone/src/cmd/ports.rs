use crate::cmd::PortsArgs;
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    #[cfg(not(unix))]
    {
        let _ = (args, format);
        return Err(crate::exit::CliError::new(
            crate::exit::TRANSPORT_ERROR,
            "port discovery is only available on Unix",
        ));
    }

    #[cfg(unix)]
    {
        let mut ports = codrone_transport::list_ports();
        if args.controller {
            ports.retain(|port| port.is_controller());
        }
        print_ports(&ports, format);

        // A controller-only listing with no match is a failed lookup.
        if args.controller && ports.is_empty() {
            return Ok(FAILURE);
        }
        Ok(SUCCESS)
    }
}
