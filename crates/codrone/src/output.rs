use std::io::IsTerminal;

use clap::ValueEnum;
use codrone_frame::DeviceType;
use codrone_link::{FlightStage, SafetyReport, Snapshot, TakeoffReport};
use codrone_transport::PortInfo;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    data_type: String,
    from: &'static str,
    age_ms: u128,
    sequence: u64,
    payload: &'a codrone_packet::Payload,
}

pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) {
    let data_type = snapshot.payload.data_type();
    match format {
        OutputFormat::Json => print_json(&SnapshotOutput {
            data_type: data_type.to_string(),
            from: DeviceType::name_of(snapshot.route.from),
            age_ms: snapshot.received_at.elapsed().as_millis(),
            sequence: snapshot.sequence,
            payload: &snapshot.payload,
        }),
        OutputFormat::Table => {
            let mut table = table(vec!["FIELD", "VALUE"]);
            for (field, value) in payload_fields(&snapshot.payload) {
                table.add_row(vec![field, value]);
            }
            println!("{data_type} from {}", DeviceType::name_of(snapshot.route.from));
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields = payload_fields(&snapshot.payload)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{data_type} {fields}");
        }
    }
}

/// Flatten a payload into dotted field names and display values.
pub fn payload_fields(payload: &codrone_packet::Payload) -> Vec<(String, String)> {
    let value = serde_json::to_value(payload).unwrap_or(Value::Null);
    let mut fields = Vec::new();
    flatten("", value.get("data").unwrap_or(&Value::Null), &mut fields);
    fields
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, value, out);
            }
        }
        Value::String(text) => out.push((prefix.to_string(), text.clone())),
        Value::Null => {}
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    stage: FlightStage,
    flight_mode: Option<String>,
    #[serde(flatten)]
    report: &'a SafetyReport,
}

pub fn print_status(
    report: &SafetyReport,
    stage: FlightStage,
    flight_mode: Option<String>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&StatusOutput {
            stage,
            flight_mode,
            report,
        }),
        OutputFormat::Table => {
            let mut table = table(vec!["BATTERY", "MODE", "SEVERITY", "STATE FAULTS", "SENSOR FAULTS"]);
            table.add_row(vec![
                battery_text(report.battery),
                flight_mode.unwrap_or_else(|| "-".to_string()),
                format!("{:?}", report.severity),
                format!("{:?}", report.state_faults),
                format!("{:?}", report.sensor_faults),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "battery={} mode={} severity={:?} critical={:?}",
                battery_text(report.battery),
                flight_mode.as_deref().unwrap_or("-"),
                report.severity,
                report.critical_faults,
            );
        }
    }
}

fn battery_text(battery: Option<u8>) -> String {
    battery
        .map(|level| format!("{level}%"))
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Serialize)]
struct PortOutput<'a> {
    path: String,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    product: Option<&'a str>,
    controller: bool,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports
        .iter()
        .map(|port| PortOutput {
            path: port.path.display().to_string(),
            vendor_id: port.vendor_id,
            product_id: port.product_id,
            product: port.product.as_deref(),
            controller: port.is_controller(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = table(vec!["PATH", "VID:PID", "PRODUCT", "CONTROLLER"]);
            for row in &rows {
                table.add_row(vec![
                    row.path.clone(),
                    usb_id(row.vendor_id, row.product_id),
                    row.product.unwrap_or("-").to_string(),
                    if row.controller { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                let marker = if row.controller { " (controller)" } else { "" };
                println!(
                    "{} {}{marker}",
                    row.path,
                    usb_id(row.vendor_id, row.product_id)
                );
            }
        }
    }
}

fn usb_id(vendor: Option<u16>, product: Option<u16>) -> String {
    match (vendor, product) {
        (Some(vendor), Some(product)) => format!("{vendor:04x}:{product:04x}"),
        (Some(vendor), None) => format!("{vendor:04x}:????"),
        _ => "-".to_string(),
    }
}

#[derive(Serialize)]
struct FlightOutput<'a> {
    takeoff: &'a TakeoffReport,
    hovered_ms: u128,
    landed: bool,
    stage: FlightStage,
}

pub fn print_flight(
    takeoff: &TakeoffReport,
    hovered: std::time::Duration,
    landed: bool,
    stage: FlightStage,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&FlightOutput {
            takeoff,
            hovered_ms: hovered.as_millis(),
            landed,
            stage,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Flight:");
            println!("  Battery at takeoff: {}", battery_text(takeoff.battery));
            println!("  Airborne after:     {:?}", takeoff.airborne_after);
            println!("  Confirmed after:    {:?}", takeoff.confirmed_after);
            println!("  Hovered:            {hovered:?}");
            println!("  Landed:             {}", if landed { "yes" } else { "no" });
            println!("  Final stage:        {stage}");
        }
    }
}
