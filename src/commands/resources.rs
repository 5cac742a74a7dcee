//! Host capacity report.

use std::io::Write;

use serde_json::Value;

use crate::output::units::{format_bps, format_bytes, format_mb};
use crate::output::{stream_output, OutputError, OutputFormat, Table};

use super::{CliError, Context};

#[derive(Debug, Clone, Copy)]
enum Unit {
    Count,
    Bytes,
    BitsPerSecond,
}

impl Unit {
    fn format(self, value: i64) -> String {
        match self {
            Unit::Count => value.to_string(),
            Unit::Bytes => format_bytes(value),
            Unit::BitsPerSecond => format_bps(value),
        }
    }
}

const RESOURCE_ROWS: [(&str, Unit); 4] = [
    ("cpu", Unit::Count),
    ("memory", Unit::Bytes),
    ("disk", Unit::Bytes),
    ("network", Unit::BitsPerSecond),
];

const DISK_BREAKDOWN: [(&str, &str); 4] = [
    ("images_bytes", "Images:"),
    ("volumes_bytes", "Volumes:"),
    ("overlays_bytes", "Overlays:"),
    ("oci_cache_bytes", "OCI Cache:"),
];

pub async fn show(ctx: &mut Context) -> Result<(), CliError> {
    let doc = ctx.api.resources().await?;
    if ctx.format != OutputFormat::Auto {
        return ctx.emit_document("resources", &doc, false);
    }

    let width = ctx.terminal.terminal_width();
    stream_output(ctx.direct.as_ref(), "resources", |out| {
        write_report(out, doc.value(), width)
    })?;
    Ok(())
}

/// Capacity table, then GPU, disk breakdown and per-instance allocations
/// when the server reports them.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &Value,
    width: usize,
) -> Result<(), OutputError> {
    capacity_table(report).render(out, width)?;

    if let Some(gpu) = report.get("gpu").filter(|g| !g.is_null()) {
        writeln!(out)?;
        write_gpu(out, gpu, width)?;
    }

    if let Some(breakdown) = report.get("disk_breakdown").filter(|b| b.is_object()) {
        writeln!(out)?;
        writeln!(out, "DISK BREAKDOWN:")?;
        for (key, label) in DISK_BREAKDOWN {
            let bytes = int(breakdown, key);
            if bytes > 0 {
                writeln!(out, "  {label:<11} {}", format_bytes(bytes))?;
            }
        }
    }

    let allocations = report
        .get("allocations")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty());
    if let Some(allocations) = allocations {
        writeln!(out)?;
        writeln!(out, "ALLOCATIONS:")?;
        allocation_table(allocations).render(out, width)?;
    }
    Ok(())
}

pub fn capacity_table(report: &Value) -> Table {
    let mut table = Table::new([
        "RESOURCE",
        "CAPACITY",
        "EFFECTIVE",
        "ALLOCATED",
        "AVAILABLE",
        "OVERSUB",
    ]);
    for (name, unit) in RESOURCE_ROWS {
        let Some(resource) = report.get(name).filter(|r| r.is_object()) else {
            continue;
        };
        let ratio = resource
            .get("oversub_ratio")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
        table.add_row([
            name.to_string(),
            unit.format(int(resource, "capacity")),
            unit.format(int(resource, "effective_limit")),
            unit.format(int(resource, "allocated")),
            unit.format(int(resource, "available")),
            format!("{ratio:.1}x"),
        ]);
    }
    table
}

fn allocation_table(allocations: &[Value]) -> Table {
    let mut table = Table::new(["INSTANCE", "CPU", "MEMORY", "DISK", "NET DOWN", "NET UP"])
        .with_truncation_priority([0]);
    for allocation in allocations {
        table.add_row([
            str_field(allocation, "instance_name").to_string(),
            int(allocation, "cpu").to_string(),
            format_bytes(int(allocation, "memory_bytes")),
            format_bytes(int(allocation, "disk_bytes")),
            format_bps(int(allocation, "network_download_bps")),
            format_bps(int(allocation, "network_upload_bps")),
        ]);
    }
    table
}

fn write_gpu<W: Write>(out: &mut W, gpu: &Value, width: usize) -> Result<(), OutputError> {
    let mode = str_field(gpu, "mode");
    writeln!(
        out,
        "GPU: {mode} mode ({}/{} slots used)",
        int(gpu, "used_slots"),
        int(gpu, "total_slots")
    )?;

    match mode {
        "vgpu" => {
            let Some(profiles) = gpu.get("profiles").and_then(Value::as_array) else {
                return Ok(());
            };
            let mut table = Table::new(["PROFILE", "VRAM", "AVAILABLE"]);
            for profile in profiles {
                table.add_row([
                    str_field(profile, "name").to_string(),
                    format_mb(int(profile, "framebuffer_mb")),
                    int(profile, "available").to_string(),
                ]);
            }
            if !table.is_empty() {
                table.render(out, width)?;
            }
        }
        "passthrough" => {
            let Some(devices) = gpu.get("devices").and_then(Value::as_array) else {
                return Ok(());
            };
            let mut table = Table::new(["DEVICE", "AVAILABLE"]);
            for device in devices {
                let available = device.get("available").and_then(Value::as_bool) == Some(true);
                table.add_row([
                    str_field(device, "name"),
                    if available { "yes" } else { "no" },
                ]);
            }
            if !table.is_empty() {
                table.render(out, width)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn int(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        _ => 0,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> Value {
        json!({
            "cpu": {"capacity": 16, "effective_limit": 32, "allocated": 4, "available": 28, "oversub_ratio": 2.0},
            "memory": {"capacity": 34359738368i64, "effective_limit": 34359738368i64,
                       "allocated": 1073741824, "available": 33285996544i64, "oversub_ratio": 1.0},
            "network": {"capacity": 125000000, "effective_limit": 125000000,
                        "allocated": 0, "available": 125000000, "oversub_ratio": 1.0},
            "disk_breakdown": {"images_bytes": 2147483648i64, "volumes_bytes": 0},
            "allocations": [
                {"instance_name": "web", "cpu": 2, "memory_bytes": 1073741824,
                 "disk_bytes": 10737418240i64, "network_download_bps": 12500000,
                 "network_upload_bps": 1250000}
            ]
        })
    }

    #[test]
    fn capacity_rows_use_units() {
        let table = capacity_table(&report());
        let rows = table.rows();
        assert_eq!(rows.len(), 3, "disk missing from the report is skipped");
        assert_eq!(rows[0], vec!["cpu", "16", "32", "4", "28", "2.0x"]);
        assert_eq!(rows[1][1], "32.0 GB");
        assert_eq!(rows[2][1], "1.0 Gbps");
    }

    #[test]
    fn report_sections() {
        let mut out = Vec::new();
        write_report(&mut out, &report(), 120).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("DISK BREAKDOWN:\n  Images:     2.0 GB\n"));
        assert!(!text.contains("Volumes:"));
        assert!(text.contains("ALLOCATIONS:"));
        assert!(text.contains("100 Mbps"));
        assert!(text.contains("10 Mbps"));
        assert!(!text.contains("GPU:"));
    }

    #[test]
    fn vgpu_profiles() {
        let gpu = json!({
            "mode": "vgpu", "total_slots": 4, "used_slots": 1,
            "profiles": [{"name": "L40S-1Q", "framebuffer_mb": 1024, "available": 3}]
        });
        let mut out = Vec::new();
        write_gpu(&mut out, &gpu, 80).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("GPU: vgpu mode (1/4 slots used)\n"));
        assert!(text.contains("L40S-1Q"));
        assert!(text.contains("1.0 GB"));
    }
}
