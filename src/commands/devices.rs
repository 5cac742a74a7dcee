use crate::api::{AvailableDevice, Device, RegisterDeviceRequest};
use crate::cli::DeviceCommand;
use crate::output::units::truncate_id;
use crate::output::{OutputFormat, Table};
use crate::resolve::resolve;

use super::{CliError, Context};

pub async fn handle(ctx: &mut Context, command: DeviceCommand) -> Result<(), CliError> {
    match command {
        DeviceCommand::Available => available(ctx).await,
        DeviceCommand::Register {
            address,
            pci_address,
            name,
        } => {
            let Some(pci_address) = address.or(pci_address).filter(|a| !a.is_empty()) else {
                return Err(CliError::Usage(
                    "PCI address is required (positional or --pci-address)".to_string(),
                ));
            };
            let doc = ctx
                .api
                .register_device(&RegisterDeviceRequest { pci_address, name })
                .await?;
            if ctx.format != OutputFormat::Auto {
                return ctx.emit_document("device register", &doc, false);
            }
            let device: Device = doc.parse()?;
            ctx.notice(format!("Registered device {} ({})", device.name, device.id));
            Ok(())
        }
        DeviceCommand::List => list(ctx).await,
        DeviceCommand::Get { device } => {
            let id = resolve_device(ctx, &device).await?;
            let doc = ctx.api.get_device(&id).await?;
            ctx.emit_document("device get", &doc, false)
        }
        DeviceCommand::Delete { device } => {
            let id = resolve_device(ctx, &device).await?;
            ctx.api.delete_device(&id).await?;
            ctx.notice(format!("Deleted device {device}"));
            Ok(())
        }
    }
}

async fn available(ctx: &mut Context) -> Result<(), CliError> {
    let doc = ctx.api.available_devices().await?;
    if ctx.format != OutputFormat::Auto {
        return ctx.emit_document("device available", &doc, true);
    }

    let devices: Vec<AvailableDevice> = doc.parse()?;
    if devices.is_empty() {
        ctx.notice("No passthrough-capable devices found.");
        return Ok(());
    }
    ctx.emit_table("device available", &available_table(&devices))
}

async fn list(ctx: &mut Context) -> Result<(), CliError> {
    let doc = ctx.api.list_devices().await?;
    if ctx.format != OutputFormat::Auto {
        return ctx.emit_document("device list", &doc, true);
    }

    let devices: Vec<Device> = doc.parse()?;
    if devices.is_empty() {
        ctx.notice("No registered devices.");
        return Ok(());
    }
    ctx.emit_table("device list", &device_table(&devices))
}

async fn resolve_device(ctx: &Context, identifier: &str) -> Result<String, CliError> {
    let devices: Vec<Device> = ctx.api.list_devices().await?.parse()?;
    Ok(resolve(identifier, &devices)?)
}

/// PCI ADDRESS, VENDOR, DEVICE, IOMMU, DRIVER; the names shrink first.
pub fn available_table(devices: &[AvailableDevice]) -> Table {
    let mut table = Table::new(["PCI ADDRESS", "VENDOR", "DEVICE", "IOMMU", "DRIVER"])
        .with_truncation_priority([2, 1]);
    for device in devices {
        table.add_row([
            device.pci_address.clone(),
            device.vendor_label().to_string(),
            device.device_label().to_string(),
            device.iommu_group.to_string(),
            device
                .current_driver
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("-")
                .to_string(),
        ]);
    }
    table
}

pub fn device_table(devices: &[Device]) -> Table {
    let mut table = Table::new(["ID", "NAME", "TYPE", "PCI ADDRESS", "VFIO", "ATTACHED TO"])
        .with_truncation_priority([0, 1, 5]);
    for device in devices {
        let vfio = if device.bound_to_vfio { "yes" } else { "no" };
        let attached = device
            .attached_to
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(truncate_id)
            .unwrap_or_else(|| "-".to_string());
        table.add_row([
            truncate_id(&device.id),
            device.name.clone(),
            device.device_type.clone(),
            device.pci_address.clone(),
            vfio.to_string(),
            attached,
        ]);
    }
    table
}
