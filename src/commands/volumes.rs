use chrono::Utc;

use crate::api::{AttachVolumeRequest, CreateVolumeRequest, Volume};
use crate::cli::VolumeCommand;
use crate::output::units::{format_time_ago, truncate_id};
use crate::output::{OutputFormat, Table};
use crate::resolve::resolve;

use super::instances::resolve_instance;
use super::{CliError, Context};

pub async fn handle(ctx: &mut Context, command: VolumeCommand) -> Result<(), CliError> {
    match command {
        VolumeCommand::List { quiet } => list(ctx, quiet).await,
        VolumeCommand::Create { name, size, id } => {
            let request = CreateVolumeRequest { name, size_gb: size, id };
            let doc = ctx.api.create_volume(&request).await?;
            if ctx.format != OutputFormat::Auto {
                return ctx.emit_document("volume create", &doc, false);
            }
            let volume: Volume = doc.parse()?;
            ctx.emit_lines("volume create", [volume.id])
        }
        VolumeCommand::Get { volume } => {
            let id = resolve_volume(ctx, &volume).await?;
            let doc = ctx.api.get_volume(&id).await?;
            ctx.emit_document("volume get", &doc, false)
        }
        VolumeCommand::Delete { volume } => {
            let id = resolve_volume(ctx, &volume).await?;
            ctx.api.delete_volume(&id).await?;
            ctx.notice(format!("Deleted volume {volume}"));
            Ok(())
        }
        VolumeCommand::Attach {
            volume,
            instance,
            mount_path,
            readonly,
        } => {
            let volume_id = resolve_volume(ctx, &volume).await?;
            let instance_id = resolve_instance(ctx, &instance).await?;
            let request = AttachVolumeRequest {
                mount_path,
                readonly: readonly.then_some(true),
            };
            ctx.api
                .attach_volume(&instance_id, &volume_id, &request)
                .await?;
            ctx.notice(format!(
                "Attached volume {volume} to instance {instance} at {}",
                request.mount_path
            ));
            Ok(())
        }
        VolumeCommand::Detach { volume, instance } => {
            let volume_id = resolve_volume(ctx, &volume).await?;
            let instance_id = resolve_instance(ctx, &instance).await?;
            ctx.api.detach_volume(&instance_id, &volume_id).await?;
            ctx.notice(format!("Detached volume {volume} from instance {instance}"));
            Ok(())
        }
    }
}

async fn list(ctx: &mut Context, quiet: bool) -> Result<(), CliError> {
    let doc = ctx.api.list_volumes().await?;
    if ctx.format != OutputFormat::Auto {
        return ctx.emit_document("volume list", &doc, true);
    }

    let volumes: Vec<Volume> = doc.parse()?;
    if quiet {
        return ctx.emit_lines("volume list", volumes.iter().map(|v| v.id.as_str()));
    }
    if volumes.is_empty() {
        ctx.notice("No volumes found.");
        return Ok(());
    }
    ctx.emit_table("volume list", &volume_table(&volumes))
}

async fn resolve_volume(ctx: &Context, identifier: &str) -> Result<String, CliError> {
    let volumes: Vec<Volume> = ctx.api.list_volumes().await?.parse()?;
    Ok(resolve(identifier, &volumes)?)
}

pub fn volume_table(volumes: &[Volume]) -> Table {
    let now = Utc::now();
    let mut table = Table::new(["ID", "NAME", "SIZE", "ATTACHMENTS", "CREATED"])
        .with_truncation_priority([0, 1, 4]);
    for volume in volumes {
        let attachments = match volume.attachments.len() {
            0 => "-".to_string(),
            n => n.to_string(),
        };
        table.add_row([
            truncate_id(&volume.id),
            volume.name.clone(),
            format!("{} GB", volume.size_gb),
            attachments,
            format_time_ago(volume.created_at, now),
        ]);
    }
    table
}
