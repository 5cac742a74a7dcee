use std::io::Write;

use chrono::Utc;

use crate::api::{ApiError, Image};
use crate::cli::ImageCommand;
use crate::output::units::{format_bytes, format_time_ago};
use crate::output::{OutputFormat, Table};
use crate::poll::{await_ready, clamp_interval};

use super::{CliError, Context};

pub async fn handle(ctx: &mut Context, command: ImageCommand) -> Result<(), CliError> {
    match command {
        ImageCommand::List { quiet } => list(ctx, quiet).await,
        ImageCommand::Get { name } => {
            let doc = ctx.api.get_image(&name).await?;
            ctx.emit_document("image get", &doc, false)
        }
        ImageCommand::Create { name, wait } => {
            let doc = ctx.api.create_image(&name).await?;
            if !wait {
                return ctx.emit_document("image create", &doc, false);
            }
            let image = wait_for_image(ctx, doc.parse()?).await?;
            ctx.notice(format!("Image {} ready", image.name));
            Ok(())
        }
        ImageCommand::Delete { name } => {
            ctx.api.delete_image(&name).await?;
            ctx.notice(format!("Deleted image {name}"));
            Ok(())
        }
    }
}

async fn list(ctx: &mut Context, quiet: bool) -> Result<(), CliError> {
    let doc = ctx.api.list_images().await?;
    if ctx.format != OutputFormat::Auto {
        return ctx.emit_document("image list", &doc, true);
    }

    let images: Vec<Image> = doc.parse()?;
    if quiet {
        return ctx.emit_lines("image list", images.iter().map(|i| i.name.as_str()));
    }
    if images.is_empty() {
        ctx.notice("No images found.");
        return Ok(());
    }
    ctx.emit_table("image list", &image_table(&images))
}

/// NAME, STATUS, DIGEST, SIZE, CREATED; NAME shrinks first.
pub fn image_table(images: &[Image]) -> Table {
    let now = Utc::now();
    let mut table = Table::new(["NAME", "STATUS", "DIGEST", "SIZE", "CREATED"])
        .with_truncation_priority([0, 2, 4]);
    for image in images {
        let digest: String = image
            .digest
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(19)
            .collect();
        let size = match image.size_bytes {
            Some(bytes) if bytes > 0 => format_bytes(bytes),
            _ => "-".to_string(),
        };
        table.add_row([
            image.name.clone(),
            image.status.as_str().to_string(),
            digest,
            size,
            format_time_ago(image.created_at, now),
        ]);
    }
    table
}

/// Poll an image until it is ready, printing progress notices.
pub(crate) async fn wait_for_image(ctx: &mut Context, image: Image) -> Result<Image, CliError> {
    let api = &ctx.api;
    let notices = &mut ctx.notices;
    let name = image.name.clone();
    let name = name.as_str();

    let ready = await_ready(
        image,
        clamp_interval(ctx.config.poll_interval()),
        &ctx.cancel,
        move || async move {
            let doc = api.get_image(name).await?;
            Ok::<Image, ApiError>(doc.parse()?)
        },
        |current: &Image| {
            if let Some(line) = current.progress_notice() {
                let _ = writeln!(notices, "{line}");
            }
        },
    )
    .await?;
    Ok(ready)
}
