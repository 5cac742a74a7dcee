use std::path::Path;

use serde::Deserialize;

use crate::api::{Build, BuildRequest};
use crate::cli::{BuildCommand, BuildCreateArgs};
use crate::events::{BuildEventConsumer, ConsumerOptions, Disposition, EventRendering};
use crate::output::OutputFormat;

use super::{CliError, Context};

pub async fn handle(ctx: &mut Context, command: BuildCommand) -> Result<(), CliError> {
    match command {
        BuildCommand::List => {
            let doc = ctx.api.list_builds().await?;
            ctx.emit_document("builds list", &doc, true)
        }
        BuildCommand::Get { id } => {
            let doc = ctx.api.get_build(&id).await?;
            ctx.emit_document("builds get", &doc, false)
        }
        BuildCommand::Create(args) => create(ctx, args).await,
        BuildCommand::Events { id, follow } => follow_events(ctx, &id, follow).await,
    }
}

async fn create(ctx: &mut Context, args: BuildCreateArgs) -> Result<(), CliError> {
    let request = BuildRequest {
        source: read_file(&args.source, "source")?,
        source_file_name: args
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source.tar.gz".to_string()),
        dockerfile: match &args.dockerfile {
            Some(path) => {
                Some(String::from_utf8_lossy(&read_file(path, "dockerfile")?).into_owned())
            }
            None => None,
        },
        base_image_digest: args.base_image_digest,
        cache_scope: args.cache_scope,
        global_cache_key: args.global_cache_key,
        is_admin_build: args.is_admin_build,
        secrets: args.secrets.as_deref().map(parse_secrets).transpose()?,
        timeout_seconds: args.timeout_seconds,
    };

    let doc = ctx.api.create_build(request).await?;
    if !args.wait {
        return ctx.emit_document("builds create", &doc, false);
    }

    let build: Build = doc.parse()?;
    ctx.notice(format!("Build {} started", build.id));
    follow_events(ctx, &build.id, true).await
}

/// `--secrets` takes a JSON array of `{"id": ...}` references. It is checked
/// here so a typo fails before the upload starts.
fn parse_secrets(raw: &str) -> Result<String, CliError> {
    let secrets: Vec<SecretRef> = serde_json::from_str(raw)
        .map_err(|e| CliError::Usage(format!("invalid --secrets: {e}")))?;
    if let Some(position) = secrets.iter().position(|s| s.id.trim().is_empty()) {
        return Err(CliError::Usage(format!(
            "invalid --secrets: entry {position} has an empty id"
        )));
    }
    Ok(raw.trim().to_string())
}

#[derive(Deserialize)]
struct SecretRef {
    id: String,
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>, CliError> {
    std::fs::read(path)
        .map_err(|e| CliError::Usage(format!("failed to read {what} {}: {e}", path.display())))
}

/// Stream a build's events to stdout and turn the outcome into a result.
///
/// `auto` prints log content as-is with status notices on stderr; any other
/// format prints one JSON object per event.
pub async fn follow_events(ctx: &mut Context, id: &str, follow: bool) -> Result<(), CliError> {
    let events = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(CliError::Cancelled),
        opened = ctx.api.build_events(id, follow, Some(ctx.config.idle_timeout())) => opened?,
    };

    let options = ConsumerOptions {
        rendering: match ctx.format {
            OutputFormat::Auto => EventRendering::Text,
            _ => EventRendering::JsonLines,
        },
        failed_drain: ctx.config.failed_drain(),
    };
    let output = ctx.direct.open(&format!("builds events {id}"))?;
    let cancel = ctx.cancel.clone();

    let mut consumer = BuildEventConsumer::new(output, &mut ctx.notices, options);
    let disposition = consumer.consume(events, &cancel).await;
    consumer.into_output().finish()?;

    tracing::debug!(build = %id, ?disposition, "build event stream finished");
    match disposition {
        Disposition::Success => Ok(()),
        Disposition::Failed(message) => Err(CliError::RemoteFailure(failure_text(&message))),
        // A cancelled status from the server is a remote outcome; our own
        // interrupt trips the token.
        Disposition::Cancelled if cancel.is_cancelled() => Err(CliError::Cancelled),
        Disposition::Cancelled => Err(CliError::RemoteFailure("build was cancelled".to_string())),
        Disposition::StreamError(err) => Err(CliError::Stream(err)),
        // Without `follow` the server replays what it has and hangs up, so an
        // unfinished build is a normal snapshot.
        Disposition::UnexpectedEnd(_) if !follow => Ok(()),
        Disposition::UnexpectedEnd(last) => Err(CliError::UnexpectedTermination { last }),
    }
}

fn failure_text(message: &str) -> String {
    if message == crate::events::consumer::DEFAULT_FAILURE_MESSAGE {
        message.to_string()
    } else {
        format!("build failed: {message}")
    }
}
