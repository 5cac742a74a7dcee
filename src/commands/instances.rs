//! `ps`, `logs` and `run`.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::Utc;
use futures::StreamExt;
use thiserror::Error;

use crate::api::{
    ApiError, CreateInstanceRequest, GpuRequest, Image, Instance, NetworkSettings, VolumeMount,
};
use crate::cli::RunArgs;
use crate::output::units::{format_time_ago, instance_name_from_image, random_suffix, truncate_id};
use crate::output::{OutputFormat, Table};
use crate::resolve::resolve;

use super::images::wait_for_image;
use super::{CliError, Context};

pub async fn ps(ctx: &mut Context, all: bool, quiet: bool) -> Result<(), CliError> {
    let doc = ctx.api.list_instances().await?;
    if ctx.format != OutputFormat::Auto && !quiet {
        return ctx.emit_document("instances list", &doc, true);
    }

    let instances: Vec<Instance> = doc.parse()?;
    let shown: Vec<&Instance> = instances.iter().filter(|i| all || i.is_running()).collect();

    if quiet {
        return ctx.emit_lines("instances list", shown.iter().map(|i| i.id.as_str()));
    }
    if shown.is_empty() {
        if !all {
            ctx.notice("No running instances. Use -a to show all.");
        }
        return Ok(());
    }
    ctx.emit_table("instances list", &instance_table(&shown))
}

/// INSTANCE ID, NAME, IMAGE, STATE, GPU, HV, CREATED. IMAGE gives up width
/// first, then GPU, CREATED and NAME.
pub fn instance_table(instances: &[&Instance]) -> Table {
    let now = Utc::now();
    let mut table = Table::new(["INSTANCE ID", "NAME", "IMAGE", "STATE", "GPU", "HV", "CREATED"])
        .with_truncation_priority([2, 4, 6, 1]);
    for instance in instances {
        table.add_row([
            truncate_id(&instance.id),
            instance.name.clone(),
            instance.image.clone(),
            instance.state.clone(),
            instance.gpu_label(),
            instance.hypervisor_label(),
            format_time_ago(instance.created_at, now),
        ]);
    }
    table
}

/// Full ID of the instance `identifier` names.
pub(crate) async fn resolve_instance(ctx: &Context, identifier: &str) -> Result<String, CliError> {
    let instances: Vec<Instance> = ctx.api.list_instances().await?.parse()?;
    Ok(resolve(identifier, &instances)?)
}

pub async fn logs(
    ctx: &mut Context,
    identifier: &str,
    tail: u32,
    follow: bool,
) -> Result<(), CliError> {
    let id = resolve_instance(ctx, identifier).await?;

    let mut body = match ctx.api.instance_logs(&id, tail, follow).await {
        Ok(body) => body,
        Err(ApiError::Status { status, body }) => {
            return Err(CliError::RemoteFailure(format!(
                "failed to fetch logs (HTTP {status}): {body}"
            )))
        }
        Err(err) => return Err(err.into()),
    };

    let mut out = ctx.direct.open(&format!("logs {id}"))?;
    let streamed = loop {
        let chunk = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break Err(CliError::Cancelled),
            chunk = body.next() => chunk,
        };
        match chunk {
            None => break Ok(()),
            Some(Ok(bytes)) => {
                if let Err(err) = out.write_all(&bytes).and_then(|()| out.flush()) {
                    break Err(err.into());
                }
            }
            Some(Err(err)) => break Err(ApiError::Transport(err).into()),
        }
    };
    out.finish()?;
    streamed
}

pub async fn run(ctx: &mut Context, args: RunArgs) -> Result<(), CliError> {
    // Validate everything local before touching the server.
    let hypervisor = args.hypervisor.as_deref().map(parse_hypervisor).transpose()?;
    let volumes = args
        .volumes
        .iter()
        .map(|spec| {
            parse_volume_spec(spec)
                .map_err(|e| CliError::Usage(format!("invalid volume spec {spec:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (env, malformed) = parse_key_values(&args.env);
    for entry in malformed {
        ctx.notice(format!("Warning: ignoring malformed env var: {entry}"));
    }
    let (metadata, malformed) = parse_key_values(&args.metadata);
    for entry in malformed {
        ctx.notice(format!("Warning: ignoring malformed metadata: {entry}"));
    }

    let image = match ctx.api.get_image(&args.image).await {
        Ok(doc) => doc.parse::<Image>()?,
        Err(err) if err.is_not_found() => {
            ctx.notice(format!("Image not found locally. Pulling {}...", args.image));
            ctx.api.create_image(&args.image).await?.parse::<Image>()?
        }
        Err(err) => return Err(err.into()),
    };
    wait_for_image(ctx, image).await?;

    let name = args
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| instance_name_from_image(&args.image, &random_suffix()));

    let request = CreateInstanceRequest {
        name: name.clone(),
        image: args.image,
        vcpus: Some(args.cpus),
        size: Some(args.memory),
        overlay_size: Some(args.overlay_size),
        hotplug_size: Some(args.hotplug_size),
        env,
        network: network_settings(!args.no_network, args.bandwidth_down, args.bandwidth_up),
        hypervisor,
        volumes,
        gpu: args.gpu_profile.map(|profile| GpuRequest { profile }),
        devices: args.devices,
        disk_io_bps: args.disk_io,
        skip_guest_agent: args.skip_guest_agent.then_some(true),
        skip_kernel_headers: args.skip_kernel_headers.then_some(true),
        entrypoint: args.entrypoint,
        cmd: args.cmd,
        metadata,
    };

    ctx.notice(format!("Creating instance {name}..."));
    let created: Instance = ctx.api.create_instance(&request).await?.parse()?;
    ctx.emit_lines("run", [created.id])
}

/// Network block for a new instance; omitted when networking is on with no
/// limits so the server defaults apply.
fn network_settings(
    enabled: bool,
    bandwidth_down: Option<String>,
    bandwidth_up: Option<String>,
) -> Option<NetworkSettings> {
    if enabled && bandwidth_down.is_none() && bandwidth_up.is_none() {
        return None;
    }
    Some(NetworkSettings {
        enabled,
        bandwidth_download: bandwidth_down,
        bandwidth_upload: bandwidth_up,
    })
}

/// Split `KEY=VALUE` entries; entries without `=` are returned separately.
fn parse_key_values(entries: &[String]) -> (BTreeMap<String, String>, Vec<&str>) {
    let mut env = BTreeMap::new();
    let mut malformed = Vec::new();
    for entry in entries {
        match entry.split_once('=') {
            Some((key, value)) => {
                env.insert(key.to_string(), value.to_string());
            }
            None => malformed.push(entry.as_str()),
        }
    }
    (env, malformed)
}

fn parse_hypervisor(value: &str) -> Result<String, CliError> {
    match value {
        "cloud-hypervisor" | "ch" => Ok("cloud-hypervisor".to_string()),
        "qemu" | "vz" => Ok(value.to_string()),
        other => Err(CliError::Usage(format!(
            "invalid hypervisor: {other} (must be 'cloud-hypervisor', 'qemu', or 'vz')"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeSpecError {
    #[error("expected format volume-id:/mount/path[:ro[:overlay=SIZE]]")]
    Format,
    #[error("volume ID cannot be empty")]
    EmptyVolumeId,
    #[error("mount path cannot be empty")]
    EmptyMountPath,
    #[error("unknown option {0:?}")]
    UnknownOption(String),
}

/// `volume-id:/mount/path[:ro[:overlay=SIZE]]`
pub fn parse_volume_spec(spec: &str) -> Result<VolumeMount, VolumeSpecError> {
    let (volume_id, rest) = spec.split_once(':').ok_or(VolumeSpecError::Format)?;
    if volume_id.is_empty() {
        return Err(VolumeSpecError::EmptyVolumeId);
    }

    let mut segments = rest.split(':');
    let mount_path = segments.next().unwrap_or_default();
    if mount_path.is_empty() {
        return Err(VolumeSpecError::EmptyMountPath);
    }

    let mut mount = VolumeMount {
        volume_id: volume_id.to_string(),
        mount_path: mount_path.to_string(),
        ..VolumeMount::default()
    };
    for option in segments {
        if option == "ro" {
            mount.readonly = Some(true);
        } else if let Some(size) = option.strip_prefix("overlay=") {
            mount.overlay = Some(true);
            mount.overlay_size = Some(size.to_string());
        } else {
            return Err(VolumeSpecError::UnknownOption(option.to_string()));
        }
    }
    Ok(mount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_spec_variants() {
        assert_eq!(
            parse_volume_spec("my-vol:/data").unwrap(),
            VolumeMount {
                volume_id: "my-vol".into(),
                mount_path: "/data".into(),
                ..VolumeMount::default()
            }
        );

        let mount = parse_volume_spec("my-vol:/data:ro:overlay=10GB").unwrap();
        assert_eq!(mount.readonly, Some(true));
        assert_eq!(mount.overlay, Some(true));
        assert_eq!(mount.overlay_size.as_deref(), Some("10GB"));
    }

    #[test]
    fn volume_spec_errors() {
        assert_eq!(parse_volume_spec("my-vol"), Err(VolumeSpecError::Format));
        assert_eq!(parse_volume_spec(":/data"), Err(VolumeSpecError::EmptyVolumeId));
        assert_eq!(parse_volume_spec("my-vol:"), Err(VolumeSpecError::EmptyMountPath));
        let err = parse_volume_spec("my-vol:/data:rw").unwrap_err();
        assert_eq!(err.to_string(), "unknown option \"rw\"");
        assert_eq!(
            VolumeSpecError::Format.to_string(),
            "expected format volume-id:/mount/path[:ro[:overlay=SIZE]]"
        );
    }

    #[test]
    fn key_values_split_on_first_equals() {
        let entries = vec!["A=1".to_string(), "B=x=y".to_string(), "BROKEN".to_string()];
        let (env, malformed) = parse_key_values(&entries);
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("B").map(String::as_str), Some("x=y"));
        assert_eq!(malformed, vec!["BROKEN"]);
    }

    #[test]
    fn network_block_only_when_needed() {
        assert_eq!(network_settings(true, None, None), None);
        assert_eq!(
            network_settings(false, None, None),
            Some(NetworkSettings {
                enabled: false,
                bandwidth_download: None,
                bandwidth_upload: None,
            })
        );
        let limited = network_settings(true, Some("1Gbps".into()), None).unwrap();
        assert!(limited.enabled);
        assert_eq!(limited.bandwidth_download.as_deref(), Some("1Gbps"));
    }

    #[test]
    fn hypervisor_aliases() {
        assert_eq!(parse_hypervisor("ch").unwrap(), "cloud-hypervisor");
        assert_eq!(parse_hypervisor("vz").unwrap(), "vz");
        assert!(matches!(parse_hypervisor("kvm"), Err(CliError::Usage(_))));
    }

    #[test]
    fn table_rows_use_short_ids() {
        let instance = Instance {
            id: "0123456789abcdef".into(),
            name: "web".into(),
            image: "nginx".into(),
            state: "Running".into(),
            ..Instance::default()
        };
        let table = instance_table(&[&instance]);
        assert_eq!(
            table.rows()[0],
            vec!["0123456789ab", "web", "nginx", "Running", "-", "ch", "N/A"]
        );
    }
}
