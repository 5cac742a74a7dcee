//! Typed views of API payloads. Unknown fields are ignored; everything not
//! needed to render a table or drive a poll stays in the raw document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::poll::{Phase, Pollable};
use crate::resolve::Resolvable;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub gpu: Option<InstanceGpu>,
    #[serde(default)]
    pub hypervisor: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == "Running"
    }

    /// GPU column: profile name, `vgpu` for an unnamed mediated device, `-`.
    pub fn gpu_label(&self) -> String {
        let Some(gpu) = &self.gpu else {
            return "-".to_string();
        };
        match (&gpu.profile, &gpu.mdev_uuid) {
            (Some(profile), _) if !profile.is_empty() => profile.clone(),
            (_, Some(mdev)) if !mdev.is_empty() => "vgpu".to_string(),
            _ => "-".to_string(),
        }
    }

    /// Short hypervisor name; cloud-hypervisor is the server default.
    pub fn hypervisor_label(&self) -> String {
        match self.hypervisor.as_deref() {
            None | Some("") | Some("cloud-hypervisor") => "ch".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

impl Resolvable for Instance {
    const KIND: &'static str = "instance";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceGpu {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub mdev_uuid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Pulling,
    Converting,
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Pulling => "pulling",
            ImageStatus::Converting => "converting",
            ImageStatus::Ready => "ready",
            ImageStatus::Failed => "failed",
            ImageStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub name: String,
    pub status: ImageStatus,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Image {
    /// Progress line shown while waiting for the image.
    pub fn progress_notice(&self) -> Option<String> {
        match self.status {
            ImageStatus::Pending => Some(match self.queue_position {
                Some(position) if position > 0 => format!("Queued (position {position})..."),
                _ => "Queued...".to_string(),
            }),
            ImageStatus::Pulling => Some("Pulling image...".to_string()),
            ImageStatus::Converting => Some("Converting to disk image...".to_string()),
            ImageStatus::Ready => Some("Image ready.".to_string()),
            ImageStatus::Failed | ImageStatus::Unknown => None,
        }
    }
}

impl Pollable for Image {
    fn phase(&self) -> Phase {
        match self.status {
            ImageStatus::Pending => Phase::Pending,
            ImageStatus::Ready => Phase::Ready,
            ImageStatus::Failed => Phase::Failed,
            other => Phase::InProgress(other.as_str().to_string()),
        }
    }

    fn failure_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size_gb: i64,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resolvable for Volume {
    const KIND: &'static str = "volume";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A PCI device registered for passthrough.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub pci_address: String,
    #[serde(default)]
    pub bound_to_vfio: bool,
    #[serde(default)]
    pub attached_to: Option<String>,
}

impl Resolvable for Device {
    const KIND: &'static str = "device";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A passthrough-capable device found on the host, registered or not.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableDevice {
    pub pci_address: String,
    #[serde(default)]
    pub vendor_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub iommu_group: i64,
    #[serde(default)]
    pub current_driver: Option<String>,
}

impl AvailableDevice {
    /// Vendor name, or the numeric vendor ID when the name is unknown.
    pub fn vendor_label(&self) -> &str {
        self.vendor_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.vendor_id)
    }

    pub fn device_label(&self) -> &str {
        self.device_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.device_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachVolumeRequest {
    pub mount_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterDeviceRequest {
    pub pci_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The fields of a build the CLI acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Upload for `POST /builds`.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub source: Vec<u8>,
    pub source_file_name: String,
    pub dockerfile: Option<String>,
    pub base_image_digest: Option<String>,
    pub cache_scope: Option<String>,
    pub global_cache_key: Option<String>,
    pub is_admin_build: bool,
    /// JSON array of secret references, sent as-is.
    pub secrets: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateImageRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotplug_size: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuRequest>,
    /// Registered device IDs or names for passthrough.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_io_bps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_guest_agent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_kernel_headers: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_download: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_upload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuRequest {
    pub profile: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    pub volume_id: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_size: Option<String>,
}
