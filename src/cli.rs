//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hypeman", about = "Manage Hypeman builds, images and instances")]
pub struct Cli {
    /// API endpoint (overrides HYPEMAN_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Output format: auto, explore, json, jsonl, pretty, raw, yaml
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Dot path selecting part of the response (e.g. `cpu.capacity`)
    #[arg(long, global = true)]
    pub transform: Option<String>,

    /// Log API requests and internal diagnostics to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List instances
    Ps {
        /// Show all instances, not just running ones
        #[arg(short, long)]
        all: bool,
        /// Only print instance IDs
        #[arg(short, long)]
        quiet: bool,
    },

    /// Fetch the console log of an instance
    Logs {
        /// Instance ID, ID prefix or name
        instance: String,
        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
        /// Number of lines to show from the end
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },

    /// Create and start an instance from an image
    Run(RunArgs),

    /// Manage builds
    #[command(subcommand)]
    Build(BuildCommand),

    /// Manage images
    #[command(subcommand)]
    Image(ImageCommand),

    /// Manage volumes
    #[command(subcommand)]
    Volume(VolumeCommand),

    /// Manage PCI passthrough devices
    #[command(subcommand)]
    Device(DeviceCommand),

    /// Show server resource capacity and allocation status
    Resources,

    /// Print the CLI version
    Version,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Image reference (e.g. docker.io/library/nginx:latest)
    pub image: String,

    /// Instance name (generated from the image when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Environment variable, KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Base memory size
    #[arg(long, default_value = "1GB")]
    pub memory: String,

    /// Number of virtual CPUs
    #[arg(long, default_value_t = 2)]
    pub cpus: u32,

    #[arg(long, default_value = "10GB")]
    pub overlay_size: String,

    #[arg(long, default_value = "3GB")]
    pub hotplug_size: String,

    /// Start without network access
    #[arg(long)]
    pub no_network: bool,

    /// cloud-hypervisor (ch), qemu or vz
    #[arg(long)]
    pub hypervisor: Option<String>,

    /// Attach a volume: volume-id:/mount/path[:ro[:overlay=SIZE]] (repeatable)
    #[arg(short = 'v', long = "volume")]
    pub volumes: Vec<String>,

    /// vGPU profile name (e.g. L40S-1Q)
    #[arg(long)]
    pub gpu_profile: Option<String>,

    /// Device ID or name for PCI/GPU passthrough (repeatable)
    #[arg(long = "device")]
    pub devices: Vec<String>,

    /// Disk I/O rate limit (e.g. 100MB/s)
    #[arg(long)]
    pub disk_io: Option<String>,

    /// Download bandwidth limit (e.g. 1Gbps, 125MB/s)
    #[arg(long)]
    pub bandwidth_down: Option<String>,

    /// Upload bandwidth limit (e.g. 1Gbps, 125MB/s)
    #[arg(long)]
    pub bandwidth_up: Option<String>,

    /// Skip guest-agent installation (exec and stat APIs will not work)
    #[arg(long)]
    pub skip_guest_agent: bool,

    /// Skip kernel headers installation for faster boot (DKMS will not work)
    #[arg(long)]
    pub skip_kernel_headers: bool,

    /// Override the image entrypoint (repeat for each argument)
    #[arg(long, allow_hyphen_values = true)]
    pub entrypoint: Vec<String>,

    /// Override the image CMD (repeat for each argument)
    #[arg(long, allow_hyphen_values = true)]
    pub cmd: Vec<String>,

    /// Metadata, KEY=VALUE (repeatable)
    #[arg(short = 'l', long)]
    pub metadata: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum BuildCommand {
    /// List builds
    List,

    /// Show one build
    Get { id: String },

    /// Upload a source tarball and start a build
    Create(BuildCreateArgs),

    /// Stream a build's logs and status changes
    Events {
        id: String,
        /// Keep the stream open until the build finishes
        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Debug, Args)]
pub struct BuildCreateArgs {
    /// Source tarball (.tar.gz)
    #[arg(long)]
    pub source: PathBuf,

    /// Dockerfile to use instead of the one inside the source
    #[arg(long)]
    pub dockerfile: Option<PathBuf>,

    #[arg(long)]
    pub base_image_digest: Option<String>,

    #[arg(long)]
    pub cache_scope: Option<String>,

    /// Shared cache to import from (e.g. node, python); admin builds also export to it
    #[arg(long)]
    pub global_cache_key: Option<String>,

    /// Allow the build to populate the global cache (operator only)
    #[arg(long)]
    pub is_admin_build: bool,

    /// JSON array of secret references, e.g. '[{"id": "npm_token"}]'
    #[arg(long)]
    pub secrets: Option<String>,

    /// Build timeout (server default 600)
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Follow the build's events until it finishes
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// List images
    List {
        /// Only print image names
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show one image
    Get { name: String },

    /// Pull an image
    Create {
        name: String,
        /// Wait until the image is ready
        #[arg(long)]
        wait: bool,
    },

    /// Delete an image
    #[command(alias = "rm")]
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
pub enum VolumeCommand {
    /// List volumes
    List {
        /// Only print volume IDs
        #[arg(short, long)]
        quiet: bool,
    },

    /// Create a volume
    Create {
        #[arg(long)]
        name: String,
        /// Size in gigabytes
        #[arg(long)]
        size: u32,
        /// Explicit volume ID
        #[arg(long)]
        id: Option<String>,
    },

    /// Show one volume
    Get {
        /// Volume ID, ID prefix or name
        volume: String,
    },

    /// Delete a volume
    #[command(alias = "rm")]
    Delete { volume: String },

    /// Attach a volume to an instance
    Attach {
        volume: String,
        /// Instance ID, ID prefix or name
        #[arg(short, long)]
        instance: String,
        /// Mount path inside the guest
        #[arg(long)]
        mount_path: String,
        #[arg(long)]
        readonly: bool,
    },

    /// Detach a volume from an instance
    Detach {
        volume: String,
        #[arg(short, long)]
        instance: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// List passthrough-capable devices on the host
    Available,

    /// Register a device for passthrough
    Register {
        /// PCI address, e.g. 0000:a2:00.0
        #[arg(value_name = "PCI_ADDRESS")]
        address: Option<String>,
        #[arg(long = "pci-address", conflicts_with = "address")]
        pci_address: Option<String>,
        /// Device name; the server picks one when unset
        #[arg(long)]
        name: Option<String>,
    },

    /// List registered devices
    List,

    /// Show one registered device
    Get {
        /// Device ID, ID prefix or name
        device: String,
    },

    /// Unregister a device
    #[command(alias = "rm", alias = "unregister")]
    Delete { device: String },
}
