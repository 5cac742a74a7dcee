//! Human-readable units for table cells.

use chrono::{DateTime, Utc};

const KIB: f64 = 1024.0;

/// Binary byte sizes with one decimal: `0 B`, `1.5 KB`, `2.0 GB`.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [(&str, f64); 4] = [
        ("TB", KIB * KIB * KIB * KIB),
        ("GB", KIB * KIB * KIB),
        ("MB", KIB * KIB),
        ("KB", KIB),
    ];
    let value = bytes as f64;
    for (unit, scale) in UNITS {
        if value >= scale {
            return format!("{:.1} {unit}", value / scale);
        }
    }
    format!("{bytes} B")
}

/// Megabytes as reported by GPU profiles: `512 MB`, `1.5 GB`.
pub fn format_mb(mb: i64) -> String {
    if mb >= 1024 {
        format!("{:.1} GB", mb as f64 / KIB)
    } else {
        format!("{mb} MB")
    }
}

/// Network bandwidth. The API reports bytes/sec; users read bits/sec.
pub fn format_bps(bytes_per_sec: i64) -> String {
    const KBPS: i64 = 1_000;
    const MBPS: i64 = KBPS * 1_000;
    const GBPS: i64 = MBPS * 1_000;

    let bps = bytes_per_sec.saturating_mul(8);
    if bps >= GBPS {
        format!("{:.1} Gbps", bps as f64 / GBPS as f64)
    } else if bps >= MBPS {
        format!("{:.0} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.0} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{bps} bps")
    }
}

/// `12 seconds ago`, `1 minute ago`, `3 days ago`; `N/A` when unknown.
pub fn format_time_ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "N/A".to_string();
    };
    let elapsed = now.signed_duration_since(at);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if elapsed.num_minutes() < 1 {
        format!("{} seconds ago", elapsed.num_seconds().max(0))
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else {
        plural(elapsed.num_days(), "day")
    }
}

/// Short form of an ID, 12 chars like container runtimes print.
pub fn truncate_id(id: &str) -> String {
    id.chars().take(12).collect()
}

/// Instance name from an image reference: last path segment with tag and
/// digest removed, plus `-` and `suffix`.
pub fn instance_name_from_image(image: &str, suffix: &str) -> String {
    let name = image.rsplit('/').next().unwrap_or(image);
    let name = name.split(':').next().unwrap_or(name);
    let name = name.split('@').next().unwrap_or(name);
    format!("{name}-{suffix}")
}

/// Four random lowercase hex chars.
pub fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_string()
}
