use std::fmt;

/// CLI version, resolved once at startup and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    version: String,
}

impl VersionInfo {
    /// Version baked in at build time:
    /// `HYPEMAN_VERSION`, else `HYPEMAN_GIT_REVISION` (7 chars, `-dirty` when
    /// `HYPEMAN_GIT_DIRTY=true`), else the package version.
    pub fn detect() -> Self {
        Self::resolve(
            option_env!("HYPEMAN_VERSION"),
            option_env!("HYPEMAN_GIT_REVISION"),
            option_env!("HYPEMAN_GIT_DIRTY"),
            env!("CARGO_PKG_VERSION"),
        )
    }

    pub fn resolve(
        release: Option<&str>,
        revision: Option<&str>,
        dirty: Option<&str>,
        package: &str,
    ) -> Self {
        let version = if let Some(release) = release.filter(|v| !v.is_empty()) {
            release.to_string()
        } else if let Some(revision) = revision.filter(|r| !r.is_empty()) {
            let short: String = revision.chars().take(7).collect();
            if dirty == Some("true") {
                format!("{short}-dirty")
            } else {
                short
            }
        } else {
            package.to_string()
        };
        Self { version }
    }

    pub fn as_str(&self) -> &str {
        &self.version
    }

    pub fn user_agent(&self) -> String {
        format!("Hypeman/CLI {}", self.version)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}
