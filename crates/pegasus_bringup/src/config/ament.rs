//! Package share directory lookup through the ament index

use std::path::{Path, PathBuf};

/// Installed package prefixes, searched in order
#[derive(Debug, Clone, Default)]
pub struct AmentIndex {
    prefixes: Vec<PathBuf>,
}

impl AmentIndex {
    /// Build the index from `AMENT_PREFIX_PATH` (empty when unset)
    pub fn from_env() -> Self {
        match std::env::var("AMENT_PREFIX_PATH") {
            Ok(path) => Self::from_path(&path),
            Err(_) => {
                log::debug!("AMENT_PREFIX_PATH is not set, package lookups will fail");
                Self::default()
            }
        }
    }

    /// Build the index from a colon-separated prefix path string
    pub fn from_path(path: &str) -> Self {
        let prefixes = path
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        Self { prefixes }
    }

    /// Append a prefix (lowest priority)
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// Share directory of an installed package, `<prefix>/share/<package>`
    pub fn find_package_share(&self, package: &str) -> Option<PathBuf> {
        self.prefixes
            .iter()
            .find(|prefix| has_package(prefix, package))
            .map(|prefix| prefix.join("share").join(package))
    }
}

fn has_package(prefix: &Path, package: &str) -> bool {
    let marker = prefix
        .join("share/ament_index/resource_index/packages")
        .join(package);
    marker.is_file() || prefix.join("share").join(package).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_path_skips_empty_entries() {
        let index = AmentIndex::from_path("/opt/ros/humble::/ws/install/pkg:");
        assert_eq!(index.prefixes().len(), 2);
    }

    #[test]
    fn test_find_by_share_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("share/autopilot/launch")).unwrap();

        let index = AmentIndex::default().with_prefix(dir.path());
        assert_eq!(
            index.find_package_share("autopilot"),
            Some(dir.path().join("share/autopilot"))
        );
        assert_eq!(index.find_package_share("mocap_interface"), None);
    }

    #[test]
    fn test_find_by_resource_marker() {
        let dir = tempfile::tempdir().unwrap();
        let markers = dir.path().join("share/ament_index/resource_index/packages");
        fs::create_dir_all(&markers).unwrap();
        fs::write(markers.join("mavlink_interface"), "").unwrap();

        let index = AmentIndex::default().with_prefix(dir.path());
        assert_eq!(
            index.find_package_share("mavlink_interface"),
            Some(dir.path().join("share/mavlink_interface"))
        );
    }

    #[test]
    fn test_first_prefix_wins() {
        let overlay = tempfile::tempdir().unwrap();
        let underlay = tempfile::tempdir().unwrap();
        fs::create_dir_all(overlay.path().join("share/autopilot")).unwrap();
        fs::create_dir_all(underlay.path().join("share/autopilot")).unwrap();

        let index = AmentIndex::default()
            .with_prefix(overlay.path())
            .with_prefix(underlay.path());
        assert_eq!(
            index.find_package_share("autopilot"),
            Some(overlay.path().join("share/autopilot"))
        );
    }
}
