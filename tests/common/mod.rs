// Shared test helpers: a scripted stand-in for the vnstat binary

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use vnstat_exporter::vnstat_repo::VnstatRepo;

pub const IFLIST: &str = "Available interfaces: lo docker0 eth0 wlan0";

pub const JSON_TOTALS: &str =
    r#"{"vnstatversion":"2.9","jsonversion":"2","interfaces":[{"name":"eth0","traffic":{"total":{"rx":1048576,"tx":2097152}}}]}"#;

/// Executable shell script answering `--iflist` and traffic queries with canned output.
/// Every invocation's arguments are appended to `calls.log` next to the script.
pub struct FakeVnstat {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl FakeVnstat {
    /// Exit 0 with `iflist` for `--iflist` and `traffic` for anything else.
    pub fn new(iflist: &str, traffic: &str) -> Self {
        Self::with_branches(
            &format!("cat <<'EOF_VNSTAT'\n{}\nEOF_VNSTAT\nexit 0", iflist),
            &format!("cat <<'EOF_VNSTAT'\n{}\nEOF_VNSTAT\nexit 0", traffic),
        )
    }

    /// Raw shell bodies for the `--iflist` branch and the traffic branch.
    pub fn with_branches(iflist_body: &str, traffic_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vnstat");
        let log = dir.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\necho \"$*\" >> '{}'\nif [ \"$1\" = \"--iflist\" ]; then\n{}\nfi\n{}\n",
            log.display(),
            iflist_body,
            traffic_body
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, path }
    }

    pub fn binary(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn repo(&self) -> VnstatRepo {
        VnstatRepo::new(self.binary(), Duration::from_secs(5), Duration::from_secs(5))
    }

    /// Argument lines of every invocation so far.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
