use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PLIST_LABEL: &str = "com.ikonic-menubar.app";

fn plist_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("Library/LaunchAgents")
        .join(format!("{}.plist", PLIST_LABEL))
}

pub fn is_enabled() -> bool {
    plist_path().exists()
}

pub fn set_enabled(enabled: bool) {
    let exe = std::env::current_exe()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let path = plist_path();
    match write_agent(&path, enabled, &exe) {
        Ok(()) => info!(enabled, path = %path.display(), "updated login item"),
        Err(err) => warn!(enabled, "failed to update login item: {err}"),
    }
}

fn write_agent(path: &Path, enabled: bool, exe: &str) -> std::io::Result<()> {
    if enabled {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, plist_contents(PLIST_LABEL, exe))
    } else {
        match fs::remove_file(path) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn plist_contents(label: &str, exe: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>"#,
        xml_escape(label),
        xml_escape(exe)
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabling_writes_run_at_load_plist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LaunchAgents").join("agent.plist");

        write_agent(&path, true, "/Applications/Ikonic & Co.app/Contents/MacOS/ikonic").unwrap();
        let plist = fs::read_to_string(&path).unwrap();
        assert!(plist.contains("<string>com.ikonic-menubar.app</string>"));
        assert!(plist.contains("Ikonic &amp; Co.app"));
        assert!(plist.contains("<key>RunAtLoad</key>"));

        write_agent(&path, false, "").unwrap();
        assert!(!path.exists());
        // Disabling twice is harmless.
        write_agent(&path, false, "").unwrap();
    }
}
