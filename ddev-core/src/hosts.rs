use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The system hosts file. Entries are only ever appended.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl Default for HostsFile {
    fn default() -> Self {
        Self::new()
    }
}

impl HostsFile {
    pub fn new() -> Self {
        let path = if cfg!(windows) {
            PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
        } else {
            PathBuf::from("/etc/hosts")
        };
        Self { path }
    }

    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path).await
    }

    pub async fn write(&self, content: &str) -> io::Result<()> {
        fs::write(&self.path, content).await
    }

    /// True if some line maps `ip` to `hostname`. Comments are ignored.
    pub fn has_entry(content: &str, ip: &str, hostname: &str) -> bool {
        content.lines().any(|line| {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            fields.next() == Some(ip) && fields.any(|name| name == hostname)
        })
    }

    /// The hosts line for `hostname`, as a user would add it by hand.
    pub fn entry_line(ip: &str, hostname: &str) -> String {
        format!("{ip}\t{hostname}")
    }

    pub fn with_entry(content: &str, ip: &str, hostname: &str) -> String {
        let mut output = String::from(content);
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&Self::entry_line(ip, hostname));
        output.push('\n');
        output
    }

    /// Appends the entry unless it is already present. Returns whether the file changed.
    pub async fn add_entry(&self, ip: &str, hostname: &str) -> io::Result<bool> {
        let content = self.read().await?;
        if Self::has_entry(&content, ip, hostname) {
            return Ok(false);
        }
        self.write(&Self::with_entry(&content, ip, hostname)).await?;
        Ok(true)
    }
}
