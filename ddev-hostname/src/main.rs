//! `ddev-hostname hostname <name> <ip>`: the one privileged operation ddev
//! needs. It is run through `sudo` and only ever appends a hosts entry.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ddev_core::HostsFile;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ddev-hostname")]
#[command(about = "Adds a ddev hostname to the hosts file", long_about = None)]
struct Cli {
    /// Hosts file to edit instead of the system one. Refused under root.
    #[arg(long, hide = true)]
    hosts_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map `name` to `ip`
    Hostname { name: String, ip: IpAddr },
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        bail!("invalid hostname {name:?}");
    }
    Ok(())
}

/// The system hosts file requires root. An alternate file is only honoured
/// for unprivileged callers.
fn target_hosts(hosts_file: Option<PathBuf>, is_root: bool) -> Result<HostsFile> {
    match (hosts_file, is_root) {
        (Some(path), true) => bail!(
            "--hosts-file is not accepted when running as root: {}",
            path.display()
        ),
        (Some(path), false) => Ok(HostsFile::with_path(path)),
        (None, true) => Ok(HostsFile::new()),
        (None, false) => bail!(
            "ddev-hostname must run as root to edit {}",
            HostsFile::new().path().display()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Hostname { name, ip } => {
            validate_name(&name)?;
            let hosts = target_hosts(cli.hosts_file, nix::unistd::geteuid().is_root())?;
            let added = hosts
                .add_entry(&ip.to_string(), &name)
                .await
                .with_context(|| format!("Failed to update {}", hosts.path().display()))?;
            if added {
                println!("Added {name} to {}", hosts.path().display());
            }
        }
    }
    Ok(())
}
