use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ddev")]
#[command(about = "Local development environments for Drupal and WordPress", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project directory (default: search upwards from the current directory)
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every ddev project on this host
    List,
    /// Start the project's containers and the shared router
    Start,
    /// Stop the project's containers, keeping them and their data
    Stop,
    /// Remove the project's containers
    Down {
        /// Also delete the database data and generated settings files
        #[arg(long)]
        remove_data: bool,
    },
    /// Show the project's URLs, credentials and status
    Describe,
    /// Print the project's status
    Status,
    /// Run a command inside one of the project's services
    Exec {
        /// Service to run in (web, db, dba)
        service: String,
        /// Command to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Show a service's logs
    Logs {
        /// Service whose logs to show
        #[arg(long, short, default_value = "web")]
        service: String,
        /// Keep streaming new output
        #[arg(long, short)]
        follow: bool,
        /// Prefix each line with its timestamp
        #[arg(long, short)]
        timestamps: bool,
        /// Number of lines from the end, or `all`
        #[arg(long, default_value = "all")]
        tail: String,
    },
    /// Import a database dump (.sql, .sql.gz/.bz2/.xz, .tar, .tar.gz/.bz2/.xz, .tgz, .zip)
    ImportDb {
        /// Path to the dump or archive; prompted for when absent
        #[arg(long)]
        src: Option<String>,
        /// Path inside the archive to import from
        #[arg(long)]
        extract_path: Option<String>,
    },
    /// Import uploaded files from a directory or archive
    ImportFiles {
        /// Path to the directory or archive; prompted for when absent
        #[arg(long)]
        src: Option<String>,
        /// Path inside the archive to import from
        #[arg(long)]
        extract_path: Option<String>,
    },
}
