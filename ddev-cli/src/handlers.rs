use anyhow::{Context, Result};
use crossterm::style::Stylize;
use ddev_core::ProjectConfig;
use ddev_core::config::find_app_root;
use ddev_platform::{LocalApp, LogsRequest, Platform};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::cli::{Cli, Commands};
use crate::style;

fn app_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.path {
        Some(path) => Ok(find_app_root(path)?),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine working directory")?;
            Ok(find_app_root(&cwd)?)
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::List) {
        let sites = Platform::from_env()?.list().await?;
        print!("{sites}");
        return Ok(());
    }

    // Config errors are reported before the engine is needed.
    let root = app_root(&cli)?;
    ProjectConfig::load(&root)?;
    let platform = Platform::from_env()?;
    let app = platform.init(&root).await?;

    match &cli.command {
        Commands::List => print!("{}", platform.list().await?),
        Commands::Start => {
            app.start().await?;
            println!(
                "{} Successfully started {}",
                style::CHECK,
                app.project().name().bold()
            );
            println!("Your application can be reached at: {}", app.project().url());
        }
        Commands::Stop => {
            app.stop().await?;
            println!("{} Stopped {}", style::CHECK, app.project().name().bold());
        }
        Commands::Down { remove_data } => {
            app.down(*remove_data).await?;
            println!("{} Removed {}", style::CHECK, app.project().name().bold());
            if *remove_data {
                println!("Database data and generated settings files were deleted.");
            }
        }
        Commands::Describe => {
            print!("{}", app.describe().await?);
        }
        Commands::Status => {
            println!("{}", app.site_status().await?);
        }
        Commands::Exec { service, command } => exec(&app, service, command).await?,
        Commands::Logs {
            service,
            follow,
            timestamps,
            tail,
        } => {
            let request = LogsRequest {
                follow: *follow,
                timestamps: *timestamps,
                tail: tail.clone(),
            };
            app.logs(service, &request).await?;
        }
        Commands::ImportDb { src, extract_path } => {
            let report = app
                .import_db(src.as_deref(), extract_path.as_deref())
                .await?;
            for warning in &report.warnings {
                println!("{} {}", style::WARN, warning.as_str().yellow());
            }
            println!(
                "{} Successfully imported database for {}",
                style::CHECK,
                app.project().name().bold()
            );
        }
        Commands::ImportFiles { src, extract_path } => {
            app.import_files(src.as_deref(), extract_path.as_deref())
                .await?;
            println!(
                "{} Successfully imported files for {}",
                style::CHECK,
                app.project().name().bold()
            );
        }
    }
    Ok(())
}

async fn exec(app: &LocalApp, service: &str, command: &[String]) -> Result<()> {
    let tty = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
    let output = app.exec(service, tty, command).await?;
    if !tty {
        print!("{output}");
    }
    Ok(())
}
