//! User hooks declared in `config.yaml`.

use crate::runtime::{ComposeProject, ContainerRuntime};
use anyhow::{Context, Result};
use ddev_core::config::{HookName, HookTask};
use ddev_core::labels;
use ddev_core::{DdevError, Project};
use tokio::process::Command;
use tracing::info;

/// Splits an `exec` line with shell-word rules. Unbalanced quotes fall back
/// to plain whitespace splitting.
pub fn split_exec(line: &str) -> Vec<String> {
    shlex::split(line)
        .unwrap_or_else(|| line.split_whitespace().map(str::to_string).collect())
}

/// `exec-host` lines are split on whitespace only.
pub fn split_exec_host(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Runs every entry of `hook` in order, stopping at the first failure.
pub async fn run_hooks(
    runtime: &dyn ContainerRuntime,
    project: &Project,
    compose: &ComposeProject,
    hook: HookName,
) -> Result<()> {
    let entries = project.hooks(hook);
    if entries.is_empty() {
        return Ok(());
    }
    info!("Running {} {} hook(s)", entries.len(), hook);

    for entry in entries {
        let task = entry
            .task()
            .map_err(|e| DdevError::ConfigInvalid(format!("{hook}: {e}")))?;
        match task {
            HookTask::Exec(line) => {
                let argv = split_exec(&line);
                info!("{hook}: exec {line}");
                runtime
                    .compose_exec(compose, labels::WEB, true, &argv)
                    .await
                    .map_err(|e| DdevError::HookFailed(format!("{hook} exec {line:?}: {e:#}")))?;
            }
            HookTask::ExecHost(line) => {
                info!("{hook}: exec-host {line}");
                run_on_host(project, &line)
                    .await
                    .map_err(|e| DdevError::HookFailed(format!("{hook} exec-host {line:?}: {e:#}")))?;
            }
        }
    }
    Ok(())
}

async fn run_on_host(project: &Project, line: &str) -> Result<()> {
    let argv = split_exec_host(line);
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };
    let status = Command::new(program)
        .args(args)
        .current_dir(&project.app_root)
        .status()
        .await
        .with_context(|| format!("failed to run {program}"))?;
    if !status.success() {
        anyhow::bail!("{program} exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;
    use ddev_core::{DdevHome, ProjectConfig};
    use std::fs;
    use tempfile::TempDir;

    fn project(dir: &TempDir, hooks: &str) -> (Project, ComposeProject) {
        let root = dir.path().join("app");
        fs::create_dir_all(&root).unwrap();
        let config = ProjectConfig::from_yaml(&format!(
            "name: hooks1\ntype: drupal8\ndocroot: .\nhooks:\n{hooks}"
        ))
        .unwrap();
        let project = Project::new(config, root, &DdevHome::new(dir.path().join("home")));
        let compose = ComposeProject {
            name: project.compose_project(),
            files: vec![project.compose_yaml_path()],
        };
        (project, compose)
    }

    #[test]
    fn exec_lines_honour_quotes() {
        assert_eq!(
            split_exec(r#"drush sql-query "SELECT 1""#),
            vec!["drush", "sql-query", "SELECT 1"]
        );
        assert_eq!(split_exec(r#"echo "unbalanced"#), vec!["echo", "\"unbalanced"]);
        assert_eq!(
            split_exec_host(r#"touch "a b""#),
            vec!["touch", "\"a", "b\""]
        );
    }

    #[tokio::test]
    async fn exec_runs_in_web_container() {
        let dir = TempDir::new().unwrap();
        let (project, compose) = project(
            &dir,
            "  post-start:\n    - exec: \"drush cr\"\n    - exec: \"drush updb -y\"\n",
        );
        let rt = FakeRuntime::new();

        run_hooks(&rt, &project, &compose, HookName::PostStart).await.unwrap();
        assert_eq!(
            rt.calls(),
            vec!["exec ddev-hooks1 web drush cr", "exec ddev-hooks1 web drush updb -y"]
        );
        run_hooks(&rt, &project, &compose, HookName::PreStart).await.unwrap();
        assert_eq!(rt.calls().len(), 2);
    }

    #[tokio::test]
    async fn failing_exec_stops_the_hook() {
        let dir = TempDir::new().unwrap();
        let (project, compose) = project(
            &dir,
            "  post-start:\n    - exec: \"false\"\n    - exec: \"true\"\n",
        );
        let rt = FakeRuntime::new();
        rt.on_exec(|_, argv| {
            if argv[0] == "false" {
                Err(DdevError::Compose("exec in web exited with 1".into()).into())
            } else {
                Ok(String::new())
            }
        });

        let err = run_hooks(&rt, &project, &compose, HookName::PostStart)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DdevError>(), Some(DdevError::HookFailed(_))));
        assert_eq!(rt.calls().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_host_runs_from_app_root() {
        let dir = TempDir::new().unwrap();
        let (project, compose) = project(&dir, "  pre-start:\n    - exec-host: \"touch marker\"\n");
        let cwd = std::env::current_dir().unwrap();

        run_hooks(&FakeRuntime::new(), &project, &compose, HookName::PreStart)
            .await
            .unwrap();
        assert!(project.app_root.join("marker").exists());
        assert_eq!(std::env::current_dir().unwrap(), cwd);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_host_failure_is_hook_failed() {
        let dir = TempDir::new().unwrap();
        let (project, compose) = project(&dir, "  pre-start:\n    - exec-host: \"false\"\n");
        let err = run_hooks(&FakeRuntime::new(), &project, &compose, HookName::PreStart)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DdevError>(), Some(DdevError::HookFailed(_))));
        assert!(err.to_string().contains("pre-start"));
    }
}
