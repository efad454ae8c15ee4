//! Compose manifests for projects and for the shared router.

use anyhow::Result;
use ddev_core::config::{
    COMPOSE_FILE, DBA_HTTP_EXPOSE, DB_PORT, DEFAULT_ROUTER_IMAGE, MAILHOG_PORT,
};
use ddev_core::labels::{self, PLATFORM_TAG};
use ddev_core::{DdevError, Project};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Network every project and the router attach to.
pub const NETWORK: &str = "ddev_default";
/// Compose project name of the router.
pub const ROUTER_PROJECT: &str = "ddev-router";
/// Mount point of the import staging directory inside the db container.
pub const DB_IMPORT_MOUNT: &str = "/db";

const OVERRIDE_STEM: &str = "docker-compose.override";

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The label block shared by a project's services, indented for a service.
fn project_labels(project: &Project, container_type: &str) -> String {
    let pairs = [
        (labels::SITE_NAME, project.name().to_string()),
        (labels::APPROOT, project.app_root.display().to_string()),
        (labels::PLATFORM, PLATFORM_TAG.to_string()),
        (labels::CONTAINER_TYPE, container_type.to_string()),
        (labels::COMPOSE_SERVICE, container_type.to_string()),
        (labels::APP_TYPE, project.app_type().to_string()),
        (labels::APP_URL, project.url()),
    ];
    let mut out = String::from("    labels:\n");
    for (key, value) in pairs {
        let _ = writeln!(out, "      {key}: {}", quote(&value));
    }
    out
}

/// Renders `<AppRoot>/.ddev/docker-compose.yaml`.
pub fn render_project(project: &Project) -> String {
    let name = project.name();
    let hostname = project.hostname();
    let web_expose = project.http_expose();

    let mut out = String::from(
        "# Generated by ddev. Changes are overwritten on every start;\n\
         # use docker-compose.override.yaml for local additions.\n\
         version: '2'\n\
         services:\n",
    );

    let _ = write!(
        out,
        "  db:\n\
         \x20   container_name: ddev-{name}-db\n\
         \x20   image: {image}\n\
         \x20   restart: \"no\"\n\
         \x20   volumes:\n\
         \x20     - {data}\n\
         \x20     - {import}\n\
         \x20   ports:\n\
         \x20     - \"{DB_PORT}\"\n\
         {labels}",
        image = project.db_image(),
        data = quote(&format!("{}:/var/lib/mysql", project.data_dir.display())),
        import = quote(&format!("{}:{DB_IMPORT_MOUNT}", project.import_dir.display())),
        labels = project_labels(project, labels::DB),
    );

    let _ = write!(
        out,
        "  web:\n\
         \x20   container_name: ddev-{name}-web\n\
         \x20   image: {image}\n\
         \x20   restart: \"no\"\n\
         \x20   volumes:\n\
         \x20     - {approot}\n\
         \x20   working_dir: {workdir}\n\
         \x20   depends_on:\n\
         \x20     - db\n\
         \x20   links:\n\
         \x20     - db:db\n\
         \x20   ports:\n\
         \x20     - \"80\"\n\
         \x20     - \"{MAILHOG_PORT}\"\n\
         \x20   environment:\n\
         \x20     - DEPLOY_NAME=local\n\
         \x20     - DDEV_DOCROOT={docroot}\n\
         \x20     - VIRTUAL_HOST={hostname}\n\
         \x20     - {expose_env}\n\
         {labels}\
         \x20     {expose_key}: {expose}\n",
        image = project.web_image(),
        approot = quote(&format!("{}:/var/www/html:cached", project.app_root.display())),
        workdir = quote(&format!("/var/www/html/{}", project.config.docroot)),
        docroot = project.config.docroot,
        expose_env = quote(&format!("{}={web_expose}", labels::HTTP_EXPOSE)),
        labels = project_labels(project, labels::WEB),
        expose_key = labels::HTTP_EXPOSE,
        expose = quote(web_expose),
    );

    let _ = write!(
        out,
        "  dba:\n\
         \x20   container_name: ddev-{name}-dba\n\
         \x20   image: {image}\n\
         \x20   restart: \"no\"\n\
         \x20   depends_on:\n\
         \x20     - db\n\
         \x20   links:\n\
         \x20     - db:db\n\
         \x20   environment:\n\
         \x20     - PMA_USER=db\n\
         \x20     - PMA_PASSWORD=db\n\
         \x20     - VIRTUAL_HOST={hostname}\n\
         \x20     - {expose_env}\n\
         {labels}\
         \x20     {expose_key}: {expose}\n",
        image = project.dba_image(),
        expose_env = quote(&format!("{}={DBA_HTTP_EXPOSE}", labels::HTTP_EXPOSE)),
        labels = project_labels(project, labels::DBA),
        expose_key = labels::HTTP_EXPOSE,
        expose = quote(DBA_HTTP_EXPOSE),
    );

    out.push_str(&external_network());
    out
}

fn external_network() -> String {
    format!(
        "networks:\n\
         \x20 default:\n\
         \x20   external:\n\
         \x20     name: {NETWORK}\n"
    )
}

/// Renders the router manifest publishing each of `ports` on the host.
pub fn render_router(ports: &BTreeSet<u16>) -> String {
    let mut out = format!(
        "# Generated by ddev. Shared by every running project.\n\
         version: '2'\n\
         services:\n\
         \x20 ddev-router:\n\
         \x20   image: {DEFAULT_ROUTER_IMAGE}\n\
         \x20   container_name: ddev-router\n\
         \x20   restart: \"no\"\n\
         \x20   ports:\n"
    );
    for port in ports {
        let _ = writeln!(out, "      - \"{port}:{port}\"");
    }
    let _ = write!(
        out,
        "    volumes:\n\
         \x20     - /var/run/docker.sock:/tmp/docker.sock:ro\n\
         \x20   labels:\n\
         \x20     {platform}: {tag}\n\
         \x20     {container_type}: {router}\n\
         \x20     {service}: ddev-router\n",
        platform = labels::PLATFORM,
        tag = quote(PLATFORM_TAG),
        container_type = labels::CONTAINER_TYPE,
        router = labels::ROUTER,
        service = labels::COMPOSE_SERVICE,
    );
    out.push_str(&external_network());
    out
}

/// Writes `content` to `path`, creating parent directories.
pub fn write_manifest(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DdevError::Io(format!("failed to create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, content)
        .map_err(|e| DdevError::Io(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}

/// The compose files of a project in the order the compose tool must see them:
/// the generated manifest, then other `docker-compose.*.yaml` files in lexical
/// order, then the override file.
pub fn compose_files(config_dir: &Path) -> Result<Vec<PathBuf>> {
    let primary = config_dir.join(COMPOSE_FILE);
    let mut extras = Vec::new();
    let mut overrides = Vec::new();

    let entries = std::fs::read_dir(config_dir)
        .map_err(|e| DdevError::Io(format!("failed to read {}: {e}", config_dir.display())))?;
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name
            .strip_suffix(".yaml")
            .or_else(|| name.strip_suffix(".yml"))
        else {
            continue;
        };
        if stem == OVERRIDE_STEM {
            overrides.push(path);
        } else if stem.starts_with("docker-compose.") {
            extras.push(path);
        }
    }

    if overrides.len() > 1 {
        return Err(DdevError::ConfigInvalid(format!(
            "both {OVERRIDE_STEM}.yaml and {OVERRIDE_STEM}.yml exist in {}; remove one",
            config_dir.display()
        ))
        .into());
    }

    extras.sort();
    let mut files = vec![primary];
    files.extend(extras);
    files.extend(overrides);
    Ok(files)
}
