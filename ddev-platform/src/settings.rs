//! CMS settings files that point an application at the project database.
//!
//! Every generated file carries [`SIGNATURE`]. A file at a target path that
//! lacks it belongs to the user and is never overwritten or deleted.

use anyhow::Result;
use ddev_core::{AppType, DdevError, Project};
use ddev_utils::fs::set_mode;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marks a settings file as owned by ddev.
pub const SIGNATURE: &str = "#ddev-generated";

pub const DB_NAME: &str = "db";
pub const DB_USER: &str = "db";
pub const DB_PASSWORD: &str = "db";
/// Database host as seen from inside the project network.
pub const DB_HOST: &str = "db";
/// Database host as seen from the host machine.
pub const HOST_DB_HOST: &str = "127.0.0.1";

const DRUPAL7_TEMPLATE: &str = r#"<?php

/**
 * @file
 * %%SIGNATURE%%: Automatically generated Drupal settings file.
 * ddev manages this file and may delete or overwrite it unless this
 * comment is removed.
 */

$host = "%%DB_HOST%%";
$port = %%DB_PORT%%;

// Tools running on the host (drush) reach the database through the published port.
if (empty(getenv('DEPLOY_NAME'))) {
  $host = "%%HOST_DB_HOST%%";
  $port = %%PUBLISHED_PORT%%;
}

$databases['default']['default'] = array(
  'database' => "%%DB_NAME%%",
  'username' => "%%DB_USER%%",
  'password' => "%%DB_PASSWORD%%",
  'host' => $host,
  'driver' => "mysql",
  'port' => $port,
  'prefix' => "",
);

$drupal_hash_salt = '%%HASH_SALT%%';

$base_url = '%%URL%%';

ini_set('session.gc_probability', 1);
ini_set('session.gc_divisor', 100);
ini_set('session.gc_maxlifetime', 200000);
ini_set('session.cookie_lifetime', 2000000);

if (file_exists(__DIR__ . '/custom.settings.php')) {
  include __DIR__ . '/custom.settings.php';
}
"#;

const DRUPAL8_TEMPLATE: &str = r#"<?php

/**
 * @file
 * %%SIGNATURE%%: Automatically generated Drupal settings file.
 * ddev manages this file and may delete or overwrite it unless this
 * comment is removed.
 */

$host = "%%DB_HOST%%";
$port = %%DB_PORT%%;

// Tools running on the host (drush) reach the database through the published port.
if (empty(getenv('DEPLOY_NAME'))) {
  $host = "%%HOST_DB_HOST%%";
  $port = %%PUBLISHED_PORT%%;
}

$databases['default']['default'] = array(
  'database' => "%%DB_NAME%%",
  'username' => "%%DB_USER%%",
  'password' => "%%DB_PASSWORD%%",
  'host' => $host,
  'driver' => "mysql",
  'port' => $port,
  'prefix' => "",
);

$settings['hash_salt'] = '%%HASH_SALT%%';

// Keep Drupal from making sites/default read-only.
$settings['skip_permissions_hardening'] = TRUE;

$settings['trusted_host_patterns'] = ['.*'];

if (empty($config_directories[CONFIG_SYNC_DIRECTORY])) {
  $config_directories[CONFIG_SYNC_DIRECTORY] = 'sites/default/files/sync';
}

if (file_exists(__DIR__ . '/custom.settings.php')) {
  include __DIR__ . '/custom.settings.php';
}
"#;

const DRUSH_TEMPLATE: &str = r#"<?php

/**
 * @file
 * %%SIGNATURE%%: Automatically generated database settings for host-side drush.
 * ddev manages this file and may delete or overwrite it unless this
 * comment is removed.
 */

$databases['default']['default'] = array(
  'database' => "%%DB_NAME%%",
  'username' => "%%DB_USER%%",
  'password' => "%%DB_PASSWORD%%",
  'host' => "%%HOST_DB_HOST%%",
  'driver' => "mysql",
  'port' => %%PUBLISHED_PORT%%,
  'prefix' => "",
);
"#;

const WORDPRESS_TEMPLATE: &str = r#"<?php

/**
 %%SIGNATURE%%: Automatically generated WordPress wp-config.php file.
 ddev manages this file and may delete or overwrite it unless this
 comment is removed.
 */

/** Inside the containers DEPLOY_NAME is set; on the host use the published port. */
if (getenv('DEPLOY_NAME')) {
  define('DB_HOST', '%%DB_HOST%%');
} else {
  define('DB_HOST', '%%HOST_DB_HOST%%:%%PUBLISHED_PORT%%');
}

define('DB_NAME', '%%DB_NAME%%');
define('DB_USER', '%%DB_USER%%');
define('DB_PASSWORD', '%%DB_PASSWORD%%');
define('DB_CHARSET', 'utf8mb4');
define('DB_COLLATE', '');

define('WP_HOME', '%%URL%%');
define('WP_SITEURL', '%%URL%%');

define( 'AUTH_KEY',         '%%AUTH_KEY%%' );
define( 'SECURE_AUTH_KEY',  '%%SECURE_AUTH_KEY%%' );
define( 'LOGGED_IN_KEY',    '%%LOGGED_IN_KEY%%' );
define( 'NONCE_KEY',        '%%NONCE_KEY%%' );
define( 'AUTH_SALT',        '%%AUTH_SALT%%' );
define( 'SECURE_AUTH_SALT', '%%SECURE_AUTH_SALT%%' );
define( 'LOGGED_IN_SALT',   '%%LOGGED_IN_SALT%%' );
define( 'NONCE_SALT',       '%%NONCE_SALT%%' );

$table_prefix  = 'wp_';

define('WP_DEBUG', false);

if ( !defined('ABSPATH') )
  define('ABSPATH', dirname(__FILE__) . '/');

require_once(ABSPATH . 'wp-settings.php');
"#;

const WORDPRESS_KEYS: [&str; 8] = [
    "AUTH_KEY",
    "SECURE_AUTH_KEY",
    "LOGGED_IN_KEY",
    "NONCE_KEY",
    "AUTH_SALT",
    "SECURE_AUTH_SALT",
    "LOGGED_IN_SALT",
    "NONCE_SALT",
];

/// Result of writing one settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    Written(PathBuf),
    /// A user-authored file is in the way; nothing was written.
    CustomExists(PathBuf),
}

impl SettingsOutcome {
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::CustomExists(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Written(path) | Self::CustomExists(path) => path,
        }
    }
}

/// A stable per-project secret: hex SHA-256 of the project name and `key`.
pub fn derive_salt(project_name: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_name.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn fill(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |out, (key, value)| {
        out.replace(&format!("%%{key}%%"), value)
    })
}

fn common_values(project: &Project, published_port: u16) -> Vec<(&'static str, String)> {
    vec![
        ("SIGNATURE", SIGNATURE.to_string()),
        ("DB_NAME", DB_NAME.to_string()),
        ("DB_USER", DB_USER.to_string()),
        ("DB_PASSWORD", DB_PASSWORD.to_string()),
        ("DB_HOST", DB_HOST.to_string()),
        ("DB_PORT", ddev_core::config::DB_PORT.to_string()),
        ("HOST_DB_HOST", HOST_DB_HOST.to_string()),
        ("PUBLISHED_PORT", published_port.to_string()),
        ("URL", project.url()),
    ]
}

/// Contents of the main settings file for `project`.
pub fn render_site_settings(project: &Project, published_port: u16) -> String {
    let mut values = common_values(project, published_port);
    match project.app_type() {
        AppType::Drupal7 | AppType::Drupal8 => {
            values.push(("HASH_SALT", derive_salt(project.name(), "hash_salt")));
            let template = if project.app_type() == AppType::Drupal7 {
                DRUPAL7_TEMPLATE
            } else {
                DRUPAL8_TEMPLATE
            };
            fill(template, &values)
        }
        AppType::Wordpress => {
            for key in WORDPRESS_KEYS {
                values.push((key, derive_salt(project.name(), key)));
            }
            fill(WORDPRESS_TEMPLATE, &values)
        }
    }
}

/// Contents of the host-side drush settings file.
pub fn render_local_settings(project: &Project, published_port: u16) -> String {
    fill(DRUSH_TEMPLATE, &common_values(project, published_port))
}

/// True if the file at `path` carries the signature. Missing files are not owned.
pub fn is_owned(path: &Path) -> Result<bool> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.contains(SIGNATURE)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(settings_error(path, &e).into()),
    }
}

fn settings_error(path: &Path, err: &dyn std::fmt::Display) -> DdevError {
    DdevError::Settings(format!("{}: {err}", path.display()))
}

/// Writes `content` to `path` unless a user-authored file already lives there.
pub fn write_owned(path: &Path, content: &str) -> Result<SettingsOutcome> {
    if path.exists() {
        if !is_owned(path)? {
            info!("{} exists and is managed by the user", path.display());
            return Ok(SettingsOutcome::CustomExists(path.to_path_buf()));
        }
        set_mode(path, 0o644).map_err(|e| settings_error(path, &e))?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| settings_error(parent, &e))?;
    }
    std::fs::write(path, content).map_err(|e| settings_error(path, &e))?;
    debug!("Wrote {}", path.display());
    Ok(SettingsOutcome::Written(path.to_path_buf()))
}

/// Writes the site settings file and, for Drupal, the drush settings file.
/// The first outcome is always the site settings file.
pub fn write_settings(project: &Project, published_port: u16) -> Result<Vec<SettingsOutcome>> {
    let mut outcomes = vec![write_owned(
        &project.site_settings_path(),
        &render_site_settings(project, published_port),
    )?];
    if let Some(local) = project.site_local_settings_path() {
        outcomes.push(write_owned(
            &local,
            &render_local_settings(project, published_port),
        )?);
    }
    Ok(outcomes)
}

/// Deletes every settings file of `project` that still carries the signature.
/// Returns the paths removed.
pub fn remove_owned_settings(project: &Project) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let candidates = std::iter::once(project.site_settings_path())
        .chain(project.site_local_settings_path());
    for path in candidates {
        if !is_owned(&path)? {
            continue;
        }
        std::fs::remove_file(&path).map_err(|e| settings_error(&path, &e))?;
        info!("Removed {}", path.display());
        removed.push(path);
    }
    Ok(removed)
}
