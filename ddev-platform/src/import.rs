//! Database and files imports.

use crate::app::LocalApp;
use crate::settings::{self, SettingsOutcome};
use anyhow::Result;
use ddev_core::config::HookName;
use ddev_core::labels;
use ddev_core::{AppType, DdevError};
use ddev_utils::archive;
use ddev_utils::asset::{Asset, AssetType, has_sql_suffix, validate_asset};
use ddev_utils::fs::{copy_dir, purge_dir, set_mode};
use ddev_utils::lock::FileLock;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Pipeline run in the db container; the import dir is mounted at `/db`.
pub const MYSQL_IMPORT: &str = "cat /db/*.sql | mysql";

const EXTRACT_PATH_QUESTION: &str = "You provided an archive. Do you want to extract from a specific path in your archive? You may leave this blank to use the full archive contents";

/// What an import left for the user to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub warnings: Vec<String>,
}

/// A remote source of backups, such as a hosting provider.
pub trait BackupProvider: Send + Sync {
    /// Called once before any backup is requested.
    fn validate(&self) -> Result<()>;

    /// A local copy of the latest backup of `kind` and the sub-path to extract from it.
    fn get_backup(&self, kind: AssetType) -> Result<(PathBuf, String)>;
}

fn io_error(e: &anyhow::Error) -> DdevError {
    DdevError::Io(format!("{e:#}"))
}

impl LocalApp {
    /// Resolves the source asset and extraction path, prompting for what was
    /// not given. The extraction path is only asked for when the source itself
    /// came from a prompt.
    fn resolve_source(
        &self,
        src: Option<&str>,
        extract_path: Option<&str>,
        asset_type: AssetType,
    ) -> Result<(Asset, String)> {
        let given = src.map(str::trim).filter(|s| !s.is_empty());
        let prompted = given.is_none();
        let raw = match given {
            Some(path) => path.to_string(),
            None => self.platform.prompt.ask(&format!(
                "Provide the path to the {asset_type} you wish to import"
            ))?,
        };
        let asset = validate_asset(&raw, asset_type)?;

        let sub = match (extract_path, asset.archive) {
            (Some(sub), _) => sub.to_string(),
            (None, Some(kind)) if prompted && kind.has_entries() => {
                self.platform.prompt.ask(EXTRACT_PATH_QUESTION)?
            }
            (None, _) => String::new(),
        };
        Ok((asset, sub))
    }

    pub async fn import_db(
        &self,
        src: Option<&str>,
        extract_path: Option<&str>,
    ) -> Result<ImportReport> {
        // Held across both hooks.
        let _lock = FileLock::try_acquire(&self.project.import_lock)?;
        self.run_hooks(HookName::PreImportDb).await?;

        let import_dir = &self.project.import_dir;
        purge_dir(import_dir).map_err(|e| io_error(&e))?;

        let (asset, sub) = self.resolve_source(src, extract_path, AssetType::Db)?;
        stage_database(&asset, &sub, import_dir)?;

        info!("Importing database into {}", self.project.name());
        let argv = ["bash", "-c", MYSQL_IMPORT].map(str::to_string);
        self.runtime()
            .compose_exec(&self.compose()?, labels::DB, false, &argv)
            .await
            .map_err(|e| DdevError::ImportExecFailed(format!("{e:#}")))?;

        let report = self.write_settings().await?;
        purge_dir(import_dir).map_err(|e| io_error(&e))?;

        self.run_hooks(HookName::PostImportDb).await?;
        Ok(report)
    }

    async fn write_settings(&self) -> Result<ImportReport> {
        let port = self.db_published_port().await?;
        let mut report = ImportReport::default();
        for outcome in settings::write_settings(&self.project, port)? {
            if let SettingsOutcome::CustomExists(path) = outcome {
                let warning = format!(
                    "custom settings file exists at {}; ddev did not overwrite it. Make sure it points at the project database",
                    path.display()
                );
                warn!("{}", warning);
                report.warnings.push(warning);
            }
        }
        if self.project.app_type() == AppType::Wordpress {
            let warning = format!(
                "wordpress stores absolute URLs in the database; run `wp search-replace <production-url> {}` in the web container if the site URL changed",
                self.project.url()
            );
            warn!("{}", warning);
            report.warnings.push(warning);
        }
        Ok(report)
    }

    pub async fn import_files(&self, src: Option<&str>, extract_path: Option<&str>) -> Result<()> {
        let _lock = FileLock::try_acquire(&self.project.import_lock)?;
        self.run_hooks(HookName::PreImportFiles).await?;

        let dest = self.project.upload_dir();
        prepare_destination(&dest)?;

        let (asset, sub) = self.resolve_source(src, extract_path, AssetType::Files)?;
        if asset.is_archive() {
            archive::extract(&asset.path, &dest, &sub)?;
        } else {
            copy_dir(&asset.path, &dest).map_err(|e| io_error(&e))?;
        }
        info!("Imported files into {}", dest.display());

        self.run_hooks(HookName::PostImportFiles).await
    }
}

/// Unpacks or copies a database asset into the import dir and checks that at
/// least one `.sql` file landed at its top level.
fn stage_database(asset: &Asset, sub: &str, import_dir: &Path) -> Result<()> {
    if asset.is_archive() {
        archive::extract(&asset.path, import_dir, sub)?;
    } else {
        let target = import_dir.join("db.sql");
        std::fs::copy(&asset.path, &target).map_err(|e| {
            DdevError::Io(format!(
                "failed to copy {} to {}: {e}",
                asset.path.display(),
                target.display()
            ))
        })?;
    }

    let entries = std::fs::read_dir(import_dir)
        .map_err(|e| DdevError::Io(format!("failed to read {}: {e}", import_dir.display())))?;
    let found = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .any(|path| path.is_file() && has_sql_suffix(&path));
    if !found {
        return Err(DdevError::NoSql(import_dir.display().to_string()).into());
    }
    Ok(())
}

/// Empties or creates the upload dir. Its parent must already exist.
fn prepare_destination(dest: &Path) -> Result<()> {
    let Some(parent) = dest.parent().filter(|p| p.is_dir()) else {
        return Err(DdevError::Io(format!(
            "cannot import files: the parent of {} does not exist",
            dest.display()
        ))
        .into());
    };
    set_mode(parent, 0o755).map_err(|e| io_error(&e))?;
    Ok(purge_dir(dest).map_err(|e| io_error(&e))?)
}

/// Pulls the latest database and files backups from `provider` into `app`.
pub async fn import_from_provider(app: &LocalApp, provider: &dyn BackupProvider) -> Result<ImportReport> {
    provider.validate()?;

    let (db_path, db_sub) = provider.get_backup(AssetType::Db)?;
    let report = app
        .import_db(Some(&db_path.to_string_lossy()), Some(&db_sub))
        .await?;

    let (files_path, files_sub) = provider.get_backup(AssetType::Files)?;
    app.import_files(Some(&files_path.to_string_lossy()), Some(&files_sub))
        .await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{Sandbox, WP1};
    use crate::settings::SIGNATURE;
    use ddev_utils::prompt::Prompt;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Answers questions from a fixed list.
    #[derive(Debug)]
    struct Scripted(Mutex<Vec<String>>);

    impl Prompt for Scripted {
        fn ask(&self, _question: &str) -> Result<String> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    fn gzip(path: &Path, content: &[u8]) {
        let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }

    fn tarball(path: &Path, entries: &[(&str, &[u8])]) {
        let encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[tokio::test]
    async fn db_import_from_gzip() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();

        let dump = sb.dir.path().join("users.sql.gz");
        gzip(&dump, b"CREATE TABLE t(x INT);\n");

        let staged = Arc::new(Mutex::new(Vec::new()));
        let seen = staged.clone();
        let import_dir = app.project().import_dir.clone();
        sb.rt.on_exec(move |service, argv| {
            if service == "db" {
                let names: Vec<String> = fs::read_dir(&import_dir)
                    .unwrap()
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect();
                seen.lock().unwrap().extend(names);
                assert_eq!(argv[2], MYSQL_IMPORT);
            }
            Ok(String::new())
        });

        let report = app
            .import_db(Some(dump.to_str().unwrap()), None)
            .await
            .unwrap();
        assert_eq!(*staged.lock().unwrap(), vec!["users.sql"]);
        assert!(sb.rt.calls().contains(&format!("exec ddev-wp1 db bash -c {MYSQL_IMPORT}")));
        assert_eq!(fs::read_dir(&app.project().import_dir).unwrap().count(), 0);

        let settings = fs::read_to_string(app.project().site_settings_path()).unwrap();
        assert!(settings.contains(SIGNATURE));
        assert!(report.warnings.iter().any(|w| w.contains("search-replace")));
    }

    #[tokio::test]
    async fn plain_sql_is_staged_as_db_sql() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();
        let dump = sb.dir.path().join("empty.sql");
        fs::write(&dump, "").unwrap();

        let import_dir = app.project().import_dir.clone();
        sb.rt.on_exec(move |_, _| {
            assert!(import_dir.join("db.sql").is_file());
            Ok(String::new())
        });
        app.import_db(Some(dump.to_str().unwrap()), None).await.unwrap();
    }

    #[tokio::test]
    async fn archive_without_sql_fails() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();
        let archive = sb.dir.path().join("dump.tar.gz");
        tarball(&archive, &[("readme.txt", b"nothing here")]);

        let err = app
            .import_db(Some(archive.to_str().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DdevError>(), Some(DdevError::NoSql(_))));
        assert!(!sb.rt.calls().iter().any(|c| c.contains(MYSQL_IMPORT)));
    }

    #[tokio::test]
    async fn failed_mysql_is_import_exec_failed() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();
        let dump = sb.dir.path().join("broken.sql");
        fs::write(&dump, "NOT SQL").unwrap();
        sb.rt.on_exec(|_, _| Err(DdevError::Compose("ERROR 1064 (42000)".into()).into()));

        let err = app
            .import_db(Some(dump.to_str().unwrap()), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DdevError>(),
            Some(DdevError::ImportExecFailed(_))
        ));
    }

    #[tokio::test]
    async fn noninteractive_missing_source_fails_fast() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        let err = app.import_db(None, None).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DdevError>(), Some(DdevError::AssetInvalid(_))));
    }

    #[tokio::test]
    async fn files_import_with_sub_path() {
        let sb = Sandbox::new();
        let root = sb.app_root(
            "d8",
            "name: d8\ntype: drupal8\ndocroot: docroot\n",
            "docroot/sites/default",
        );
        let app = sb.platform.init(&root).await.unwrap();

        let archive = sb.dir.path().join("site.tar.gz");
        tarball(
            &archive,
            &[
                ("site/docroot/sites/default/files/a.png", b"a"),
                ("site/docroot/sites/default/files/b.png", b"b"),
            ],
        );
        let dest = root.join("docroot/sites/default/files");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.png"), "old").unwrap();

        app.import_files(
            Some(archive.to_str().unwrap()),
            Some("docroot/sites/default/files"),
        )
        .await
        .unwrap();

        let mut names: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn files_import_prompts_for_source_and_sub_path() {
        let answers = Arc::new(Scripted(Mutex::new(Vec::new())));
        let sb = Sandbox::with_prompt(answers.clone());
        let source = sb.dir.path().join("uploads.tar.gz");
        tarball(&source, &[("2017/01/pic.jpg", b"jpg"), ("other/x.txt", b"x")]);
        answers
            .0
            .lock()
            .unwrap()
            .extend([source.display().to_string(), "2017".to_string()]);

        let root = sb.app_root("wp1", WP1, "htdocs/wp-content");
        let app = sb.platform.init(&root).await.unwrap();
        app.import_files(None, None).await.unwrap();

        let uploads = root.join("htdocs/wp-content/uploads");
        assert!(uploads.join("01/pic.jpg").is_file());
        assert!(!uploads.join("other").exists());
        assert!(answers.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn files_import_copies_directories() {
        let sb = Sandbox::new();
        let root = sb.app_root("wp1", WP1, "htdocs/wp-content");
        let app = sb.platform.init(&root).await.unwrap();
        let source = sb.dir.path().join("uploads");
        fs::create_dir_all(source.join("2018")).unwrap();
        fs::write(source.join("2018/a.gif"), "gif").unwrap();

        app.import_files(Some(source.to_str().unwrap()), None).await.unwrap();
        assert!(root.join("htdocs/wp-content/uploads/2018/a.gif").is_file());
    }

    #[tokio::test]
    async fn concurrent_import_is_refused() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();
        let _held = FileLock::try_acquire(&app.project().import_lock).unwrap();

        let dump = sb.dir.path().join("a.sql");
        fs::write(&dump, "SELECT 1;").unwrap();
        let err = app.import_db(Some(dump.to_str().unwrap()), None).await.unwrap_err();
        assert!(err.to_string().contains("locked by another ddev process"));
    }

    #[tokio::test]
    async fn locked_import_runs_no_hooks() {
        let sb = Sandbox::new();
        let config = "name: wp1\ntype: wordpress\ndocroot: htdocs\nhooks:\n  pre-import-db:\n    - exec-host: \"touch db-hook-ran\"\n  pre-import-files:\n    - exec-host: \"touch files-hook-ran\"\n";
        let root = sb.app_root("wp1", config, "htdocs");
        let app = sb.platform.init(&root).await.unwrap();
        app.start().await.unwrap();
        let _held = FileLock::try_acquire(&app.project().import_lock).unwrap();

        let dump = sb.dir.path().join("a.sql");
        fs::write(&dump, "SELECT 1;").unwrap();
        assert!(app.import_db(Some(dump.to_str().unwrap()), None).await.is_err());

        let uploads = sb.dir.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        assert!(app.import_files(Some(uploads.to_str().unwrap()), None).await.is_err());

        assert!(!root.join("db-hook-ran").exists());
        assert!(!root.join("files-hook-ran").exists());
    }

    #[tokio::test]
    async fn owned_settings_survive_down_once_the_sentinel_is_removed() {
        let sb = Sandbox::new();
        let app = sb.platform.init(&sb.app_root("wp1", WP1, "htdocs")).await.unwrap();
        app.start().await.unwrap();
        let dump = sb.dir.path().join("a.sql");
        fs::write(&dump, "SELECT 1;").unwrap();
        app.import_db(Some(dump.to_str().unwrap()), None).await.unwrap();

        let path = app.project().site_settings_path();
        let edited: String = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .filter(|l| !l.contains(SIGNATURE))
            .map(|l| format!("{l}\n"))
            .collect();
        fs::write(&path, &edited).unwrap();

        app.down(true).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), edited);
        assert!(!app.project().data_dir.exists());
    }

    struct LocalBackups {
        db: PathBuf,
        files: PathBuf,
        validated: Mutex<bool>,
    }

    impl BackupProvider for LocalBackups {
        fn validate(&self) -> Result<()> {
            *self.validated.lock().unwrap() = true;
            Ok(())
        }

        fn get_backup(&self, kind: AssetType) -> Result<(PathBuf, String)> {
            assert!(*self.validated.lock().unwrap());
            Ok(match kind {
                AssetType::Db => (self.db.clone(), String::new()),
                AssetType::Files => (self.files.clone(), String::new()),
            })
        }
    }

    #[tokio::test]
    async fn provider_feeds_both_imports() {
        let sb = Sandbox::new();
        let root = sb.app_root("wp1", WP1, "htdocs/wp-content");
        let app = sb.platform.init(&root).await.unwrap();
        app.start().await.unwrap();

        let db = sb.dir.path().join("backup.sql.gz");
        gzip(&db, b"SELECT 1;\n");
        let files = sb.dir.path().join("files.tar.gz");
        tarball(&files, &[("logo.png", b"png")]);

        let provider = LocalBackups {
            db,
            files,
            validated: Mutex::new(false),
        };
        import_from_provider(&app, &provider).await.unwrap();
        assert!(root.join("htdocs/wp-content/uploads/logo.png").is_file());
        assert!(sb.rt.calls().iter().any(|c| c.contains(MYSQL_IMPORT)));
    }
}
