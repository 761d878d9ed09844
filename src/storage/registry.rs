//! SQLite-backed model registry. Each registered version owns one artifact file
//! whose SHA-256 is stored with the row and checked on every load.
//!
//! Layout under the registry root:
//! `registry.db` and `artifacts/<model name>/<version>/model.json`.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

const ARTIFACT_FILE: &str = "model.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    None,
    Staging,
    Production,
    Archived,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => Err(format!("unknown stage {other:?}")),
        }
    }
}

/// What a training run hands to the registry.
#[derive(Debug, Clone)]
pub struct NewVersion<'a> {
    pub run_id: &'a str,
    pub params: &'a BTreeMap<String, String>,
    pub metrics: &'a BTreeMap<String, f64>,
    pub artifact: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub stage: Stage,
    pub run_id: String,
    pub artifact_path: PathBuf,
    pub artifact_sha256: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

pub struct ModelRegistry {
    root: PathBuf,
    conn: Mutex<Connection>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn lock_err<T>(_: T) -> PipelineError {
    PipelineError::Registry("registry connection lock poisoned".to_string())
}

const VERSION_COLUMNS: &str =
    "name, version, stage, run_id, artifact_path, artifact_sha256, params, metrics, created_at";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<(ModelVersion, String, String, String)> {
    let stage: String = row.get(2)?;
    let params: String = row.get(6)?;
    let metrics: String = row.get(7)?;
    let created_ms: i64 = row.get(8)?;
    let path: String = row.get(4)?;
    Ok((
        ModelVersion {
            name: row.get(0)?,
            version: row.get(1)?,
            stage: Stage::None,
            run_id: row.get(3)?,
            artifact_path: PathBuf::from(path),
            artifact_sha256: row.get(5)?,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            created_at: Utc
                .timestamp_millis_opt(created_ms)
                .single()
                .unwrap_or_default(),
        },
        stage,
        params,
        metrics,
    ))
}

fn decode_version(raw: (ModelVersion, String, String, String)) -> Result<ModelVersion> {
    let (mut v, stage, params, metrics) = raw;
    v.stage = stage.parse().map_err(PipelineError::Registry)?;
    v.params = serde_json::from_str(&params)?;
    v.metrics = serde_json::from_str(&metrics)?;
    Ok(v)
}

impl ModelRegistry {
    /// Open or create the registry under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root.join("artifacts"))?;
        let conn = Connection::open(root.join("registry.db"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS registered_models (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS model_versions (
                name TEXT NOT NULL REFERENCES registered_models(name),
                version INTEGER NOT NULL,
                stage TEXT NOT NULL,
                run_id TEXT NOT NULL,
                artifact_path TEXT NOT NULL,
                artifact_sha256 TEXT NOT NULL,
                params TEXT NOT NULL,
                metrics TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (name, version)
            );
            CREATE INDEX IF NOT EXISTS idx_versions_stage ON model_versions(name, stage);
            "#,
        )?;
        Ok(Self {
            root: root.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a new version in stage `None`.
    pub fn register_version(&self, name: &str, new: &NewVersion<'_>) -> Result<ModelVersion> {
        self.register(name, new, None)
    }

    /// Register a new version and move it to `stage`, archiving whatever held
    /// that stage before. Both happen in one transaction.
    pub fn register_and_promote(
        &self,
        name: &str,
        new: &NewVersion<'_>,
        stage: Stage,
    ) -> Result<ModelVersion> {
        self.register(name, new, Some(stage))
    }

    fn register(&self, name: &str, new: &NewVersion<'_>, promote: Option<Stage>) -> Result<ModelVersion> {
        if name.trim().is_empty() {
            return Err(PipelineError::Registry("model name must not be empty".to_string()));
        }
        let mut conn = self.conn.lock().map_err(lock_err)?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT OR IGNORE INTO registered_models (name, created_at) VALUES (?1, ?2)",
            params![name, now.timestamp_millis()],
        )?;
        let version: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM model_versions WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;

        let dir = self.root.join("artifacts").join(name).join(version.to_string());
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(ARTIFACT_FILE);
        let tmp = dir.join(format!("{ARTIFACT_FILE}.tmp"));
        std::fs::write(&tmp, new.artifact)?;
        std::fs::rename(&tmp, &path)?;
        let digest = sha256_hex(new.artifact);

        let insert = (|| -> Result<()> {
            tx.execute(
                "INSERT INTO model_versions (name, version, stage, run_id, artifact_path, artifact_sha256, params, metrics, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    name,
                    version,
                    Stage::None.as_str(),
                    new.run_id,
                    path.to_string_lossy().into_owned(),
                    digest,
                    serde_json::to_string(new.params)?,
                    serde_json::to_string(new.metrics)?,
                    now.timestamp_millis(),
                ],
            )?;
            if let Some(stage) = promote {
                set_stage(&tx, name, version, stage, true)?;
            }
            Ok(())
        })();
        if let Err(e) = insert {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e);
        }
        tx.commit()?;
        drop(conn);

        tracing::info!(model = name, version, stage = ?promote, "registered model version");
        self.version(name, version)
    }

    /// Move a version to `stage`; with `archive_existing`, versions currently
    /// in that stage move to `Archived`.
    pub fn transition_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing: bool,
    ) -> Result<ModelVersion> {
        {
            let mut conn = self.conn.lock().map_err(lock_err)?;
            let tx = conn.transaction()?;
            set_stage(&tx, name, version, stage, archive_existing)?;
            tx.commit()?;
        }
        tracing::info!(model = name, version, %stage, "transitioned model version");
        self.version(name, version)
    }

    pub fn version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let conn = self.conn.lock().map_err(lock_err)?;
        let raw = conn
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 AND version = ?2"),
                params![name, version],
                version_from_row,
            )
            .optional()?
            .ok_or_else(|| PipelineError::Registry(format!("model {name} has no version {version}")))?;
        decode_version(raw)
    }

    /// Newest version currently in `stage`.
    pub fn latest_version(&self, name: &str, stage: Stage) -> Result<Option<ModelVersion>> {
        let conn = self.conn.lock().map_err(lock_err)?;
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 AND stage = ?2
                 ORDER BY version DESC LIMIT 1"
            ),
            params![name, stage.as_str()],
            version_from_row,
        )
        .optional()?
        .map(decode_version)
        .transpose()
    }

    pub fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let conn = self.conn.lock().map_err(lock_err)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 ORDER BY version"
        ))?;
        let rows = stmt.query_map(params![name], version_from_row)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(decode_version(raw?)?);
        }
        Ok(out)
    }

    /// Resolve `name` + `stage` to a version and read its verified artifact bytes.
    pub fn load_artifact(&self, name: &str, stage: Stage) -> Result<(ModelVersion, Vec<u8>)> {
        let version = self
            .latest_version(name, stage)?
            .ok_or_else(|| PipelineError::Registry(format!("no version of {name} in stage {stage}")))?;
        let bytes = std::fs::read(&version.artifact_path)?;
        let actual = sha256_hex(&bytes);
        if actual != version.artifact_sha256 {
            return Err(PipelineError::ArtifactCorrupted {
                path: version.artifact_path.display().to_string(),
                expected: version.artifact_sha256.clone(),
                actual,
            });
        }
        Ok((version, bytes))
    }
}

fn set_stage(
    tx: &Transaction<'_>,
    name: &str,
    version: u32,
    stage: Stage,
    archive_existing: bool,
) -> Result<()> {
    if archive_existing && matches!(stage, Stage::Staging | Stage::Production) {
        tx.execute(
            "UPDATE model_versions SET stage = ?1 WHERE name = ?2 AND stage = ?3 AND version != ?4",
            params![Stage::Archived.as_str(), name, stage.as_str(), version],
        )?;
    }
    let changed = tx.execute(
        "UPDATE model_versions SET stage = ?1 WHERE name = ?2 AND version = ?3",
        params![stage.as_str(), name, version],
    )?;
    if changed == 0 {
        return Err(PipelineError::Registry(format!("model {name} has no version {version}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_version<'a>(
        params: &'a BTreeMap<String, String>,
        metrics: &'a BTreeMap<String, f64>,
        artifact: &'a [u8],
    ) -> NewVersion<'a> {
        NewVersion {
            run_id: "run-1",
            params,
            metrics,
            artifact,
        }
    }

    #[test]
    fn versions_increment_and_promotion_archives() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::open(dir.path()).unwrap();
        let params = BTreeMap::from([("model_class".to_string(), "X".to_string())]);
        let metrics = BTreeMap::from([("roc_auc".to_string(), 0.9)]);

        let v1 = reg
            .register_and_promote("M", &new_version(&params, &metrics, b"one"), Stage::Production)
            .unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v1.stage, Stage::Production);
        assert_eq!(v1.metrics["roc_auc"], 0.9);

        let v2 = reg
            .register_and_promote("M", &new_version(&params, &metrics, b"two"), Stage::Production)
            .unwrap();
        assert_eq!(v2.version, 2);

        let all = reg.list_versions("M").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].stage, Stage::Archived);
        assert_eq!(all[1].stage, Stage::Production);

        let (active, bytes) = reg.load_artifact("M", Stage::Production).unwrap();
        assert_eq!(active.version, 2);
        assert_eq!(bytes, b"two");
    }

    #[test]
    fn register_without_promotion_stays_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::open(dir.path()).unwrap();
        let (p, m) = (BTreeMap::new(), BTreeMap::new());
        let v = reg.register_version("M", &new_version(&p, &m, b"x")).unwrap();
        assert_eq!(v.stage, Stage::None);
        assert!(reg.latest_version("M", Stage::Production).unwrap().is_none());
        assert!(reg.load_artifact("M", Stage::Production).is_err());

        let v = reg.transition_stage("M", 1, Stage::Staging, true).unwrap();
        assert_eq!(v.stage, Stage::Staging);
        assert!(reg.transition_stage("M", 7, Stage::Staging, true).is_err());
    }

    #[test]
    fn tampered_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::open(dir.path()).unwrap();
        let (p, m) = (BTreeMap::new(), BTreeMap::new());
        let v = reg
            .register_and_promote("M", &new_version(&p, &m, b"model"), Stage::Production)
            .unwrap();
        std::fs::write(&v.artifact_path, b"evil").unwrap();
        assert!(matches!(
            reg.load_artifact("M", Stage::Production),
            Err(PipelineError::ArtifactCorrupted { .. })
        ));
    }

    #[test]
    fn reopen_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let (p, m) = (BTreeMap::new(), BTreeMap::new());
        {
            let reg = ModelRegistry::open(dir.path()).unwrap();
            reg.register_and_promote("M", &new_version(&p, &m, b"a"), Stage::Production)
                .unwrap();
        }
        let reg = ModelRegistry::open(dir.path()).unwrap();
        assert_eq!(reg.latest_version("M", Stage::Production).unwrap().unwrap().version, 1);
    }

    #[test]
    fn stage_parsing() {
        assert_eq!("production".parse::<Stage>(), Ok(Stage::Production));
        assert_eq!("Archived".parse::<Stage>(), Ok(Stage::Archived));
        assert!("live".parse::<Stage>().is_err());
        assert_eq!(Stage::Staging.to_string(), "Staging");
    }
}
