//! Persisted content hashes for incremental regeneration.
//!
//! One JSON record per project script and one per master output file.
//! Records are always replaced whole through an atomic rename, so a crash
//! while writing leaves the previous record (or none) in place.
//!
//! Layout:
//! ```text
//! <hash_dir>/
//! ├── <stem>-<key>.json          # project records
//! └── master-<file>-<key>.json   # master file records
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::platform::CanonicalPlatform;
use crate::core::project::{script_stem, BuildInfo, TrackedGlobs};
use crate::util::fs::{ensure_dir, glob_files, read_to_string, slash_path, write_atomic};
use crate::util::hash::{file_set_hash, sha256_file, short_hash, try_sha256_file, Fingerprint};

/// Hash state of a project at the time it was last generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHashRecord {
    pub script: PathBuf,
    pub script_hash: String,

    /// Output directory the project was generated into.
    pub out_dir: PathBuf,

    /// Canonical platforms the project was generated for.
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Tracked input files read while parsing.
    #[serde(default)]
    pub inputs: BTreeMap<PathBuf, String>,

    /// Dependency scripts and their hashes at generation time.
    #[serde(default)]
    pub dependencies: BTreeMap<PathBuf, String>,

    #[serde(default)]
    pub glob_patterns: Vec<String>,

    #[serde(default)]
    pub glob_files: BTreeMap<PathBuf, String>,

    /// Combined hash over `glob_files`.
    pub glob_hash: String,
}

impl ProjectHashRecord {
    /// Load a record from an explicit location.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse hash record: {}", path.display()))
    }
}

/// Hash state of a master file at the time it was last generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterHashRecord {
    pub master_file: PathBuf,

    /// Hash over the ordered project scripts, their platforms and the folder flag.
    pub hash: String,

    pub platforms: Vec<String>,

    /// Generator that produced the file.
    pub generator: String,
}

/// Why a project is (or is not) current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Current,
    NoRecord,
    UnreadableRecord(String),
    ScriptMissing,
    ScriptChanged,
    InputChanged(PathBuf),
    DependencyChanged(PathBuf),
    GlobFilesChanged(PathBuf),
}

impl Staleness {
    pub fn is_current(&self) -> bool {
        matches!(self, Staleness::Current)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Current => write!(f, "up to date"),
            Staleness::NoRecord => write!(f, "no hash record"),
            Staleness::UnreadableRecord(e) => write!(f, "unreadable hash record ({})", e),
            Staleness::ScriptMissing => write!(f, "script is missing"),
            Staleness::ScriptChanged => write!(f, "script changed"),
            Staleness::InputChanged(p) => write!(f, "input `{}` changed", p.display()),
            Staleness::DependencyChanged(p) => {
                write!(f, "dependency `{}` changed", p.display())
            }
            Staleness::GlobFilesChanged(p) => {
                write!(f, "glob-matched file `{}` added, removed or changed", p.display())
            }
        }
    }
}

/// Directory of persisted hash records.
///
/// Paths handed to the store are relative to `root`.
#[derive(Debug, Clone)]
pub struct HashStore {
    root: PathBuf,
    dir: PathBuf,
}

impl HashStore {
    /// Open the store, creating its directory if needed.
    pub fn open(root: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Result<Self> {
        let store = HashStore::read_only(root, dir);
        ensure_dir(&store.dir)?;
        Ok(store)
    }

    /// Store handle that never creates its directory, for inspection only.
    pub fn read_only(root: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        HashStore {
            root: root.into(),
            dir: dir.into(),
        }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record location for a project script.
    pub fn project_record_path(&self, script: &Path) -> PathBuf {
        let key = slash_path(script);
        self.dir
            .join(format!("{}-{}.json", script_stem(script), short_hash(&key)))
    }

    /// Record location for a master output file.
    pub fn master_record_path(&self, master: &Path) -> PathBuf {
        let key = slash_path(master);
        let name = master
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "master".to_string());
        self.dir
            .join(format!("master-{}-{}.json", name, short_hash(&key)))
    }

    /// Load the record for `script`, `None` if there is none.
    pub fn load_project_record(&self, script: &Path) -> Result<Option<ProjectHashRecord>> {
        let path = self.project_record_path(script);
        if !path.is_file() {
            return Ok(None);
        }
        ProjectHashRecord::load(&path).map(Some)
    }

    /// Compare the record for `script` with the filesystem.
    pub fn check_project(&self, script: &Path) -> Staleness {
        let record = match self.load_project_record(script) {
            Ok(Some(record)) => record,
            Ok(None) => return Staleness::NoRecord,
            Err(e) => return Staleness::UnreadableRecord(format!("{:#}", e)),
        };

        match try_sha256_file(&self.root.join(script)) {
            None => return Staleness::ScriptMissing,
            Some(hash) if hash != record.script_hash => return Staleness::ScriptChanged,
            Some(_) => {}
        }

        for (input, hash) in &record.inputs {
            if input.as_path() == script {
                continue;
            }
            if try_sha256_file(&self.root.join(input)).as_ref() != Some(hash) {
                return Staleness::InputChanged(input.clone());
            }
        }

        for (dep, hash) in &record.dependencies {
            if try_sha256_file(&self.root.join(dep)).as_ref() != Some(hash) {
                return Staleness::DependencyChanged(dep.clone());
            }
        }

        if let Some(changed) = self.glob_change(&record) {
            return Staleness::GlobFilesChanged(changed);
        }

        Staleness::Current
    }

    /// True iff the record for `script` matches every hash it contains.
    pub fn is_project_current(&self, script: &Path) -> bool {
        let staleness = self.check_project(script);
        if !staleness.is_current() {
            tracing::debug!("{}: {}", script.display(), staleness);
        }
        staleness.is_current()
    }

    /// Replace the record for `script`. Returns the record location.
    pub fn write_project_hash(
        &self,
        script: &Path,
        out_dir: &Path,
        platforms: &[CanonicalPlatform],
        hashes: &BTreeMap<PathBuf, String>,
        dependencies: &BTreeSet<PathBuf>,
        globs: &TrackedGlobs,
    ) -> Result<PathBuf> {
        let script_hash = match hashes.get(script) {
            Some(hash) => hash.clone(),
            None => sha256_file(&self.root.join(script))?,
        };

        let dependencies = dependencies
            .iter()
            .map(|dep| {
                let hash = try_sha256_file(&self.root.join(dep)).unwrap_or_default();
                (dep.clone(), hash)
            })
            .collect();

        let glob_files: BTreeMap<PathBuf, String> = globs
            .files
            .iter()
            .map(|file| {
                let hash = try_sha256_file(&self.root.join(file)).unwrap_or_default();
                (file.clone(), hash)
            })
            .collect();

        let record = ProjectHashRecord {
            script: script.to_path_buf(),
            script_hash,
            out_dir: out_dir.to_path_buf(),
            platforms: platforms.iter().map(|p| p.name().to_string()).collect(),
            inputs: hashes.clone(),
            dependencies,
            glob_patterns: globs.patterns.clone(),
            glob_hash: file_set_hash(&glob_files),
            glob_files,
        };

        let path = self.project_record_path(script);
        let json = serde_json::to_vec_pretty(&record)?;
        write_atomic(&path, &json)
            .with_context(|| format!("failed to write hash record for {}", script.display()))?;
        Ok(path)
    }

    /// Drop the record for `script` so the next run regenerates it.
    pub fn invalidate_project(&self, script: &Path) -> Result<()> {
        let path = self.project_record_path(script);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove hash record: {}", path.display()))?;
        }
        Ok(())
    }

    /// Last persisted dependency set of `script`.
    pub fn read_dependencies(&self, script: &Path) -> Result<Option<BTreeSet<PathBuf>>> {
        Ok(self
            .load_project_record(script)?
            .map(|record| record.dependencies.into_keys().collect()))
    }

    /// Hash over the ordered project scripts, their platforms and the folder flag.
    pub fn master_hash(info: &BuildInfo, uses_folders: bool) -> String {
        let mut fp = Fingerprint::new();
        for (def, script) in info.scripts() {
            fp.update_str(&slash_path(script));
            fp.update_strs(def.platform_names());
        }
        fp.update_bool(uses_folders);
        fp.finish()
    }

    /// True iff a record exists, the file exists and the project set is unchanged.
    pub fn is_master_current(&self, master: &Path, info: &BuildInfo, uses_folders: bool) -> bool {
        if !self.root.join(master).is_file() {
            return false;
        }
        let path = self.master_record_path(master);
        let record: MasterHashRecord = match read_to_string(&path)
            .and_then(|c| serde_json::from_str::<MasterHashRecord>(&c).map_err(anyhow::Error::from))
        {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("no usable master record for {}: {:#}", master.display(), e);
                return false;
            }
        };
        record.hash == Self::master_hash(info, uses_folders)
    }

    /// Replace the record for a master file.
    pub fn write_master_hash(
        &self,
        master: &Path,
        info: &BuildInfo,
        platforms: &[&str],
        generator: &str,
        uses_folders: bool,
    ) -> Result<()> {
        let record = MasterHashRecord {
            master_file: master.to_path_buf(),
            hash: Self::master_hash(info, uses_folders),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
            generator: generator.to_string(),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.master_record_path(master), &json).with_context(|| {
            format!("failed to write master hash record for {}", master.display())
        })
    }

    /// First glob-matched path that was added, removed or modified.
    fn glob_change(&self, record: &ProjectHashRecord) -> Option<PathBuf> {
        if record.glob_patterns.is_empty() {
            return None;
        }

        let current: BTreeMap<PathBuf, String> = match glob_files(&self.root, &record.glob_patterns)
        {
            Ok(files) => files
                .into_iter()
                .map(|file| {
                    let hash = try_sha256_file(&self.root.join(&file)).unwrap_or_default();
                    (file, hash)
                })
                .collect(),
            Err(e) => {
                tracing::debug!("failed to expand recorded globs: {:#}", e);
                return Some(PathBuf::from(&record.glob_patterns[0]));
            }
        };

        if file_set_hash(&current) == record.glob_hash {
            return None;
        }

        let changed = current
            .iter()
            .find(|(path, hash)| record.glob_files.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .or_else(|| {
                record
                    .glob_files
                    .keys()
                    .find(|path| !current.contains_key(*path))
                    .cloned()
            });
        Some(changed.unwrap_or_else(|| PathBuf::from(&record.glob_patterns[0])))
    }
}
