use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::loader::parquet_files_in;

pub const DEFAULT_PARTITION_PREFIX: &str = "sym_root=";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("reading manifest {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing manifest {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing manifest JSON")]
    Json(#[from] serde_json::Error),

    #[error("serializing manifest")]
    Serialize(#[source] serde_json::Error),

    #[error("expected a JSON array of paths or an object of name -> path, got {0}")]
    InvalidShape(&'static str),

    #[error("manifest entry {entry} is not a string")]
    NonString { entry: String },

    #[error("manifest entry {entry} is an empty path")]
    EmptyEntry { entry: String },

    #[error("scanning partition root {}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Ordered list of partition locations for one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    partitions: Vec<String>,
}

impl Manifest {
    /// Build a manifest, rejecting empty locations.
    pub fn new(partitions: Vec<String>) -> Result<Self, ManifestError> {
        if let Some(i) = partitions.iter().position(|p| p.is_empty()) {
            return Err(ManifestError::EmptyEntry {
                entry: format!("#{i}"),
            });
        }
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Load a manifest from a JSON file.  See [`Manifest::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a manifest document.  Two shapes are accepted:
    ///
    /// ```json
    /// ["data/sym_root=A/part-0.parquet", "data/sym_root=B/part-0.parquet"]
    /// ```
    ///
    /// or a partition-name -> path object, taken in key order:
    ///
    /// ```json
    /// { "A": "data/sym_root=A/part-0.parquet", "B": "data/sym_root=B/part-0.parquet" }
    /// ```
    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        let root: JsonValue = serde_json::from_str(text)?;

        let partitions = match &root {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| entry_path(v, || format!("#{i}")))
                .collect::<Result<Vec<_>, _>>()?,
            JsonValue::Object(map) => map
                .iter()
                .map(|(name, v)| entry_path(v, || format!("'{name}'")))
                .collect::<Result<Vec<_>, _>>()?,
            JsonValue::Null => return Err(ManifestError::InvalidShape("null")),
            JsonValue::Bool(_) => return Err(ManifestError::InvalidShape("a boolean")),
            JsonValue::Number(_) => return Err(ManifestError::InvalidShape("a number")),
            JsonValue::String(_) => return Err(ManifestError::InvalidShape("a string")),
        };

        Ok(Self { partitions })
    }

    /// Write the manifest as a pretty JSON array.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let text = serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)?;
        std::fs::write(path, text + "\n").map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn entry_path(value: &JsonValue, label: impl Fn() -> String) -> Result<String, ManifestError> {
    let path = value
        .as_str()
        .ok_or_else(|| ManifestError::NonString { entry: label() })?;
    if path.is_empty() {
        return Err(ManifestError::EmptyEntry { entry: label() });
    }
    Ok(path.to_string())
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// One partition found under a dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPartition {
    /// Directory name with the prefix removed (`sym_root=AAPL` -> `AAPL`).
    pub name: String,
    pub path: PathBuf,
}

/// Find partition directories under `root` whose names start with `prefix`
/// and pick the first Parquet file (by name) in each.  Results are ordered
/// by partition name.  Directories without a Parquet file are skipped.
pub fn discover_partitions(
    root: &Path,
    prefix: &str,
) -> Result<Vec<DiscoveredPartition>, ManifestError> {
    let discovery = |source: io::Error| ManifestError::Discovery {
        path: root.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(root).map_err(discovery)? {
        let entry = entry.map_err(discovery)?;
        let dir = entry.path();
        let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(name) = dir_name.strip_prefix(prefix) else {
            continue;
        };
        if !dir.is_dir() {
            continue;
        }

        let files = parquet_files_in(&dir).map_err(|source| ManifestError::Discovery {
            path: dir.clone(),
            source,
        })?;
        match files.into_iter().next() {
            Some(path) => found.push(DiscoveredPartition {
                name: name.to_string(),
                path,
            }),
            None => log::warn!("Skipping {}: no parquet file inside", dir.display()),
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    log::info!("Discovered {} partitions under {}", found.len(), root.display());
    Ok(found)
}

impl Manifest {
    pub fn from_discovered(partitions: &[DiscoveredPartition]) -> Self {
        Self {
            partitions: partitions
                .iter()
                .map(|p| p.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Where `discover` writes its manifest by default: next to the root, with
/// the root's extension replaced by `.json` (`trades.parquet` ->
/// `trades.json`).  A root without a final name (`.`, `..`, `/`) gets a
/// bare `.json` inside it.
pub fn default_manifest_path(root: &Path) -> PathBuf {
    match root.file_name() {
        Some(_) => root.with_extension("json"),
        None => root.join(".json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_manifest() {
        let m = Manifest::from_json_str(r#"["a.parquet", "b.parquet"]"#).unwrap();
        assert_eq!(m.partitions(), ["a.parquet", "b.parquet"]);
    }

    #[test]
    fn parses_named_manifest_in_key_order() {
        let text = r#"{"MSFT": "m.parquet", "AAPL": "a.parquet"}"#;
        let m = Manifest::from_json_str(text).unwrap();
        assert_eq!(m.partitions(), ["a.parquet", "m.parquet"]);
    }

    #[test]
    fn empty_array_is_an_empty_manifest() {
        assert!(Manifest::from_json_str("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_shapes_and_entries() {
        assert!(matches!(
            Manifest::from_json_str("42"),
            Err(ManifestError::InvalidShape("a number"))
        ));
        assert!(matches!(
            Manifest::from_json_str(r#"["a", 3]"#),
            Err(ManifestError::NonString { entry }) if entry == "#1"
        ));
        assert!(matches!(
            Manifest::from_json_str(r#"["a", ""]"#),
            Err(ManifestError::EmptyEntry { .. })
        ));
        assert!(matches!(
            Manifest::from_json_str("[\"a\""),
            Err(ManifestError::Json(_))
        ));
        assert!(Manifest::new(vec!["x".into(), String::new()]).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let m = Manifest::new(vec!["p/one.parquet".into(), "p/two.parquet".into()]).unwrap();

        m.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), m);
    }

    #[test]
    fn discovers_prefixed_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (d, files) in [
            ("sym_root=MSFT", vec!["part-1.parquet", "part-0.parquet"]),
            ("sym_root=AAPL", vec!["data.parquet", "notes.txt"]),
            ("sym_root=EMPTY", vec!["README"]),
            ("other", vec!["x.parquet"]),
        ] {
            std::fs::create_dir(root.join(d)).unwrap();
            for f in files {
                std::fs::write(root.join(d).join(f), b"").unwrap();
            }
        }

        let found = discover_partitions(root, DEFAULT_PARTITION_PREFIX).unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["AAPL", "MSFT"]);
        let first_msft = root.join("sym_root=MSFT").join("part-0.parquet");
        assert_eq!(found[1].path, first_msft);

        let manifest = Manifest::from_discovered(&found);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn default_manifest_path_replaces_extension() {
        assert_eq!(
            default_manifest_path(Path::new("data/trades.parquet")),
            PathBuf::from("data/trades.json")
        );
        assert_eq!(
            default_manifest_path(Path::new("data/trades")),
            PathBuf::from("data/trades.json")
        );
    }

    #[test]
    fn default_manifest_path_for_unnamed_roots() {
        assert_eq!(
            default_manifest_path(Path::new(".")),
            PathBuf::from("./.json")
        );
        assert_eq!(
            default_manifest_path(Path::new("/")),
            PathBuf::from("/.json")
        );
    }

    #[test]
    fn parse_and_serialize_errors_read_differently() {
        let parse = Manifest::from_json_str("[").unwrap_err();
        assert_eq!(parse.to_string(), "parsing manifest JSON");

        let cause = serde_json::from_str::<u8>("x").unwrap_err();
        let write = ManifestError::Serialize(cause);
        assert_eq!(write.to_string(), "serializing manifest");
        assert!(std::error::Error::source(&write).is_some());
    }
}
