//! Named `<name>.json.gz` caches of clustering stats.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};
use crate::natsort::{natural_cmp, natural_sort};
use crate::stats::RawStats;

pub const CACHE_EXT: &str = ".json.gz";
pub const DEFAULT_COMPRESSION: u32 = 9;

/// A directory holding cache files.
#[derive(Debug, Clone)]
pub struct CacheDir {
    path: PathBuf,
    compression: u32,
}

impl CacheDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: DEFAULT_COMPRESSION,
        }
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level.min(9);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}{}", name, CACHE_EXT))
    }

    /// Names `N` such that `N.json.gz` is a file directly in this directory.
    /// Order follows the directory listing; callers sort when it matters.
    pub fn list(&self) -> Result<Vec<String>, CacheError> {
        let entries =
            fs::read_dir(&self.path).map_err(|e| CacheError::from_io(self.path.clone(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::from_io(self.path.clone(), e))?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(CACHE_EXT) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Writes `data` to `<name>.json.gz`, replacing any existing file.
    pub fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<PathBuf, CacheError> {
        let path = self.file_path(name);
        let file = File::create(&path).map_err(|e| CacheError::from_io(path.clone(), e))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::new(self.compression));
        serde_json::to_writer(&mut encoder, data).map_err(|e| {
            if e.is_io() {
                CacheError::from_io(path.clone(), e.into())
            } else {
                CacheError::Encode {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        let mut writer = encoder
            .finish()
            .map_err(|e| CacheError::from_io(path.clone(), e))?;
        writer
            .flush()
            .map_err(|e| CacheError::from_io(path.clone(), e))?;

        logging::info(
            Domain::Cache,
            "cache.saved",
            obj(&[
                ("msg", v_str(&format!("Saved data to {}", path.display()))),
                ("path", v_str(&path.to_string_lossy())),
            ]),
        );
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, CacheError> {
        let path = self.file_path(name);
        let file = File::open(&path).map_err(|e| CacheError::from_io(path.clone(), e))?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| CacheError::Decode {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&null_nonfinite(&json)).map_err(|e| CacheError::Decode {
            path,
            reason: e.to_string(),
        })
    }

    pub fn load_stats(&self, name: &str) -> Result<RawStats, CacheError> {
        self.load(name)
    }
}

/// Rewrites the bare `NaN`, `Infinity` and `-Infinity` tokens some producers
/// emit into `null`. String contents are left untouched.
fn null_nonfinite(json: &[u8]) -> Cow<'_, [u8]> {
    const TOKENS: [&[u8]; 3] = [b"-Infinity", b"Infinity", b"NaN"];
    let mut out: Option<Vec<u8>> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < json.len() {
        let b = json[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|t| json[i..].starts_with(t)) {
            out.get_or_insert_with(|| json[..i].to_vec())
                .extend_from_slice(b"null");
            i += token.len();
            continue;
        }
        if let Some(buf) = out.as_mut() {
            buf.push(b);
        }
        i += 1;
    }
    match out {
        Some(buf) => Cow::Owned(buf),
        None => Cow::Borrowed(json),
    }
}

/// A subdirectory of the base path holding at least one cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    /// Cache names, naturally sorted.
    pub names: Vec<String>,
}

impl Source {
    /// A single directory used as a source, whatever its parent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let mut names = CacheDir::new(&path).list()?;
        natural_sort(&mut names);
        Ok(Self { path, names })
    }

    pub fn cache_dir(&self) -> CacheDir {
        CacheDir::new(&self.path)
    }

    /// Loads every cache and merges them by key; on collision the
    /// later name (in natural order) wins.
    pub fn load_raw(&self) -> Result<RawStats, CacheError> {
        let _scope = ProfileScope::with_context(
            "load_source",
            &[("path", v_str(&self.path.to_string_lossy()))],
        );
        let dir = self.cache_dir();
        let mut merged = RawStats::new();
        for name in &self.names {
            let stats = dir.load_stats(name)?;
            logging::debug(
                Domain::Cache,
                "cache.loaded",
                obj(&[("name", v_str(name)), ("records", v_num(stats.len() as f64))]),
            );
            merged.extend(stats);
        }
        Ok(merged)
    }

    /// SHA-256 over the cache files' bytes in name order.
    pub fn fingerprint(&self) -> Result<String, CacheError> {
        let dir = self.cache_dir();
        let mut hasher = Sha256::new();
        for name in &self.names {
            let path = dir.file_path(name);
            let mut file = File::open(&path).map_err(|e| CacheError::from_io(path.clone(), e))?;
            let mut buf = [0u8; 8192];
            loop {
                let n = file
                    .read(&mut buf)
                    .map_err(|e| CacheError::from_io(path.clone(), e))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Subdirectories of `base` that contain cache files, naturally sorted by path.
pub fn discover_sources(base: &Path) -> Result<Vec<Source>, CacheError> {
    let entries = fs::read_dir(base).map_err(|e| CacheError::from_io(base.to_path_buf(), e))?;
    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CacheError::from_io(base.to_path_buf(), e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let mut names = CacheDir::new(&path).list()?;
        if names.is_empty() {
            continue;
        }
        natural_sort(&mut names);
        sources.push(Source { path, names });
    }
    sources.sort_by(|a, b| natural_cmp(&a.path.to_string_lossy(), &b.path.to_string_lossy()));
    logging::debug(
        Domain::Cache,
        "sources.discovered",
        obj(&[
            ("base", v_str(&base.to_string_lossy())),
            ("count", v_num(sources.len() as f64)),
        ]),
    );
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RunValues;
    use tempfile::TempDir;

    #[test]
    fn nonfinite_tokens_become_null() {
        let json = br#"{"NaN \"Infinity\"": [NaN, -Infinity, Infinity, 1.5]}"#;
        let rewritten = null_nonfinite(json);
        assert_eq!(
            std::str::from_utf8(&rewritten).unwrap(),
            r#"{"NaN \"Infinity\"": [null, null, null, 1.5]}"#
        );
        assert!(matches!(null_nonfinite(b"[1.0]"), Cow::Borrowed(_)));
    }

    #[test]
    fn list_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json.gz"), b"").unwrap();
        fs::write(dir.path().join("b.json"), b"").unwrap();
        fs::write(dir.path().join("c.gz"), b"").unwrap();
        fs::write(dir.path().join(".json.gz"), b"").unwrap();
        fs::create_dir(dir.path().join("d.json.gz")).unwrap();

        let names = CacheDir::new(dir.path()).list().unwrap();
        assert_eq!(names, vec!["a".to_string()]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CacheDir::new(dir.path()).load_stats("absent").unwrap_err();
        assert!(matches!(err, CacheError::NotFound { .. }));
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json.gz"), b"not gzip at all").unwrap();
        let err = CacheDir::new(dir.path()).load_stats("bad").unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn save_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = CacheDir::new(dir.path());
        let mut first = RawStats::new();
        first.insert("a_b_c_d_e".into(), [("silhouette".to_string(), RunValues(vec![1.0]))].into());
        cache.save("x", &first).unwrap();
        let second = RawStats::new();
        cache.save("x", &second).unwrap();
        assert!(cache.load_stats("x").unwrap().is_empty());
    }
}
