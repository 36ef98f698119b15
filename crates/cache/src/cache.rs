//! Durable result cache for synthesized configurations.
//!
//! Entries live in an append-only JSON-lines journal next to an in-memory
//! index. An insert is synced to disk before it returns, so a crash loses
//! at most the candidate that was in flight. Keys are written once; later
//! inserts for the same key are ignored.

use hlsforge_directives::Configuration;
use hlsforge_synth::MetricVector;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache {path} is unavailable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache {path} is corrupt at line {line}: {detail}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Stored form of one synthesized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub latency: f64,
    pub util_bram: f64,
    pub util_dsp: f64,
    pub util_ff: f64,
    pub util_lut: f64,
    pub util_uram: f64,
    /// Wall-clock synthesis time in seconds.
    pub synth_time: f64,
}

impl CacheEntry {
    pub fn new(metrics: MetricVector, synth_time: f64) -> Self {
        Self {
            latency: metrics.latency,
            util_bram: metrics.util_bram,
            util_dsp: metrics.util_dsp,
            util_ff: metrics.util_ff,
            util_lut: metrics.util_lut,
            util_uram: metrics.util_uram,
            synth_time,
        }
    }

    pub fn metrics(&self) -> MetricVector {
        MetricVector {
            latency: self.latency,
            util_bram: self.util_bram,
            util_dsp: self.util_dsp,
            util_ff: self.util_ff,
            util_lut: self.util_lut,
            util_uram: self.util_uram,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    key: String,
    #[serde(flatten)]
    entry: CacheEntry,
}

pub struct ResultCache {
    path: PathBuf,
    index: RwLock<HashMap<String, CacheEntry>>,
    journal: Mutex<File>,
}

impl ResultCache {
    /// Open (or create) the journal at `path` and replay it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let replayed = if path.exists() {
            replay(&path)?
        } else {
            Replay::default()
        };

        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        // Appends must start on a fresh line after the last intact record.
        if replayed.valid_len < replayed.file_len {
            warn!(
                path = %path.display(),
                dropped_bytes = replayed.file_len - replayed.valid_len,
                "truncating torn final cache record"
            );
            journal.set_len(replayed.valid_len).map_err(io_err)?;
        }
        if replayed.missing_newline {
            journal.write_all(b"\n").map_err(io_err)?;
        }
        if replayed.valid_len < replayed.file_len || replayed.missing_newline {
            journal.sync_data().map_err(io_err)?;
        }

        let index = replayed.index;
        info!(path = %path.display(), entries = index.len(), "opened result cache");
        Ok(Self {
            path,
            index: RwLock::new(index),
            journal: Mutex::new(journal),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lookup(&self, config: &Configuration) -> Option<MetricVector> {
        self.index.read().get(&config.key()).map(CacheEntry::metrics)
    }

    pub fn wall_time(&self, config: &Configuration) -> Option<f64> {
        self.index.read().get(&config.key()).map(|entry| entry.synth_time)
    }

    pub fn entry(&self, config: &Configuration) -> Option<CacheEntry> {
        self.index.read().get(&config.key()).copied()
    }

    /// Record a result. Returns `false` (and writes nothing) when the key
    /// already exists.
    pub fn insert(
        &self,
        config: &Configuration,
        metrics: MetricVector,
        wall_time_secs: f64,
    ) -> Result<bool, CacheError> {
        let key = config.key();
        let entry = CacheEntry::new(metrics, wall_time_secs);

        // Hold the journal lock across check-and-append so a key is written once.
        let mut journal = self.journal.lock();
        if self.index.read().contains_key(&key) {
            debug!(key = %key, "cache entry already present");
            return Ok(false);
        }

        let mut line = serde_json::to_string(&JournalRecord {
            key: key.clone(),
            entry,
        })?;
        line.push('\n');
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        journal.write_all(line.as_bytes()).map_err(io_err)?;
        journal.sync_data().map_err(io_err)?;

        self.index.write().insert(key, entry);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Snapshot of every entry, sorted by key.
    pub fn entries(&self) -> Vec<(String, CacheEntry)> {
        let mut entries: Vec<_> = self
            .index
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), *entry))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Journal contents recovered on open.
#[derive(Debug, Default)]
struct Replay {
    index: HashMap<String, CacheEntry>,
    /// Bytes up to and including the last intact line.
    valid_len: u64,
    file_len: u64,
    /// The last intact record has no terminating newline.
    missing_newline: bool,
}

fn replay(path: &Path) -> Result<Replay, CacheError> {
    let text = fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut index = HashMap::new();
    let last = text.split_inclusive('\n').count();
    let mut offset = 0usize;
    let mut valid_len = 0usize;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += line.len();
        let record = line.trim();
        if record.is_empty() {
            valid_len = offset;
            continue;
        }
        match serde_json::from_str::<JournalRecord>(record) {
            Ok(record) => {
                index.entry(record.key).or_insert(record.entry);
                valid_len = offset;
            }
            Err(err) if idx + 1 == last => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "dropping torn final cache record"
                );
                valid_len = start;
            }
            Err(err) => {
                return Err(CacheError::Corrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    detail: err.to_string(),
                })
            }
        }
    }

    let kept = &text[..valid_len];
    Ok(Replay {
        index,
        valid_len: valid_len as u64,
        file_len: text.len() as u64,
        missing_newline: !kept.is_empty() && !kept.ends_with('\n'),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metrics(latency: f64) -> MetricVector {
        MetricVector::from_array([latency, 10.0, 20.0, 30.0, 40.0, 0.0])
    }

    #[test]
    fn insert_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::open(dir.path().join("run.jsonl")).unwrap();
        let config = Configuration::new(vec![1, 0, 2]);

        assert!(cache.lookup(&config).is_none());
        assert!(cache.insert(&config, metrics(2.5), 41.0).unwrap());
        assert_eq!(cache.lookup(&config), Some(metrics(2.5)));
        assert_eq!(cache.wall_time(&config), Some(41.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let cache = ResultCache::open(&path).unwrap();
        let config = Configuration::new(vec![3]);

        assert!(cache.insert(&config, metrics(1.0), 5.0).unwrap());
        assert!(!cache.insert(&config, metrics(9.0), 7.0).unwrap());
        assert_eq!(cache.lookup(&config), Some(metrics(1.0)));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.jsonl");
        {
            let cache = ResultCache::open(&path).unwrap();
            cache
                .insert(&Configuration::new(vec![0, 1]), MetricVector::FAILED, 3600.0)
                .unwrap();
            cache
                .insert(&Configuration::new(vec![1, 1]), metrics(0.5), 12.0)
                .unwrap();
        }
        let cache = ResultCache::open(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.lookup(&Configuration::new(vec![0, 1])),
            Some(MetricVector::FAILED)
        );
        assert_eq!(cache.wall_time(&Configuration::new(vec![1, 1])), Some(12.0));
        let keys: Vec<String> = cache.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["[0,1]", "[1,1]"]);
    }

    #[test]
    fn journal_uses_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let cache = ResultCache::open(&path).unwrap();
        cache.insert(&Configuration::new(vec![2]), metrics(1.0), 4.0).unwrap();
        let line = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["key"], "[2]");
        assert_eq!(value["util_dsp"], 20.0);
        assert_eq!(value["synth_time"], 4.0);
    }

    #[test]
    fn torn_tail_is_dropped_but_corruption_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let cache = ResultCache::open(&path).unwrap();
            cache.insert(&Configuration::new(vec![0]), metrics(1.0), 1.0).unwrap();
        }
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("{\"key\":\"[1]\",\"lat");
        fs::write(&path, &text).unwrap();
        assert_eq!(ResultCache::open(&path).unwrap().len(), 1);

        fs::write(&path, format!("garbage\n{}", text)).unwrap();
        assert!(matches!(
            ResultCache::open(&path),
            Err(CacheError::Corrupt { line: 1, .. })
        ));
    }

    #[test]
    fn inserts_after_a_torn_tail_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let cache = ResultCache::open(&path).unwrap();
            cache.insert(&Configuration::new(vec![0]), metrics(1.0), 1.0).unwrap();
        }
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("{\"key\":\"[1]\",\"lat");
        fs::write(&path, &text).unwrap();

        {
            let cache = ResultCache::open(&path).unwrap();
            assert_eq!(cache.len(), 1);
            assert!(cache.insert(&Configuration::new(vec![2]), metrics(2.0), 2.0).unwrap());
            assert!(cache.insert(&Configuration::new(vec![3]), metrics(3.0), 3.0).unwrap());
        }

        let cache = ResultCache::open(&path).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.lookup(&Configuration::new(vec![0])), Some(metrics(1.0)));
        assert_eq!(cache.lookup(&Configuration::new(vec![2])), Some(metrics(2.0)));
        assert_eq!(cache.lookup(&Configuration::new(vec![3])), Some(metrics(3.0)));
        assert!(cache.lookup(&Configuration::new(vec![1])).is_none());
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn unterminated_final_record_is_kept_and_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let cache = ResultCache::open(&path).unwrap();
            cache.insert(&Configuration::new(vec![0]), metrics(1.0), 1.0).unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.trim_end()).unwrap();

        {
            let cache = ResultCache::open(&path).unwrap();
            assert_eq!(cache.len(), 1);
            cache.insert(&Configuration::new(vec![1]), metrics(2.0), 2.0).unwrap();
        }

        let cache = ResultCache::open(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&Configuration::new(vec![1])), Some(metrics(2.0)));
    }

    #[test]
    fn concurrent_inserts_of_one_key_keep_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let cache = Arc::new(ResultCache::open(&path).unwrap());
        let config = Configuration::new(vec![7, 7]);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let config = config.clone();
                std::thread::spawn(move || cache.insert(&config, metrics(1.0), i as f64).unwrap())
            })
            .collect();
        let written = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|w| *w)
            .count();

        assert_eq!(written, 1);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
