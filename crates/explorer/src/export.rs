//! Writes the final Pareto front to disk.
//!
//! Nothing is synthesized here; objectives come from the evaluations the
//! search already collected.

use crate::adapter::Evaluation;
use anyhow::{Context, Result};
use hlsforge_directives::{apply_all, Configuration, DirectiveSpace};
use hlsforge_synth::MetricVector;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const SUMMARY_FILE: &str = "info.csv";
pub const FRONT_FILE: &str = "front.json";
pub const SUMMARY_HEADER: &str = "name, latency, bram_util, dsp_util, ff_util, lut_util, uram_util";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontEntry {
    pub name: String,
    pub config: Configuration,
    pub directives: Vec<String>,
    pub objectives: MetricVector,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub sources: Vec<PathBuf>,
    pub entries: Vec<FrontEntry>,
}

pub struct ParetoExporter {
    space: Arc<DirectiveSpace>,
    source: String,
    extension: String,
}

impl ParetoExporter {
    pub fn new(space: Arc<DirectiveSpace>, source: String, extension: impl Into<String>) -> Self {
        Self {
            space,
            source,
            extension: extension.into(),
        }
    }

    /// Replace `dir` with one `optimized_<i>` source per front point,
    /// `info.csv` and `front.json`.
    pub fn export(&self, front: &[Evaluation], dir: &Path) -> Result<ExportSummary> {
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("clearing output dir {}", dir.display()))?;
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output dir {}", dir.display()))?;

        let mut summary = String::from(SUMMARY_HEADER);
        summary.push('\n');
        let mut sources = Vec::with_capacity(front.len());
        let mut entries = Vec::with_capacity(front.len());

        for (i, eval) in front.iter().enumerate() {
            let name = format!("optimized_{}{}", i + 1, self.extension);
            let directives = self.space.resolve(&eval.config)?;
            let applied = apply_all(&self.source, &directives);
            if applied.inserted != directives.len() {
                warn!(
                    name = %name,
                    expected = directives.len(),
                    inserted = applied.inserted,
                    "not every directive found its marker"
                );
            }

            let path = dir.join(&name);
            fs::write(&path, &applied.text)
                .with_context(|| format!("writing {}", path.display()))?;

            let values = eval.objectives.to_array();
            let _ = write!(summary, "{}", name);
            for value in values {
                let _ = write!(summary, ", {:?}", value);
            }
            summary.push('\n');

            entries.push(FrontEntry {
                name,
                config: eval.config.clone(),
                directives: directives.iter().map(|d| d.to_string()).collect(),
                objectives: eval.objectives,
            });
            sources.push(path);
        }

        let summary_path = dir.join(SUMMARY_FILE);
        fs::write(&summary_path, summary)
            .with_context(|| format!("writing {}", summary_path.display()))?;

        let front_path = dir.join(FRONT_FILE);
        fs::write(&front_path, serde_json::to_vec_pretty(&entries)?)
            .with_context(|| format!("writing {}", front_path.display()))?;

        info!(dir = %dir.display(), points = entries.len(), "exported pareto front");
        Ok(ExportSummary {
            dir: dir.to_path_buf(),
            sources,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsforge_directives::{KernelMetadata, SpaceLimits};

    const SOURCE: &str = "void top() {\n  for (;;) { // L1\n  }\n  for (;;) { // L2\n  }\n}\n";

    fn exporter() -> ParetoExporter {
        let meta = KernelMetadata::parse("top\nL1,loop,?\nL2,loop,8\n").unwrap();
        let space = DirectiveSpace::build(&meta, &SpaceLimits::default()).unwrap();
        ParetoExporter::new(Arc::new(space), SOURCE.to_string(), ".cpp")
    }

    #[test]
    fn writes_sources_summary_and_front() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("optimized");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.txt"), "old").unwrap();

        let front = vec![
            Evaluation::new(
                Configuration::new(vec![1, 2]),
                MetricVector::from_array([0.5, 12.0, 0.0, 3.5, 7.0, 0.0]),
            ),
            Evaluation::new(
                Configuration::new(vec![0, 0]),
                MetricVector::from_array([2.0, 1.0, 0.0, 1.0, 2.0, 0.0]),
            ),
        ];
        let summary = exporter().export(&front, &out).unwrap();

        assert!(!out.join("stale.txt").exists());
        assert_eq!(summary.sources.len(), 2);

        let first = fs::read_to_string(out.join("optimized_1.cpp")).unwrap();
        assert!(first.contains("// L1\n#pragma HLS pipeline II=1\n"));
        assert!(first.contains("// L2\n#pragma HLS unroll\n"));

        let csv = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], SUMMARY_HEADER);
        assert_eq!(lines[1], "optimized_1.cpp, 0.5, 12.0, 0.0, 3.5, 7.0, 0.0");
        assert_eq!(lines[2], "optimized_2.cpp, 2.0, 1.0, 0.0, 1.0, 2.0, 0.0");

        let entries: Vec<FrontEntry> =
            serde_json::from_slice(&fs::read(out.join(FRONT_FILE)).unwrap()).unwrap();
        assert_eq!(entries, summary.entries);
        assert_eq!(entries[1].directives[0], "#pragma HLS pipeline");
    }

    #[test]
    fn empty_front_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        exporter().export(&[], &out).unwrap();
        let csv = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        assert_eq!(csv, format!("{}\n", SUMMARY_HEADER));
    }
}
