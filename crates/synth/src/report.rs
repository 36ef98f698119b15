//! Parsing of the tool's `solution1_data.json` report.

use crate::metrics::{MetricVector, UNDEFINED_LATENCY_MS};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report is missing `{0}`")]
    MissingField(String),
}

/// Location of the report inside a project directory.
pub fn report_path(project_dir: &Path, solution: &str) -> PathBuf {
    project_dir
        .join(solution)
        .join(format!("{}_data.json", solution))
}

pub fn load_report(path: &Path, top_function: &str) -> Result<MetricVector, ReportError> {
    let text = fs::read_to_string(path).map_err(|source| ReportError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&text, top_function)
}

/// Latency is `cycles * period_ns / 1e6`, i.e. milliseconds. A latency the
/// tool could not determine maps to [`UNDEFINED_LATENCY_MS`]; utilization
/// placeholders such as `~0` read as zero.
pub fn parse_report(text: &str, top_function: &str) -> Result<MetricVector, ReportError> {
    let root: Value = serde_json::from_str(text)?;

    let clock = field(&root, &["ClockInfo"])?;
    let latency = match (
        numeric(field(clock, &["Latency"])?),
        numeric(field(clock, &["ClockPeriod"])?),
    ) {
        (Some(cycles), Some(period)) => cycles * period / 1_000_000.0,
        _ => UNDEFINED_LATENCY_MS,
    };

    let area = field(&root, &["ModuleInfo", "Metrics", top_function, "Area"])?;
    let utilization = |key: &str| -> Result<f64, ReportError> {
        let value = field(area, &[key])?;
        Ok(numeric(value).unwrap_or(0.0))
    };

    Ok(MetricVector {
        latency,
        util_bram: utilization("UTIL_BRAM")?,
        util_dsp: utilization("UTIL_DSP")?,
        util_ff: utilization("UTIL_FF")?,
        util_lut: utilization("UTIL_LUT")?,
        util_uram: utilization("UTIL_URAM")?,
    })
}

fn field<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value, ReportError> {
    path.iter().try_fold(root, |node, key| {
        node.get(*key)
            .ok_or_else(|| ReportError::MissingField(path.join(".")))
    })
}

/// Numbers may be JSON numbers or numeric strings; anything else is `None`.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(latency: &str, period: &str) -> String {
        format!(
            r#"{{
                "ClockInfo": {{"Latency": {latency}, "ClockPeriod": {period}}},
                "ModuleInfo": {{"Metrics": {{"knn": {{"Area": {{
                    "UTIL_BRAM": "12", "UTIL_DSP": "~0", "UTIL_FF": "7",
                    "UTIL_LUT": 31, "UTIL_URAM": "0"
                }}}}}}}}
            }}"#
        )
    }

    #[test]
    fn latency_is_cycles_times_period_in_ms() {
        let metrics = parse_report(&report("\"300000\"", "\"3.330\""), "knn").unwrap();
        assert!((metrics.latency - 0.999).abs() < 1e-9);
        assert_eq!(metrics.util_bram, 12.0);
        assert_eq!(metrics.util_dsp, 0.0);
        assert_eq!(metrics.util_ff, 7.0);
        assert_eq!(metrics.util_lut, 31.0);
        assert_eq!(metrics.util_uram, 0.0);
    }

    #[test]
    fn undefined_latency_uses_its_own_sentinel() {
        let metrics = parse_report(&report("\"undef\"", "\"3.33\""), "knn").unwrap();
        assert_eq!(metrics.latency, UNDEFINED_LATENCY_MS);
        assert!(metrics.has_undefined_latency());
        assert_eq!(metrics.util_bram, 12.0);
        assert!(!metrics.is_failure());
    }

    #[test]
    fn missing_fields_are_errors() {
        let err = parse_report(&report("1", "2"), "other_top").unwrap_err();
        assert!(matches!(err, ReportError::MissingField(ref f) if f.contains("other_top")));

        let err = parse_report("{\"ModuleInfo\": {}}", "knn").unwrap_err();
        assert!(matches!(err, ReportError::MissingField(ref f) if f == "ClockInfo"));

        assert!(matches!(parse_report("not json", "knn"), Err(ReportError::Json(_))));
    }

    #[test]
    fn report_path_follows_solution_layout() {
        let path = report_path(Path::new("work/hls_dse_3"), "solution1");
        assert_eq!(path, Path::new("work/hls_dse_3/solution1/solution1_data.json"));
    }
}
