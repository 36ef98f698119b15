//! Kernel metadata: the top-level function and the annotated action points.
//!
//! The metadata file is line oriented:
//!
//! ```text
//! kernel_top
//! L1,loop,100
//! L2,array,buf,1,512,2,16
//! ```
//!
//! Line 1 names the top-level function, every following line describes one
//! action point. Loops carry their trip count, arrays carry their name
//! followed by `(dimension, size)` pairs.

use crate::error::{DirectiveError, DirectiveResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Loop trip count as reported by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripCount {
    Known(u64),
    Unknown,
}

impl TripCount {
    /// Returns the count only when it is known and non-zero.
    pub fn usable(self) -> Option<u64> {
        match self {
            TripCount::Known(0) | TripCount::Unknown => None,
            TripCount::Known(n) => Some(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDimension {
    pub dim: u32,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPointKind {
    Loop { trip_count: TripCount },
    Array {
        name: String,
        dimensions: Vec<ArrayDimension>,
    },
}

/// A source location eligible for one synthesis directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoint {
    /// 1-based position in the metadata file; matches the `L<k>` marker.
    pub ordinal: usize,
    /// Identifier as written in the metadata file.
    pub label: String,
    pub kind: ActionPointKind,
}

impl ActionPoint {
    pub fn marker(&self) -> String {
        format!("L{}", self.ordinal)
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, ActionPointKind::Loop { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelMetadata {
    pub top_function: String,
    pub action_points: Vec<ActionPoint>,
}

impl KernelMetadata {
    pub fn load(path: &Path) -> DirectiveResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| DirectiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> DirectiveResult<Self> {
        let mut lines = text.lines().enumerate();

        let top_function = lines
            .next()
            .map(|(_, line)| line.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(DirectiveError::MissingTopFunction)?;

        let mut action_points = Vec::new();
        for (idx, raw) in lines {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let ordinal = action_points.len() + 1;
            action_points.push(parse_action_point(line_no, ordinal, line)?);
        }

        Ok(Self {
            top_function,
            action_points,
        })
    }

    pub fn len(&self) -> usize {
        self.action_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_points.is_empty()
    }
}

fn parse_action_point(line_no: usize, ordinal: usize, line: &str) -> DirectiveResult<ActionPoint> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(DirectiveError::Malformed {
            line: line_no,
            detail: "expected `id,kind,params...`".into(),
        });
    }

    let label = parts[0].to_string();
    let kind = match parts[1] {
        "loop" => ActionPointKind::Loop {
            trip_count: parse_trip_count(line_no, parts.get(2).copied())?,
        },
        "array" => {
            let name = parts
                .get(2)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| DirectiveError::Malformed {
                    line: line_no,
                    detail: "array action point is missing its variable name".into(),
                })?
                .to_string();

            let pairs = &parts[3..];
            if pairs.is_empty() || pairs.len() % 2 != 0 {
                return Err(DirectiveError::Malformed {
                    line: line_no,
                    detail: format!(
                        "array `{}` needs (dimension, size) pairs, got {} values",
                        name,
                        pairs.len()
                    ),
                });
            }

            let dimensions = pairs
                .chunks(2)
                .map(|pair| {
                    Ok(ArrayDimension {
                        dim: parse_dimension(line_no, pair[0])?,
                        size: parse_count(line_no, pair[1])?,
                    })
                })
                .collect::<DirectiveResult<Vec<_>>>()?;

            ActionPointKind::Array { name, dimensions }
        }
        other => {
            return Err(DirectiveError::UnknownKind {
                line: line_no,
                kind: other.to_string(),
            })
        }
    };

    Ok(ActionPoint {
        ordinal,
        label,
        kind,
    })
}

fn parse_trip_count(line_no: usize, raw: Option<&str>) -> DirectiveResult<TripCount> {
    match raw {
        None | Some("") | Some("?") => Ok(TripCount::Unknown),
        Some(value) => parse_count(line_no, value).map(TripCount::Known),
    }
}

fn parse_dimension(line_no: usize, value: &str) -> DirectiveResult<u32> {
    u32::try_from(parse_count(line_no, value)?).map_err(|_| DirectiveError::InvalidCount {
        line: line_no,
        value: value.to_string(),
    })
}

fn parse_count(line_no: usize, value: &str) -> DirectiveResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| DirectiveError::InvalidCount {
            line: line_no,
            value: value.to_string(),
        })
}
