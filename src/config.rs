use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::nullability::{DEFAULT_NOT_NULL_ANNOTATIONS, DEFAULT_NULLABLE_ANNOTATIONS};

/// Default number of visited states before a procedure is abandoned.
pub const DEFAULT_MAX_STATES: usize = 50_000;

/// Analysis settings, loadable from a JSON file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub max_states: usize,
    /// Report possibly-null arguments passed to unannotated parameters.
    pub report_unannotated: bool,
    pub nullable_annotations: Vec<String>,
    pub not_null_annotations: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_states: DEFAULT_MAX_STATES,
            report_unannotated: false,
            nullable_annotations: DEFAULT_NULLABLE_ANNOTATIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            not_null_annotations: DEFAULT_NOT_NULL_ANNOTATIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
        serde_path_to_error::deserialize(&mut deserializer)
            .with_context(|| format!("parse config {}", path.display()))
    }
}

/// Returns whether per-instruction visitor logging is enabled.
pub(crate) fn visitor_debug_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("NULLFLOW_DEBUG_VISITOR")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
