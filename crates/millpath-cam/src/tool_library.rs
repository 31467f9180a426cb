//! JSON tool library: named cutters a job can pick by id.
//!
//! The document shape is `{"tools": [{"id", "name", "type", "diameter_mm", "notes"}]}`.
//! Entries that are not objects, fail to decode, or lack an id, name or
//! positive diameter are skipped with a warning; loading fails only when
//! nothing usable remains.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CamError, Result};
use crate::tool::CutterType;

const MM_PER_INCH: f64 = 25.4;

/// One cutter from the library.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tool {
    /// Lookup key, matched case-insensitively.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form tip description, e.g. "flat" or "ball".
    #[serde(rename = "type")]
    pub kind: String,
    /// Cutter diameter (mm).
    pub diameter_mm: f64,
    /// Notes.
    pub notes: String,
}

impl Tool {
    /// Non-blank id and name with a positive diameter.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty() && self.diameter_mm > 0.0
    }

    /// 40% of the diameter.
    pub fn recommended_step_over_mm(&self) -> f64 {
        self.diameter_mm * 0.4
    }

    /// Half the diameter.
    pub fn recommended_max_depth_mm(&self) -> f64 {
        self.diameter_mm * 0.5
    }

    /// Tip shape implied by `kind`. Anything mentioning "ball" is a ball nose.
    pub fn cutter_type(&self) -> CutterType {
        if self.kind.to_ascii_lowercase().contains("ball") {
            CutterType::BallNose
        } else {
            CutterType::FlatEndMill
        }
    }

    /// Name followed by the diameter, e.g. `"6mm Flat (6.00 mm)"`.
    pub fn display_label(&self, inches: bool) -> String {
        if self.diameter_mm <= 0.0 {
            return self.name.clone();
        }
        if inches {
            format!("{} ({:.3} in)", self.name, self.diameter_mm / MM_PER_INCH)
        } else {
            format!("{} ({:.2} mm)", self.name, self.diameter_mm)
        }
    }
}

/// Validated set of tools plus the warnings raised while loading it.
#[derive(Debug, Clone, Default)]
pub struct ToolLibrary {
    tools: Vec<Tool>,
    warnings: Vec<String>,
}

impl ToolLibrary {
    /// Parse a library document.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(CamError::ToolLibrary("tool library JSON is empty".into()));
        }
        let root: Value = serde_json::from_str(text)
            .map_err(|e| CamError::ToolLibrary(format!("failed to parse tool library: {e}")))?;
        let entries = match root.get("tools").and_then(Value::as_array) {
            Some(entries) if !entries.is_empty() => entries,
            _ => return Err(CamError::ToolLibrary("tool library contains no tools".into())),
        };

        let mut library = ToolLibrary::default();
        for entry in entries {
            if !entry.is_object() {
                library.warn("skipping malformed tool entry (expected object)".into());
                continue;
            }
            let tool = match Tool::deserialize(entry) {
                Ok(tool) => tool,
                Err(e) => {
                    library.warn(format!("skipping malformed tool entry: {e}"));
                    continue;
                }
            };
            if !tool.is_valid() {
                let label = if tool.name.is_empty() { &tool.id } else { &tool.name };
                library.warn(format!("skipping invalid tool entry: {label:?}"));
                continue;
            }
            library.tools.push(tool);
        }

        if library.tools.is_empty() {
            return Err(CamError::ToolLibrary("no valid tools were loaded".into()));
        }
        debug!(
            tools = library.tools.len(),
            warnings = library.warnings.len(),
            "tool library loaded"
        );
        Ok(library)
    }

    /// Read and parse a library file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CamError::ToolLibrary(format!("unable to read tool library {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Loaded tools in document order.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Problems with skipped entries.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Tool whose id matches `id`, ignoring case.
    pub fn tool_by_id(&self, id: &str) -> Option<&Tool> {
        self.index_of(id).map(|i| &self.tools[i])
    }

    /// Position of the tool whose id matches `id`, ignoring case.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.id.eq_ignore_ascii_case(id))
    }
}
