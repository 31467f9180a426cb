//! Job files: a mesh plus the parameters to plan it with.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use millpath_cam::{Tool, UserParams};
use millpath_mesh::Mesh;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One planning request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    /// Part surface.
    pub mesh: Mesh,
    /// Planning settings. Missing fields take their defaults.
    #[serde(default)]
    pub params: UserParams,
    /// Tool settings the job file spelled out.
    #[serde(skip)]
    pub explicit: ExplicitToolSettings,
}

/// Which tool-dependent settings a job file sets itself. A library tool
/// only fills in the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplicitToolSettings {
    /// `params.tool_diameter` is present.
    pub tool_diameter: bool,
    /// `params.cutter` is present.
    pub cutter: bool,
    /// `params.step_over` is present.
    pub step_over: bool,
    /// `params.max_depth_per_pass` is present.
    pub max_depth_per_pass: bool,
}

#[derive(Default, Deserialize)]
struct JobKeys {
    #[serde(default)]
    params: ParamKeys,
}

#[derive(Default, Deserialize)]
struct ParamKeys {
    tool_diameter: Option<IgnoredAny>,
    cutter: Option<IgnoredAny>,
    step_over: Option<IgnoredAny>,
    max_depth_per_pass: Option<IgnoredAny>,
}

impl From<JobKeys> for ExplicitToolSettings {
    fn from(keys: JobKeys) -> Self {
        Self {
            tool_diameter: keys.params.tool_diameter.is_some(),
            cutter: keys.params.cutter.is_some(),
            step_over: keys.params.step_over.is_some(),
            max_depth_per_pass: keys.params.max_depth_per_pass.is_some(),
        }
    }
}

impl Job {
    /// Load a job from `.json` or `.toml`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read job file {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let job = Self::parse(&text, &ext).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(job)
    }

    /// Parse job text in the format named by `ext`.
    pub fn parse(text: &str, ext: &str) -> Result<Self> {
        let (mut job, keys): (Job, JobKeys) = match ext {
            "json" => (serde_json::from_str(text)?, serde_json::from_str(text)?),
            "toml" => (toml::from_str(text)?, toml::from_str(text)?),
            other => bail!("unknown job format: {other:?} (expected .json or .toml)"),
        };
        job.explicit = keys.into();
        if job.mesh.normals.len() != job.mesh.positions.len() {
            job.mesh.recompute_normals();
        }
        Ok(job)
    }

    /// Take diameter, tip shape, stepover and depth from a library tool
    /// wherever the job file left them unset.
    pub fn apply_tool(&mut self, tool: &Tool) {
        let params = &mut self.params;
        if !self.explicit.tool_diameter {
            params.tool_diameter = tool.diameter_mm;
        }
        if !self.explicit.cutter {
            params.cutter = tool.cutter_type();
        }
        if !self.explicit.step_over {
            params.step_over = tool.recommended_step_over_mm();
        }
        if !self.explicit.max_depth_per_pass {
            params.max_depth_per_pass = tool.recommended_max_depth_mm();
        }
        info!(
            tool = %tool.id,
            diameter = params.tool_diameter,
            step_over = params.step_over,
            max_depth = params.max_depth_per_pass,
            "tool applied"
        );
    }
}
