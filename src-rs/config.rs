use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::command::{Direction, Method, DEFAULT_PROGRAM};
use crate::naming::NamingPolicy;

pub const CONFIG_ENV: &str = "PIXI_CONFIG";
pub const TOOL_ENV: &str = "PIXI_TOOL";

pub const DEFAULT_SUFFIX_BASE: &str = "-pixi";
pub const DEFAULT_MAX_SELECTION_SIZE: u64 = 10_000;
/// Slider range offered by the host UI: (min, max, step).
pub const MAX_SELECTION_SIZE_RANGE: (u64, u64, u64) = (10_000, 400_000, 100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub program: String,
    pub method: Method,
    pub direction: Direction,
    pub max_selection_size: u64,
    pub naming: NamingPolicy,
    pub suffix_base: String,
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            method: Method::Linear,
            direction: Direction::TwoD,
            max_selection_size: DEFAULT_MAX_SELECTION_SIZE,
            naming: NamingPolicy::CoordsSuffix,
            suffix_base: DEFAULT_SUFFIX_BASE.to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads from `path`, else from `$PIXI_CONFIG`, else defaults, then
    /// applies `$PIXI_TOOL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(|| {
            env::var(CONFIG_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        });

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let config = config.with_tool_override(env::var(TOOL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("config not found: {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config JSON: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn with_tool_override(mut self, tool: Option<String>) -> Self {
        if let Some(tool) = tool.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            self.program = tool;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_selection_size == 0 {
            bail!("max_selection_size must be a positive pixel count");
        }
        if self.program.trim().is_empty() {
            bail!("program must name the jpegpixi executable");
        }
        if self.suffix_base.is_empty() {
            tracing::warn!("empty suffix_base: target names may collide with the source");
        }
        Ok(())
    }
}

/// Choices the host registration layer should offer, with their defaults.
/// `rect_coords_hex` stays off the list; it is reachable from the CLI only.
pub fn option_schema() -> Value {
    let defaults = Config::default();
    let (min, max, step) = MAX_SELECTION_SIZE_RANGE;
    json!({
        "menu_path": "<Image>/Filters/Blur/_jpegpixi",
        "image_types": "RGB*, GRAY*",
        "options": [
            {
                "name": "method",
                "kind": "radio",
                "label": "Interpolation method",
                "default": defaults.method.as_str(),
                "choices": [
                    {"label": "average", "value": Method::Average.as_str()},
                    {"label": "linear", "value": Method::Linear.as_str()},
                    {"label": "quadratic", "value": Method::Quadratic.as_str()},
                    {"label": "cubic", "value": Method::Cubic.as_str()}
                ]
            },
            {
                "name": "direction",
                "kind": "radio",
                "label": "Direction",
                "default": defaults.direction.as_str(),
                "choices": [
                    {"label": "2d", "value": Direction::TwoD.as_str()},
                    {"label": "1d vertical", "value": Direction::Vertical.as_str()},
                    {"label": "1d horizontal", "value": Direction::Horizontal.as_str()}
                ]
            },
            {
                "name": "max_selection_size",
                "kind": "slider",
                "label": "Max. sel. size",
                "default": defaults.max_selection_size,
                "min": min,
                "max": max,
                "step": step
            },
            {
                "name": "naming",
                "kind": "radio",
                "label": "Target file naming",
                "default": defaults.naming.as_str(),
                "choices": [
                    {"label": "Coords+dims", "value": NamingPolicy::CoordsSuffix.as_str()},
                    {"label": "add suffix (like CropGUI)", "value": NamingPolicy::PlainSuffix.as_str()},
                    {"label": "increment number at suffix", "value": NamingPolicy::IncrementalSuffix.as_str()}
                ]
            },
            {
                "name": "suffix_base",
                "kind": "string",
                "label": "Filename suffix base",
                "default": defaults.suffix_base
            }
        ]
    })
}
