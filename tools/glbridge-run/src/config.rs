//! Run configuration file.
//!
//! ```toml
//! [bridge]
//! entry_export = "main"
//! trap_unknown_imports = true
//!
//! [graphics]
//! renderer = "ANGLE (test)"
//! extensions = ["EXT_color_buffer_float"]
//! ```

use std::path::Path;

use glbridge_runtime::graphics::{consts, HeadlessContext};
use glbridge_runtime::BridgeConfig;
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::RunError;

/// Everything the CLI configures, before command-line overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub bridge: BridgeConfig,
    pub graphics: GraphicsConfig,
}

/// Parameters the headless context reports instead of its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphicsConfig {
    pub vendor: Option<String>,
    pub renderer: Option<String>,
    pub version: Option<String>,
    pub shading_language_version: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub max_texture_size: Option<i32>,
    pub max_vertex_attribs: Option<i32>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| RunError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer command-line flags over the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(entry) = &cli.entry {
            self.bridge.entry_export = entry.clone();
        }
        if let Some(pages) = cli.pages {
            self.bridge.initial_memory_pages = pages;
            self.bridge.maximum_memory_pages = pages;
        }
        self.bridge.trace_imports |= cli.trace_imports;
        self.bridge.trap_unknown_imports |= cli.trap_unknown_imports;
    }
}

impl GraphicsConfig {
    pub fn build_context(&self) -> HeadlessContext {
        let mut context = HeadlessContext::new();
        let strings = [
            (consts::VENDOR, &self.vendor),
            (consts::RENDERER, &self.renderer),
            (consts::VERSION, &self.version),
            (consts::SHADING_LANGUAGE_VERSION, &self.shading_language_version),
        ];
        for (pname, value) in strings {
            if let Some(value) = value {
                context.set_parameter_string(pname, value);
            }
        }
        if let Some(extensions) = &self.extensions {
            let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
            context.set_extensions(&extensions);
        }
        if let Some(size) = self.max_texture_size {
            context.set_parameter_i32(consts::MAX_TEXTURE_SIZE, size);
        }
        if let Some(attribs) = self.max_vertex_attribs {
            context.set_parameter_i32(consts::MAX_VERTEX_ATTRIBS, attribs);
        }
        context
    }
}
