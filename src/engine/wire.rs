// src/engine/wire.rs

//! JSON wire format spoken with an external engine process.
//!
//! pkgwatch writes one [`WireRequest`] to the engine's stdin, then reads one
//! [`WireEvent`] per stdout line:
//!
//! ```text
//! {"code":"START"}
//! {"code":"BUNDLE_START","input":["src/index.js"],"output":["dist/a.cjs.js"]}
//! {"code":"BUNDLE_END","output":["dist/a.cjs.js"],"duration":412,"exports":["default"],"originalCode":"// @flow\n..."}
//! {"code":"END"}
//! {"code":"ERROR","message":"package.json changed","recoverable":true}
//! {"code":"FATAL","message":"Unexpected token (3:7)"}
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build::BuildConfig;
use crate::package::{Aliases, Package};
use crate::session::RetrySignal;
use crate::types::{BuildTarget, EnvironmentMode, OutputFormat};

use super::{BundleMetadata, EngineEvent};

#[derive(Debug, Serialize)]
pub struct WireRequest<'a> {
    pub package: &'a str,
    pub directory: &'a PathBuf,
    pub configs: Vec<WireConfig<'a>>,
}

#[derive(Debug, Serialize)]
pub struct WireConfig<'a> {
    pub target: BuildTarget,
    pub input: &'a [PathBuf],
    pub external: WireExternal<'a>,
    pub output: Vec<WireOutput<'a>>,
    pub environment: EnvironmentMode,
    pub aliases: &'a Aliases,
}

/// The external predicate, as names plus the equivalent anchored pattern.
#[derive(Debug, Serialize)]
pub struct WireExternal<'a> {
    pub names: &'a [String],
    pub pattern: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct WireOutput<'a> {
    pub format: OutputFormat,
    pub file: &'a PathBuf,
}

impl<'a> WireRequest<'a> {
    pub fn new(package: &'a Package, configs: &'a [BuildConfig]) -> Self {
        Self {
            package: &package.name,
            directory: &package.directory,
            configs: configs
                .iter()
                .map(|config| WireConfig {
                    target: config.target,
                    input: &config.entrypoints,
                    external: WireExternal {
                        names: config.external.names(),
                        pattern: config.external.pattern_source(),
                    },
                    output: config
                        .outputs
                        .iter()
                        .map(|o| WireOutput {
                            format: o.format,
                            file: &o.file,
                        })
                        .collect(),
                    environment: config.environment,
                    aliases: &config.aliases,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireEvent {
    Start,
    BundleStart {
        #[serde(default)]
        input: Vec<PathBuf>,
        #[serde(default)]
        output: Vec<PathBuf>,
    },
    BundleEnd {
        #[serde(default)]
        output: Vec<PathBuf>,
        /// Milliseconds.
        #[serde(default)]
        duration: u64,
        #[serde(default)]
        exports: Vec<String>,
        #[serde(default, rename = "originalCode")]
        original_code: String,
    },
    End,
    Error {
        message: String,
        #[serde(default)]
        recoverable: bool,
    },
    Fatal {
        message: String,
    },
}

impl WireEvent {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Convert into an [`EngineEvent`]; `resume` is only called for
    /// recoverable errors.
    pub fn into_event(self, resume: impl FnOnce() -> RetrySignal) -> EngineEvent {
        match self {
            WireEvent::Start => EngineEvent::Start,
            WireEvent::BundleStart { input, output } => EngineEvent::BundleStart {
                inputs: input,
                outputs: output,
            },
            WireEvent::BundleEnd {
                output,
                duration,
                exports,
                original_code,
            } => EngineEvent::BundleEnd {
                outputs: output,
                duration: Duration::from_millis(duration),
                metadata: BundleMetadata {
                    entry_source: original_code,
                    exports,
                },
            },
            WireEvent::End => EngineEvent::Idle,
            WireEvent::Error {
                message,
                recoverable: true,
            } => EngineEvent::RecoverableError {
                message,
                resume: resume(),
            },
            WireEvent::Error { message, .. } | WireEvent::Fatal { message } => {
                EngineEvent::FatalError { message }
            }
        }
    }
}
