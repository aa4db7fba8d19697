// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PkgwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PkgwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.resolve, raw.build, raw.engine))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_out_dir(&cfg.build.out_dir)?;
    validate_targets(cfg)?;
    validate_engine(cfg)?;
    validate_allow_list(cfg)?;
    Ok(())
}

fn validate_out_dir(out_dir: &str) -> Result<()> {
    if out_dir.trim().is_empty() {
        return Err(PkgwatchError::ConfigError(
            "[build].out_dir must not be empty".to_string(),
        ));
    }

    let path = Path::new(out_dir);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes {
        return Err(PkgwatchError::ConfigError(format!(
            "[build].out_dir must be a relative path inside the package (got '{}')",
            out_dir
        )));
    }

    Ok(())
}

fn validate_targets(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.default_targets.is_empty() {
        return Err(PkgwatchError::ConfigError(
            "[build].default_targets must list at least one target".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for target in &cfg.build.default_targets {
        if !seen.insert(*target) {
            return Err(PkgwatchError::ConfigError(format!(
                "[build].default_targets lists '{}' more than once",
                target
            )));
        }
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.command.trim().is_empty() {
        return Err(PkgwatchError::ConfigError(
            "[engine].command must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_allow_list(cfg: &RawConfigFile) -> Result<()> {
    if cfg
        .resolve
        .allow_unresolvable
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(PkgwatchError::ConfigError(
            "[resolve].allow_unresolvable contains an empty module name".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildTarget;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.build.out_dir, "dist");
        assert!(cfg.build.clean_out_dir);
        assert_eq!(cfg.build.default_targets, vec![BuildTarget::Cjs]);
        assert!(cfg.resolve.allow_unresolvable.is_empty());
    }

    #[test]
    fn rejects_escaping_out_dir() {
        let err = parse("[build]\nout_dir = \"../elsewhere\"\n").unwrap_err();
        assert!(matches!(err, PkgwatchError::ConfigError(msg) if msg.contains("relative")));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let err = parse("[build]\ndefault_targets = [\"cjs\", \"esm\", \"cjs\"]\n").unwrap_err();
        assert!(matches!(err, PkgwatchError::ConfigError(msg) if msg.contains("more than once")));
    }

    #[test]
    fn rejects_unknown_target_at_parse_time() {
        let err = parse("[build]\ndefault_targets = [\"iife\"]\n").unwrap_err();
        assert!(matches!(err, PkgwatchError::TomlError(_)));
    }

    #[test]
    fn rejects_blank_engine_command() {
        let err = parse("[engine]\ncommand = \"  \"\n").unwrap_err();
        assert!(matches!(err, PkgwatchError::ConfigError(_)));
    }
}
