//! TOML configuration and run settings.
//!
//! The config file is optional. Every value resolves with the precedence
//! CLI flag > environment variable > config file > built-in default; clap
//! handles the first two, [`Settings::resolve`] folds in the rest.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::IngestError;

pub const DEFAULT_SOURCE_ROOT: &str = "./source";
pub const DEFAULT_OUT_DIR: &str = "./data";
pub const DEFAULT_AUX_PARENT: &str = "extras";
pub const OVERRIDES_FILE: &str = "overrides.json";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub aux_parent: Option<String>,
    #[serde(default)]
    pub aux: Vec<AuxMount>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            aux_parent: None,
            aux: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.doc".to_string(),
        "**/*.docx".to_string(),
    ]
}

/// An auxiliary directory spliced in as `<aux_parent>/<name>`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AuxMount {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub overrides: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyConfig {
    /// Content lines included in the route haystack.
    #[serde(default = "default_route_lines")]
    pub route_lines: usize,
    /// Content lines included in the mood haystack.
    #[serde(default = "default_mood_lines")]
    pub mood_lines: usize,
    #[serde(default = "default_mood_folder_marker")]
    pub mood_folder_marker: String,
    #[serde(default = "default_mood_only_codes")]
    pub mood_only_codes: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            route_lines: default_route_lines(),
            mood_lines: default_mood_lines(),
            mood_folder_marker: default_mood_folder_marker(),
            mood_only_codes: default_mood_only_codes(),
        }
    }
}

fn default_route_lines() -> usize {
    6
}
fn default_mood_lines() -> usize {
    12
}
fn default_mood_folder_marker() -> String {
    "心情".to_string()
}
fn default_mood_only_codes() -> Vec<String> {
    vec!["05".to_string(), "06".to_string()]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub birthday: BirthdayPolicy,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BirthdayPolicy {
    #[serde(default = "default_birthday_enabled")]
    pub enabled: bool,
    #[serde(default = "default_birthday_year")]
    pub year: i32,
    #[serde(default = "default_birthday_month")]
    pub month: u32,
    /// Any of these in a birthday document's text puts it in the future bucket.
    #[serde(default = "default_future_keywords")]
    pub future_keywords: Vec<String>,
}

impl Default for BirthdayPolicy {
    fn default() -> Self {
        Self {
            enabled: default_birthday_enabled(),
            year: default_birthday_year(),
            month: default_birthday_month(),
            future_keywords: default_future_keywords(),
        }
    }
}

fn default_birthday_enabled() -> bool {
    true
}
fn default_birthday_year() -> i32 {
    2024
}
fn default_birthday_month() -> u32 {
    9
}
fn default_future_keywords() -> Vec<String> {
    vec![
        "未来".to_string(),
        "将来".to_string(),
        "明年".to_string(),
        "future".to_string(),
        "next year".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConverterConfig {
    /// External command for legacy `.doc` files, e.g. `["antiword", "{path}"]`.
    #[serde(default)]
    pub doc_command: Option<Vec<String>>,
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| IngestError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    validate(&config)?;
    Ok(config)
}

/// Load the config file if it exists. A missing file is only an error when
/// the user named it explicitly.
pub fn load_config_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<(), IngestError> {
    let classify = &config.classify;
    if classify.route_lines == 0 {
        return Err(IngestError::InvalidConfig(
            "classify.route_lines must be > 0".to_string(),
        ));
    }
    if classify.mood_lines < classify.route_lines {
        return Err(IngestError::InvalidConfig(
            "classify.mood_lines must be >= classify.route_lines".to_string(),
        ));
    }

    let birthday = &config.policy.birthday;
    if !(1..=12).contains(&birthday.month) {
        return Err(IngestError::InvalidConfig(
            "policy.birthday.month must be in 1..=12".to_string(),
        ));
    }
    if !(1900..=2099).contains(&birthday.year) {
        return Err(IngestError::InvalidConfig(
            "policy.birthday.year must be in 1900..=2099".to_string(),
        ));
    }

    for mount in &config.source.aux {
        validate_aux_name(&mount.name)?;
    }

    if let Some(cmd) = &config.converter.doc_command {
        if cmd.is_empty() {
            return Err(IngestError::InvalidConfig(
                "converter.doc_command must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

pub fn validate_aux_name(name: &str) -> Result<(), IngestError> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
        return Err(IngestError::InvalidConfig(format!(
            "auxiliary mount name '{}' must be non-empty and contain no path separators",
            name
        )));
    }
    Ok(())
}

/// Values supplied on the command line (or through their env fallbacks).
#[derive(Debug, Clone, Default)]
pub struct SourceArgs {
    pub source: Option<PathBuf>,
    pub aux: Vec<AuxMount>,
    pub aux_parent: Option<String>,
    pub out: Option<PathBuf>,
    pub overrides: Option<PathBuf>,
}

/// Fully resolved settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_root: PathBuf,
    pub aux_parent: String,
    pub aux_mounts: Vec<AuxMount>,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub out_dir: PathBuf,
    pub overrides_path: PathBuf,
    pub classify: ClassifyConfig,
    pub birthday: BirthdayPolicy,
    pub doc_command: Option<Vec<String>>,
}

impl Settings {
    pub fn resolve(config: &Config, args: SourceArgs) -> Settings {
        let source_root = args
            .source
            .or_else(|| config.source.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_ROOT));

        let out_dir = args
            .out
            .or_else(|| config.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));

        let overrides_path = args
            .overrides
            .or_else(|| config.output.overrides.clone())
            .unwrap_or_else(|| out_dir.join(OVERRIDES_FILE));

        let aux_parent = args
            .aux_parent
            .or_else(|| config.source.aux_parent.clone())
            .unwrap_or_else(|| DEFAULT_AUX_PARENT.to_string());

        // Flag mounts replace config mounts of the same name.
        let mut aux_mounts: Vec<AuxMount> = config
            .source
            .aux
            .iter()
            .filter(|m| !args.aux.iter().any(|a| a.name == m.name))
            .cloned()
            .collect();
        aux_mounts.extend(args.aux);

        Settings {
            source_root,
            aux_parent,
            aux_mounts,
            include_globs: config.source.include_globs.clone(),
            exclude_globs: config.source.exclude_globs.clone(),
            out_dir,
            overrides_path,
            classify: config.classify.clone(),
            birthday: config.policy.birthday.clone(),
            doc_command: config.converter.doc_command.clone(),
        }
    }

    /// Settings with every default and the given source/output directories.
    pub fn with_dirs(source_root: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Settings {
        Settings::resolve(
            &Config::default(),
            SourceArgs {
                source: Some(source_root.into()),
                out: Some(out_dir.into()),
                ..Default::default()
            },
        )
    }
}

/// Parse a `NAME=PATH` auxiliary mount argument.
pub fn parse_aux_mount(s: &str) -> Result<AuxMount, String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid NAME=PATH: no '=' found in '{}'", s))?;
    let name = s[..pos].trim().to_string();
    validate_aux_name(&name).map_err(|e| e.to_string())?;
    Ok(AuxMount {
        name,
        path: PathBuf::from(s[pos + 1..].trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.classify.route_lines, 6);
        assert_eq!(config.policy.birthday.month, 9);
        assert_eq!(config.source.include_globs.len(), 4);
        assert!(config.converter.doc_command.is_none());
    }

    #[test]
    fn example_config_is_valid() {
        let config: Config =
            toml::from_str(include_str!("../config/keepsake.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.source.aux[0].name, "scans");
        assert!(config.converter.doc_command.is_none());
    }

    #[test]
    fn missing_default_file_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keepsake.toml");
        assert!(load_config_or_default(&path, false).is_ok());
        assert!(load_config_or_default(&path, true).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keepsake.toml");
        std::fs::write(&path, "[policy.birthday]\nmonth = 13\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("month"));

        std::fs::write(&path, "[classify]\nroute_lines = 10\nmood_lines = 4\n").unwrap();
        assert!(load_config(&path).is_err());

        std::fs::write(&path, "[[source.aux]]\nname = \"a/b\"\npath = \"/tmp\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn cli_values_win_over_config() {
        let config: Config = toml::from_str(
            r#"
[source]
root = "/from/config"
aux_parent = "附录"

[[source.aux]]
name = "scans"
path = "/config/scans"

[[source.aux]]
name = "old"
path = "/config/old"

[output]
dir = "/config/out"
"#,
        )
        .unwrap();

        let settings = Settings::resolve(
            &config,
            SourceArgs {
                source: Some(PathBuf::from("/from/cli")),
                aux: vec![AuxMount {
                    name: "scans".to_string(),
                    path: PathBuf::from("/cli/scans"),
                }],
                ..Default::default()
            },
        );
        assert_eq!(settings.source_root, PathBuf::from("/from/cli"));
        assert_eq!(settings.out_dir, PathBuf::from("/config/out"));
        assert_eq!(
            settings.overrides_path,
            PathBuf::from("/config/out/overrides.json")
        );
        assert_eq!(settings.aux_parent, "附录");
        assert_eq!(settings.aux_mounts.len(), 2);
        assert_eq!(settings.aux_mounts[0].name, "old");
        assert_eq!(settings.aux_mounts[1].path, PathBuf::from("/cli/scans"));
    }

    #[test]
    fn parse_aux_mount_arguments() {
        let mount = parse_aux_mount("scans=/mnt/scans").unwrap();
        assert_eq!(mount.name, "scans");
        assert_eq!(mount.path, PathBuf::from("/mnt/scans"));
        assert!(parse_aux_mount("no-equals").is_err());
        assert!(parse_aux_mount("=/x").is_err());
    }
}
