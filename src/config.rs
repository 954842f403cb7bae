//! Project configuration for semgraph.
//!
//! A config file tunes discovery and resolution for one project. All fields
//! are optional; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Config file names searched for in the analyzed root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["semgraph.yaml", ".semgraph.yaml"];

/// Config format understood by this build. An empty `version` means current.
pub const CONFIG_VERSION: &str = "1";

/// Top-level config definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Root imports are resolved against (default: the analyzed path).
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    /// Glob patterns for paths to exclude (e.g., "**/generated/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Whether to descend into test directories (default: false)
    #[serde(default)]
    pub include_test_files: Option<bool>,
    /// Enabled language tags (default: every registered language)
    #[serde(default)]
    pub languages: Vec<String>,
    /// Upper bound on parallel workers for both passes.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Follow symlinks while walking (default: false)
    #[serde(default)]
    pub follow_links: Option<bool>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Look for a config file in `root`. Returns the defaults when none exists.
    pub fn discover(root: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        for name in DEFAULT_CONFIG_NAMES {
            let path = root.join(name);
            if path.is_file() {
                let config = Self::parse_file(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn should_include_test_files(&self) -> bool {
        self.include_test_files.unwrap_or(false)
    }

    pub fn should_follow_links(&self) -> bool {
        self.follow_links.unwrap_or(false)
    }

    /// Whether `language` is enabled. An empty list enables everything.
    pub fn language_enabled(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    /// Compile `excluded_paths` into one matcher.
    pub fn exclusions(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

/// Validate a config.
pub fn validate(config: &Config, known_languages: &[&str]) -> anyhow::Result<()> {
    if !config.version.is_empty() && config.version != CONFIG_VERSION {
        anyhow::bail!(
            "unsupported config version {:?} (expected {:?})",
            config.version,
            CONFIG_VERSION
        );
    }

    for pattern in &config.excluded_paths {
        if let Err(e) = Glob::new(pattern) {
            anyhow::bail!("invalid excluded_paths pattern {:?}: {}", pattern, e);
        }
    }

    for language in &config.languages {
        if !known_languages.contains(&language.as_str()) {
            anyhow::bail!(
                "unknown language {:?} (known: {})",
                language,
                known_languages.join(", ")
            );
        }
    }

    if config.max_workers == Some(0) {
        anyhow::bail!("max_workers must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1"
excluded_paths:
  - "**/generated/**"
  - "**/*.min.js"
languages: [python, typescript]
max_workers: 4
include_test_files: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.excluded_paths.len(), 2);
        assert_eq!(config.max_workers, Some(4));
        assert!(config.should_include_test_files());
        assert!(!config.should_follow_links());
        assert!(config.language_enabled("python"));
        assert!(!config.language_enabled("javascript"));
    }

    #[test]
    fn test_path_exclusion() {
        let config = Config {
            excluded_paths: vec!["**/generated/**".to_string(), "**/*.min.js".to_string()],
            ..Config::default()
        };
        let set = config.exclusions().unwrap();
        assert!(set.is_match("/p/src/generated/api.ts"));
        assert!(set.is_match("/p/vendor.min.js"));
        assert!(!set.is_match("/p/src/main.ts"));
    }

    #[test]
    fn test_validate() {
        let known = ["python", "typescript", "javascript"];
        assert!(validate(&Config::default(), &known).is_ok());

        let bad_language = Config {
            languages: vec!["cobol".to_string()],
            ..Config::default()
        };
        assert!(validate(&bad_language, &known).is_err());

        let bad_workers = Config {
            max_workers: Some(0),
            ..Config::default()
        };
        assert!(validate(&bad_workers, &known).is_err());

        let current = Config {
            version: "1".to_string(),
            ..Config::default()
        };
        assert!(validate(&current, &known).is_ok());

        let future = Config {
            version: "2".to_string(),
            ..Config::default()
        };
        let err = validate(&future, &known).unwrap_err();
        assert!(err.to_string().contains("unsupported config version"));
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        let (config, path) = Config::discover(dir.path()).unwrap();
        assert!(path.is_none());
        assert!(config.languages.is_empty());

        fs::write(dir.path().join(".semgraph.yaml"), "languages: [python]\n").unwrap();
        let (config, path) = Config::discover(dir.path()).unwrap();
        assert_eq!(path, Some(dir.path().join(".semgraph.yaml")));
        assert_eq!(config.languages, vec!["python".to_string()]);
    }
}
