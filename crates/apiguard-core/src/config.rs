//! Configuration parsing
//!
//! This module handles loading the apiguard project configuration.
//!
//! # Configuration Files
//!
//! - `apiguard.yaml` - Project root configuration
//! - the definition document it points at (`swagger.yaml` by default)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "apiguard.yaml";

/// Root project configuration from `apiguard.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Definition document to compile, relative to the project root
    #[serde(default = "default_document")]
    pub document: String,

    /// Where the compiled check models and descriptors are written
    #[serde(default = "default_output")]
    pub output: String,

    /// Token authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Restricts which operations are compiled
    #[serde(default)]
    pub filter: FilterConfig,

    /// Reference resolution settings
    #[serde(default)]
    pub references: ReferenceConfig,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_document() -> String {
    "swagger.yaml".to_string()
}

fn default_output() -> String {
    ".apiguard/compiled.json".to_string()
}

/// Token authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the encoded token (matched lower-cased)
    #[serde(default = "default_token_header")]
    pub token_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: default_token_header(),
        }
    }
}

fn default_token_header() -> String {
    "x-auth-token".to_string()
}

/// Operation selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Exact URL, or a URL prefix when it ends with `*`
    #[serde(default)]
    pub interface: Option<String>,

    /// HTTP method (case-insensitive)
    #[serde(default)]
    pub method: Option<String>,
}

impl FilterConfig {
    /// Whether an operation at `url` with `method` is selected.
    pub fn matches(&self, url: &str, method: &str) -> bool {
        let url_ok = match self.interface.as_deref() {
            None | Some("") => true,
            Some(pattern) => match pattern.strip_suffix('*') {
                Some(prefix) => url.starts_with(prefix),
                None => pattern == url,
            },
        };
        let method_ok = match self.method.as_deref() {
            None | Some("") => true,
            Some(wanted) => wanted.eq_ignore_ascii_case(method),
        };
        url_ok && method_ok
    }
}

/// Reference resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Prefix stripped from `$ref` values to find the definition name
    #[serde(default = "default_ref_prefix")]
    pub prefix: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            prefix: default_ref_prefix(),
        }
    }
}

fn default_ref_prefix() -> String {
    "#/definitions/".to_string()
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or apiguard.yaml file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-api")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;

        if project.references.prefix.is_empty() {
            return Err(Error::ConfigInvalid {
                message: "references.prefix must not be empty".to_string(),
            });
        }

        Ok(Self { project, base_path })
    }

    /// Absolute location of the definition document
    pub fn document_path(&self) -> PathBuf {
        self.base_path.join(&self.project.document)
    }

    /// Absolute location of the compiled output
    pub fn output_path(&self) -> PathBuf {
        self.base_path.join(&self.project.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
name: petstore
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "petstore");
        assert_eq!(config.version, "0.1.0");
        assert_eq!(config.document, "swagger.yaml");
        assert_eq!(config.auth.token_header, "x-auth-token");
        assert_eq!(config.references.prefix, "#/definitions/");
        assert!(config.filter.interface.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r##"
name: petstore
version: "2.0.0"
document: api/petstore.yaml
output: build/checks.json
auth:
  token_header: x-session
filter:
  interface: "/pets/*"
  method: GET
references:
  prefix: "#/components/"
"##;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, "2.0.0");
        assert_eq!(config.document, "api/petstore.yaml");
        assert_eq!(config.output, "build/checks.json");
        assert_eq!(config.auth.token_header, "x-session");
        assert_eq!(config.filter.interface.as_deref(), Some("/pets/*"));
        assert_eq!(config.references.prefix, "#/components/");
    }

    #[rstest]
    #[case(None, None, "/pets", "get", true)]
    #[case(Some("/pets"), None, "/pets", "post", true)]
    #[case(Some("/pets"), None, "/pets/{id}", "get", false)]
    #[case(Some("/pets/*"), None, "/pets/{id}", "get", true)]
    #[case(Some("/pets/*"), None, "/users", "get", false)]
    #[case(None, Some("GET"), "/pets", "get", true)]
    #[case(None, Some("get"), "/pets", "post", false)]
    fn test_filter_matches(
        #[case] interface: Option<&str>,
        #[case] method: Option<&str>,
        #[case] url: &str,
        #[case] op_method: &str,
        #[case] expected: bool,
    ) {
        let filter = FilterConfig {
            interface: interface.map(str::to_string),
            method: method.map(str::to_string),
        };
        assert_eq!(filter.matches(url, op_method), expected);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "name: demo\ndocument: api.yaml\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.document_path(), dir.path().join("api.yaml"));
        assert_eq!(
            config.output_path(),
            dir.path().join(".apiguard/compiled.json")
        );
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_rejects_empty_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "name: demo\nreferences:\n  prefix: \"\"\n",
        )
        .unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("references.prefix"));
    }
}
