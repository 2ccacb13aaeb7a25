//! Configuration types for the Burrow tool server

use crate::tools::ToolRuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the tool server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BurrowConfig {
    /// Workspace root and startup behaviour
    pub workspace: WorkspaceConfig,

    /// MCP server identity and exposure
    pub server: ServerConfig,

    /// Command and script execution
    pub runner: RunnerConfig,

    /// Detached process tracking
    pub processes: ProcessConfig,

    /// Tool runtime deadlines and capability policy
    pub tools: ToolRuntimeConfig,
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace root; a leading `~` is expanded to the home directory
    pub root: PathBuf,

    /// Create the root at startup if it does not exist
    pub create: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/mcp/workspace"),
            create: true,
        }
    }
}

impl WorkspaceConfig {
    /// The root with `~` expanded
    pub fn expanded_root(&self) -> PathBuf {
        expand_home(&self.root)
    }
}

/// MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name reported during initialize
    pub name: String,

    /// Server version reported during initialize
    pub version: String,

    /// Tool allowlist (None = expose every built-in tool)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_allowlist: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "burrow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tool_allowlist: None,
        }
    }
}

/// Command runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell used by `run_command`
    pub shell: String,

    /// Interpreter used by `run_python`
    pub python: String,

    /// npm executable used by the npm tools
    pub npm: String,

    /// Deadline for a synchronous shell command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Default deadline for `run_python` in exec mode
    #[serde(with = "humantime_serde")]
    pub python_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let (shell, python, npm) = if cfg!(windows) {
            ("cmd", "python", "npm.cmd")
        } else {
            ("sh", "python3", "npm")
        };

        Self {
            shell: shell.to_string(),
            python: python.to_string(),
            npm: npm.to_string(),
            command_timeout: Duration::from_secs(120),
            python_timeout: Duration::from_secs(15),
        }
    }
}

/// Process registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Captured output lines retained per managed process
    pub log_tail_lines: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self { log_tail_lines: 200 }
    }
}

/// Builder for BurrowConfig
pub struct ConfigBuilder {
    config: BurrowConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: BurrowConfig::default(),
        }
    }

    /// Set the workspace root
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace.root = root.into();
        self
    }

    /// Set runner configuration
    pub fn runner(mut self, config: RunnerConfig) -> Self {
        self.config.runner = config;
        self
    }

    /// Set process configuration
    pub fn processes(mut self, config: ProcessConfig) -> Self {
        self.config.processes = config;
        self
    }

    /// Set tool runtime configuration
    pub fn tools(mut self, config: ToolRuntimeConfig) -> Self {
        self.config.tools = config;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BurrowConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BurrowConfig {
    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `burrow.toml` in the working directory
    /// 3. The file named by `BURROW_CONFIG_PATH`, if set
    /// 4. `BURROW_` environment variables, `__` separating sections
    ///    (`BURROW_RUNNER__PYTHON=python3.12`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or validation fails.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_with(None)
    }

    /// Like [`BurrowConfig::load`], with an explicit file merged after
    /// `BURROW_CONFIG_PATH` and before the environment.
    pub fn load_with(path: Option<&Path>) -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("burrow.toml"));

        if let Ok(path) = std::env::var("BURROW_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        let config: BurrowConfig = figment
            .merge(Env::prefixed("BURROW_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                crate::error::BurrowError::Configuration(format!(
                    "Failed to load configuration: {}",
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let config: BurrowConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                crate::error::BurrowError::Configuration(format!(
                    "Failed to load configuration file {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BurrowError;

        if self.workspace.root.as_os_str().is_empty() {
            return Err(BurrowError::Configuration(
                "workspace.root must not be empty".to_string(),
            ));
        }
        if self.processes.log_tail_lines == 0 {
            return Err(BurrowError::Configuration(
                "processes.log_tail_lines must be greater than zero".to_string(),
            ));
        }
        if self.runner.command_timeout.is_zero() || self.runner.python_timeout.is_zero() {
            return Err(BurrowError::Configuration(
                "runner timeouts must be non-zero".to_string(),
            ));
        }
        if self.tools.default_timeout.is_zero() {
            return Err(BurrowError::Configuration(
                "tools.default_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` component to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(std::path::Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = BurrowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.runner.python_timeout, Duration::from_secs(15));
        assert_eq!(config.processes.log_tail_lines, 200);
        assert_eq!(config.server.name, "burrow");
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[workspace]
root = "/srv/agent"

[runner]
python = "python3.12"
command_timeout = "30s"

[tools]
deny = ["subprocess"]
"#
        )
        .unwrap();

        let config = BurrowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workspace.root, PathBuf::from("/srv/agent"));
        assert!(config.workspace.create);
        assert_eq!(config.runner.python, "python3.12");
        assert_eq!(config.runner.command_timeout, Duration::from_secs(30));
        assert_eq!(config.runner.python_timeout, Duration::from_secs(15));
        assert_eq!(config.tools.deny.len(), 1);
    }

    #[test]
    fn test_zero_tail_rejected() {
        let mut config = BurrowConfig::default();
        config.processes.log_tail_lines = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        let plain = PathBuf::from("/tmp/ws");
        assert_eq!(expand_home(&plain), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home(Path::new("~/mcp/workspace")),
                home.join("mcp/workspace")
            );
        }
    }

    #[test]
    fn test_builder() {
        let config = BurrowConfig::builder().workspace_root("/data/ws").build();
        assert_eq!(config.workspace.expanded_root(), PathBuf::from("/data/ws"));
    }
}
