use crate::error::{Error, Result};
use crate::types::BillNumber;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ILGA FTP mirror prefix for the 104th General Assembly
pub const DEFAULT_BASE_URL: &str = "https://www.ilga.gov/ftp/legislation/104/BillStatus/XML/10400";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = concat!("billbot/", env!("CARGO_PKG_VERSION"));

/// Configuration for an update run
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Tracked-bill catalog (YAML or JSON)
    pub catalog_path: PathBuf,
    /// Reconciled output, also read as the previous state
    pub output_path: PathBuf,
    pub user_bills_path: PathBuf,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub refresh_user_bills: bool,
}

impl Config {
    /// Create a new default configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            catalog_path: data_dir.join("bills.yml"),
            output_path: data_dir.join("bills.json"),
            user_bills_path: data_dir.join("user-bills.json"),
            data_dir,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            refresh_user_bills: true,
        }
    }

    /// XML URL for a bill
    pub fn locator(&self, bill: &BillNumber) -> String {
        bill.locator(&self.base_url)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.catalog_path.is_file() {
            return Err(Error::Config(format!(
                "Catalog file does not exist: {}",
                self.catalog_path.display()
            )));
        }

        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(Error::Config(format!(
                "Data directory is not a directory: {}",
                self.data_dir.display()
            )));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("Timeout must be greater than zero".to_string()));
        }

        Ok(())
    }
}

/// Builder for creating configurations
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: Config::new(data_dir),
        }
    }

    pub fn catalog_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.catalog_path = path.as_ref().to_path_buf();
        self
    }

    pub fn output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_path = path.as_ref().to_path_buf();
        self
    }

    pub fn user_bills_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.user_bills_path = path.as_ref().to_path_buf();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Skip refreshing user-bills.json
    pub fn skip_user_bills(mut self, skip: bool) -> Self {
        self.config.refresh_user_bills = !skip;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("data")
    }
}
