use crate::EventLogError;
use std::path::PathBuf;

/// Default executable for the Salesforce CLI.
pub const DEFAULT_SF_BIN: &str = "sf";

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub username: String,
    pub jwt_key_file: PathBuf,
    pub instance_url: String,
    pub org_alias: String,
    pub output_dir: PathBuf,
    pub sf_bin: String,
}

impl Config {
    /// Check that every required value is present and the JWT key file exists.
    ///
    /// Output directory writability is checked when the layout is prepared,
    /// since the directory may not exist yet.
    pub fn validate(&self) -> Result<(), EventLogError> {
        let required = [
            ("client_id", self.client_id.trim().is_empty()),
            ("username", self.username.trim().is_empty()),
            ("jwt_key_file", self.jwt_key_file.as_os_str().is_empty()),
            ("instance_url", self.instance_url.trim().is_empty()),
            ("org_alias", self.org_alias.trim().is_empty()),
            ("output_dir", self.output_dir.as_os_str().is_empty()),
            ("sf_bin", self.sf_bin.trim().is_empty()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, empty)| *empty)
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(EventLogError::Config(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )));
        }
        if !self.jwt_key_file.is_file() {
            return Err(EventLogError::Config(format!(
                "JWT key file not found: {}",
                self.jwt_key_file.display()
            )));
        }
        Ok(())
    }

    /// Instance URL without a trailing slash.
    pub fn instance_base(&self) -> &str {
        self.instance_url.trim_end_matches('/')
    }
}
