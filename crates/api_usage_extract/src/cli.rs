use clap::Parser;
use event_log_client::config::{Config, DEFAULT_SF_BIN};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "extract-total-usage",
    about = "Extract Salesforce API Total Usage data from Event Log Files",
    long_about = "Logs in to Salesforce with the sf CLI (JWT flow), finds yesterday's \
                  ApiTotalUsage EventLogFile records and streams each one to a CSV file.",
    version,
    after_help = "\
EXAMPLES:
    extract-total-usage --client-id 3MVG9A2kN3Bn17hs... --username user@company.com \\
        --jwt-key-file /path/to/key.pem --instance-url https://login.salesforce.com \\
        --org-alias myorg --output-dir /path/to/output

CRON:
    0 2 * * * /usr/local/bin/extract-total-usage --client-id ... --output-dir /var/lib/usage"
)]
pub struct Args {
    /// Salesforce connected app client ID
    #[arg(long, env = "SF_CLIENT_ID")]
    pub client_id: String,

    /// Salesforce username
    #[arg(long, env = "SF_USERNAME")]
    pub username: String,

    /// Path to the JWT private key file
    #[arg(long, env = "SF_JWT_KEY_FILE")]
    pub jwt_key_file: PathBuf,

    /// Salesforce login or My Domain URL
    #[arg(long, env = "SF_INSTANCE_URL")]
    pub instance_url: String,

    /// Org alias for the sf CLI
    #[arg(long, env = "SF_ORG_ALIAS")]
    pub org_alias: String,

    /// Output directory for logs and CSV files
    #[arg(long, env = "SF_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// sf executable to invoke
    #[arg(long, env = "SF_CLI_BIN", default_value = DEFAULT_SF_BIN)]
    pub sf_bin: String,

    /// Log filter, e.g. `info` or `debug,hyper=warn` (falls back to RUST_LOG)
    #[arg(long, env = "SF_USAGE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Args {
    pub fn into_config(self) -> (Config, Option<String>) {
        let config = Config {
            client_id: self.client_id,
            username: self.username,
            jwt_key_file: self.jwt_key_file,
            instance_url: self.instance_url,
            org_alias: self.org_alias,
            output_dir: self.output_dir,
            sf_bin: self.sf_bin,
        };
        (config, self.log_level)
    }
}
