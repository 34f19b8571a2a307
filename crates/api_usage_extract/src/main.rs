use std::process::ExitCode;

use anyhow::Context;
use api_usage_extract::cli::Args;
use api_usage_extract::{Extractor, RunContext, RunOutcome, logging};
use clap::Parser;
use event_log_client::sf_cli::SfCli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let (config, log_level) = Args::parse().into_config();
    let ctx = RunContext::new(config, chrono::Utc::now());

    ctx.layout.prepare().with_context(|| {
        format!(
            "cannot prepare output directory {}",
            ctx.layout.root().display()
        )
    })?;
    let log_file = ctx.log_file();
    logging::init(&log_file, log_level.as_deref()).context("cannot initialise logging")?;

    let target_date = ctx.window.target_date();
    let cli = SfCli::new(ctx.config.sf_bin.clone());
    let extractor = Extractor::new(ctx, cli);

    match extractor.run().await {
        Ok(outcome) => {
            println!(
                "Log file for date {}: {}",
                target_date.format("%Y-%m-%d"),
                log_file.display()
            );
            match outcome {
                RunOutcome::Completed { failed, .. } if failed > 0 => {
                    println!("{failed} file(s) could not be downloaded; see the log file for details")
                }
                _ => {}
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("FAILURE: API Total Usage extraction failed! {e}");
            println!("\nFAILURE: API Total Usage extraction failed!");
            println!("Check log file for details: {}", log_file.display());
            Ok(ExitCode::FAILURE)
        }
    }
}
