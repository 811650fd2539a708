use anyhow::{bail, Context, Result};
use cdp_session::ChromiumLauncher;
use chrono::Local;
use clap::Args;
use procurement_flow::{Orchestrator, RunResult, SearchRequest};

use super::output::{print_json, OutputFormat};
use crate::config::AppConfig;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Comma-separated CPV codes (no filter when omitted)
    #[arg(long, value_name = "CODES")]
    pub cpv: Option<String>,

    /// Lower publication date, dd-mm-yyyy (defaults to yesterday)
    #[arg(long, value_name = "DD-MM-YYYY")]
    pub desde: Option<String>,

    /// Upper publication date, dd-mm-yyyy (defaults to yesterday)
    #[arg(long, value_name = "DD-MM-YYYY")]
    pub hasta: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_run(args: RunArgs, config: &AppConfig, output: OutputFormat) -> Result<()> {
    let request = SearchRequest {
        cpv_codes: args.cpv,
        fecha_desde: args.desde,
        fecha_hasta: args.hasta,
    };
    let criteria = request
        .into_criteria(Local::now().date_naive())
        .context("invalid run criteria")?;

    let mut settings = config.flow_settings();
    if args.headful {
        settings.browser.headless = false;
    }

    let orchestrator = Orchestrator::new(ChromiumLauncher, settings);
    let result = orchestrator.run(&criteria).await;

    match output {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Human => print_human(&result),
    }

    if !result.success {
        bail!(
            "extraction failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_human(result: &RunResult) {
    let status = if result.success { "ok" } else { "failed" };
    println!("Run {} [{}]", result.run_id, status);
    println!("  Dates:   {} .. {}", result.fecha_desde, result.fecha_hasta);
    if result.cpv_codes.is_empty() {
        println!("  CPV:     (no filter)");
    } else {
        println!("  CPV:     {}", result.cpv_codes.join(", "));
    }
    println!("  Pages:   {}", result.pages);
    println!("  Notices: {}", result.records.len());
    if let Some(folder) = &result.output_folder {
        println!("  Output:  {}", folder.display());
    }
    if let Some(error) = &result.error {
        println!("  Error:   {}", error);
    }
}
