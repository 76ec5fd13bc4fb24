use std::path::Path;

use fuelwatch::start_scrape;

use crate::{
    console::{print_error_message, print_success_message, print_warn_message},
    fuelwatch_yaml::validate_fuelwatch_yaml_exist,
};

pub async fn handle_scrape_command(project_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let manifest_path = validate_fuelwatch_yaml_exist(project_path)?;

    let summary = start_scrape(&manifest_path).await.map_err(|e| {
        print_error_message(&format!("Scrape failed: {}", e));
        e
    })?;

    if summary.failed_requests > 0 {
        print_warn_message(&format!(
            "{} of {} requests failed and were skipped",
            summary.failed_requests, summary.requests
        ));
    }

    print_success_message(&format!("Stored {} prices", summary.prices_written));
    Ok(())
}
