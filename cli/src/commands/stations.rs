use std::path::Path;

use fuelwatch::import_stations;

use crate::{
    cli_interface::StationsSubcommands,
    console::{print_error_message, print_success_message},
    fuelwatch_yaml::validate_fuelwatch_yaml_exist,
};

pub async fn handle_stations_command(
    project_path: &Path,
    subcommand: &StationsSubcommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest_path = validate_fuelwatch_yaml_exist(project_path)?;

    match subcommand {
        StationsSubcommands::Import => {
            let summary = import_stations(&manifest_path).await.map_err(|e| {
                print_error_message(&format!("Could not import stations: {}", e));
                e
            })?;

            print_success_message(&format!(
                "Imported {} stations, scraping {} per request",
                summary.stations, summary.max_stations_per_query
            ));
            Ok(())
        }
    }
}
