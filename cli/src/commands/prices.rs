use std::path::Path;

use fuelwatch::{manifest::yaml::read_manifest, PostgresClient, PriceQueries};

use crate::{
    cli_interface::PricesSubcommands,
    console::{format_optional, print_error_message, print_table, print_warn_message},
    fuelwatch_yaml::validate_fuelwatch_yaml_exist,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub async fn handle_prices_command(
    project_path: &Path,
    subcommand: &PricesSubcommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest_path = validate_fuelwatch_yaml_exist(project_path)?;
    let manifest = read_manifest(&manifest_path).map_err(|e| {
        print_error_message(&format!("Could not read manifest: {}", e));
        e
    })?;

    if !manifest.storage.postgres_enabled() {
        let message = "Price queries need postgres storage enabled in the manifest";
        print_error_message(message);
        return Err(message.into());
    }

    let client = PostgresClient::new().await.map_err(|e| {
        print_error_message(&format!(
            "Could not connect to Postgres, make sure DATABASE_URL is set in the .env: {}",
            e
        ));
        e
    })?;
    let queries = PriceQueries::new(&client, manifest.storage.postgres_schema());

    match subcommand {
        PricesSubcommands::Latest { fuel_type } => {
            let prices = queries.latest_prices(fuel_type).await?;
            if prices.is_empty() {
                print_warn_message(&format!("No prices stored for fuel type {}", fuel_type));
                return Ok(());
            }

            let rows: Vec<Vec<String>> = prices
                .into_iter()
                .map(|price| {
                    vec![
                        price.station_id,
                        format_optional(price.name),
                        format_optional(price.brand),
                        format_optional(price.price.map(|p| format!("{:.3}", p))),
                        price.update_time.format(TIME_FORMAT).to_string(),
                    ]
                })
                .collect();
            print_table(&["station", "name", "brand", "price", "updated"], &rows);
        }
        PricesSubcommands::History { station } => {
            let name = queries.station_name(station).await?;
            let history = queries.price_history(station).await?;
            println!("{} ({})", name, station);

            let rows: Vec<Vec<String>> = history
                .into_iter()
                .map(|price| {
                    vec![
                        price.update_time.format(TIME_FORMAT).to_string(),
                        price.fuel_type,
                        format_optional(price.price.map(|p| format!("{:.3}", p))),
                    ]
                })
                .collect();
            print_table(&["updated", "fuel", "price"], &rows);
        }
        PricesSubcommands::FuelTypes => {
            for fuel_type in queries.fuel_types().await? {
                println!("{}", fuel_type);
            }
        }
    }

    Ok(())
}
