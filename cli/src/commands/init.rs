use std::path::Path;

use fuelwatch::{
    manifest::{
        core::Manifest,
        scrape::{ScrapeSettings, StationSettings},
        storage::{CsvDetails, PostgresDetails, Storage},
        yaml::{read_manifest, write_manifest, YAML_CONFIG_NAME},
    },
    setup_postgres, DEFAULT_SCHEMA,
};

use crate::{
    console::{print_error_message, print_success_message, print_warn_message},
    fuelwatch_yaml::{fuelwatch_yaml_exists, fuelwatch_yaml_path},
};

fn starter_manifest(project_path: &Path) -> Manifest {
    let name = project_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "fuelwatch".to_string());

    Manifest {
        name,
        description: None,
        environment_path: Some(".env".to_string()),
        storage: Storage {
            postgres: Some(PostgresDetails {
                enabled: false,
                schema: DEFAULT_SCHEMA.to_string(),
                reflect_schema: None,
                disable_create_tables: None,
            }),
            csv: Some(CsvDetails { enabled: true, path: "./generated_csv".to_string() }),
        },
        scrape: ScrapeSettings::new("${GASPY_EMAIL}", "${GASPY_PASSWORD}"),
        stations: StationSettings::default(),
    }
}

pub async fn handle_init_command(project_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let manifest_path = fuelwatch_yaml_path(project_path);

    if !fuelwatch_yaml_exists(project_path) {
        write_manifest(&starter_manifest(project_path), &manifest_path).map_err(|e| {
            print_error_message(&format!("Could not write {}: {}", YAML_CONFIG_NAME, e));
            e
        })?;

        print_success_message(&format!("Created {}", manifest_path.display()));
        print_warn_message(
            "Set GASPY_EMAIL and GASPY_PASSWORD in .env, then run fuelwatch init again to create storage.",
        );
        return Ok(());
    }

    let manifest = read_manifest(&manifest_path).map_err(|e| {
        print_error_message(&format!("Could not read {}: {}", YAML_CONFIG_NAME, e));
        e
    })?;

    if manifest.storage.postgres_enabled() {
        let schema = manifest.storage.postgres_schema();
        setup_postgres(schema).await.map_err(|e| {
            print_error_message(&format!(
                "Could not create postgres tables, make sure DATABASE_URL is set in the .env: {}",
                e
            ));
            e
        })?;
        print_success_message(&format!("Postgres tables ready in schema {}", schema));
    }

    if let Some(csv_path) = manifest.storage.csv_path() {
        let directory = project_path.join(csv_path);
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            print_error_message(&format!("Could not create {}: {}", directory.display(), e));
            e
        })?;
        print_success_message(&format!("Csv directory ready at {}", directory.display()));
    }

    Ok(())
}
