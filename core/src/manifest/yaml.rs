use std::{
    env,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use regex::{Captures, Regex};
use tracing::error;

use crate::{helpers::load_env_from_full_path, manifest::core::Manifest};

pub const YAML_CONFIG_NAME: &str = "fuelwatch.yaml";

#[derive(thiserror::Error, Debug)]
pub enum SubstituteEnvVariablesError {
    #[error("Invalid substitution pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Environment variable {0} not found")]
    MissingVariable(String),
}

fn substitute_env_variables(contents: &str) -> Result<String, SubstituteEnvVariablesError> {
    let re = Regex::new(r"\$\{([^}]+)\}")?;
    let mut missing = None;
    let result = re.replace_all(contents, |caps: &Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                error!("Environment variable {} not found", var_name);
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(SubstituteEnvVariablesError::MissingVariable(var_name)),
        None => Ok(result.into_owned()),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidateManifestError {
    #[error("At least one of storage.postgres or storage.csv must be enabled")]
    NoStorageEnabled,

    #[error("scrape.fuel_types can not be empty")]
    NoFuelTypes,

    #[error("scrape.lookback_hours must be greater than 0")]
    InvalidLookback,

    #[error("scrape.min_delay_ms ({0}) must not exceed scrape.max_delay_ms ({1})")]
    InvalidDelayRange(u64, u64),

    #[error("stations.chunk_size must be greater than 0")]
    InvalidChunkSize,

    #[error("Headers file {0} does not exist")]
    HeadersFileNotFound(String),
}

fn validate_manifest(
    project_path: &Path,
    manifest: &Manifest,
) -> Result<(), ValidateManifestError> {
    if !manifest.storage.postgres_enabled() && !manifest.storage.csv_enabled() {
        return Err(ValidateManifestError::NoStorageEnabled);
    }

    let scrape = &manifest.scrape;
    if scrape.fuel_types.is_empty() {
        return Err(ValidateManifestError::NoFuelTypes);
    }

    if scrape.lookback_hours == 0 {
        return Err(ValidateManifestError::InvalidLookback);
    }

    if scrape.min_delay_ms > scrape.max_delay_ms {
        return Err(ValidateManifestError::InvalidDelayRange(
            scrape.min_delay_ms,
            scrape.max_delay_ms,
        ));
    }

    if manifest.stations.chunk_size == Some(0) {
        return Err(ValidateManifestError::InvalidChunkSize);
    }

    if let Some(headers_path) = &scrape.headers_path {
        if !project_path.join(headers_path).exists() {
            return Err(ValidateManifestError::HeadersFileNotFound(headers_path.clone()));
        }
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum ReadManifestError {
    #[error("Could not open file: {0}")]
    CouldNotOpenFile(#[from] std::io::Error),

    #[error("Could not parse manifest: {0}")]
    CouldNotParseManifest(#[from] serde_yaml::Error),

    #[error("Could not substitute env variables: {0}")]
    CouldNotSubstituteEnvVariables(#[from] SubstituteEnvVariablesError),

    #[error("Could not validate manifest: {0}")]
    CouldNotValidateManifest(#[from] ValidateManifestError),

    #[error("No project path found using parent of manifest path")]
    NoProjectPathFoundUsingParentOfManifestPath,
}

fn extract_environment_path(contents: &str, file_path: &Path) -> Option<PathBuf> {
    let re = Regex::new(r"(?m)^environment_path:\s*(.+)$").ok()?;
    re.captures(contents).and_then(|cap| cap.get(1)).map(|m| {
        let path_str = m.as_str().trim().replace('\"', "");
        let base_dir = file_path.parent().unwrap_or(Path::new(""));
        let full_path = base_dir.join(path_str);
        full_path.canonicalize().unwrap_or(full_path)
    })
}

/// Reads `fuelwatch.yaml`, loading `environment_path` first so `${VAR}` placeholders
/// can be filled from it.
pub fn read_manifest(file_path: &Path) -> Result<Manifest, ReadManifestError> {
    let mut file = File::open(file_path)?;
    let mut contents = String::new();

    file.read_to_string(&mut contents)?;

    if let Some(path) = extract_environment_path(&contents, file_path) {
        load_env_from_full_path(&path);
    }

    let contents = substitute_env_variables(&contents)?;

    let manifest: Manifest = serde_yaml::from_str(&contents)?;

    let project_path = file_path.parent();
    match project_path {
        None => Err(ReadManifestError::NoProjectPathFoundUsingParentOfManifestPath),
        Some(project_path) => {
            validate_manifest(project_path, &manifest)?;
            Ok(manifest)
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WriteManifestError {
    #[error("Could not parse manifest to string: {0}")]
    CouldNotTurnManifestToString(serde_yaml::Error),

    #[error("Could not create file: {0}")]
    CouldNotCreateFile(std::io::Error),

    #[error("Could not write to file: {0}")]
    CouldNotWriteToFile(std::io::Error),
}

pub fn write_manifest(data: &Manifest, file_path: &Path) -> Result<(), WriteManifestError> {
    let yaml_string =
        serde_yaml::to_string(data).map_err(WriteManifestError::CouldNotTurnManifestToString)?;

    let mut file = File::create(file_path).map_err(WriteManifestError::CouldNotCreateFile)?;
    file.write_all(yaml_string.as_bytes()).map_err(WriteManifestError::CouldNotWriteToFile)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    const MANIFEST: &str = r#"
name: wellington
storage:
  csv:
    enabled: true
scrape:
  email: ${FUELWATCH_TEST_EMAIL}
  password: hunter2
  fuel_types: ["91", "D"]
stations:
  chunk_size: 40
"#;

    #[test]
    fn test_read_manifest_substitutes_env_variables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(YAML_CONFIG_NAME);
        fs::write(&path, MANIFEST).unwrap();
        env::set_var("FUELWATCH_TEST_EMAIL", "me@example.nz");

        let manifest = read_manifest(&path).unwrap();

        assert_eq!(manifest.scrape.email, "me@example.nz");
        assert_eq!(manifest.scrape.lookback_hours, 24);
        assert_eq!(manifest.stations.chunk_size, Some(40));
        assert_eq!(manifest.storage.csv_path(), Some("./generated_csv"));
        assert!(!manifest.storage.postgres_enabled());
    }

    #[test]
    fn test_missing_env_variable_is_an_error() {
        let result = substitute_env_variables("password: ${FUELWATCH_TEST_UNSET_VARIABLE}");
        assert!(matches!(
            result,
            Err(SubstituteEnvVariablesError::MissingVariable(name))
                if name == "FUELWATCH_TEST_UNSET_VARIABLE"
        ));
    }

    #[test]
    fn test_manifest_without_storage_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(YAML_CONFIG_NAME);
        fs::write(&path, "name: x\nscrape:\n  email: a\n  password: b\n").unwrap();

        assert!(matches!(
            read_manifest(&path),
            Err(ReadManifestError::CouldNotValidateManifest(ValidateManifestError::NoStorageEnabled))
        ));
    }

    #[test]
    fn test_write_then_read_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(YAML_CONFIG_NAME);
        fs::write(&path, MANIFEST.replace("${FUELWATCH_TEST_EMAIL}", "a@b.nz")).unwrap();
        let manifest = read_manifest(&path).unwrap();

        write_manifest(&manifest, &path).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), manifest);
    }
}
