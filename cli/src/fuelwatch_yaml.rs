use std::path::{Path, PathBuf};

use fuelwatch::manifest::yaml::YAML_CONFIG_NAME;

use crate::console::print_error_message;

pub fn fuelwatch_yaml_path(project_path: &Path) -> PathBuf {
    project_path.join(YAML_CONFIG_NAME)
}

pub fn fuelwatch_yaml_exists(project_path: &Path) -> bool {
    fuelwatch_yaml_path(project_path).is_file()
}

pub fn validate_fuelwatch_yaml_exist(project_path: &Path) -> Result<PathBuf, String> {
    if !fuelwatch_yaml_exists(project_path) {
        let message = format!(
            "{} does not exist in {}. Please use fuelwatch init to create one.",
            YAML_CONFIG_NAME,
            project_path.display()
        );
        print_error_message(&message);
        return Err(message);
    }

    Ok(fuelwatch_yaml_path(project_path))
}
