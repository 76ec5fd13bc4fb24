mod natural_sort;

pub use natural_sort::natural_cmp;

use std::{path::Path, time::Duration};

use tracing::{error, info};

/// Loads a `.env` file from an explicit path, logging rather than failing when it is absent.
pub fn load_env_from_full_path(path: &Path) {
    match dotenv::from_path(path) {
        Ok(_) => info!("Loaded environment from {}", path.display()),
        Err(e) => error!("Could not load environment from {}: {}", path.display(), e),
    }
}

/// Loads `<project>/.env` when it exists.
pub fn load_env_from_project_path(project_path: &Path) {
    let env_file = project_path.join(".env");
    if env_file.exists() {
        load_env_from_full_path(&env_file);
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let minutes = secs / 60;
    let seconds = secs % 60;

    match (minutes, secs) {
        (m, _) if m > 0 => format!("{}m {}s", m, seconds),
        (0, s) if s > 0 => format!("{}s {}ms", s, duration.subsec_millis()),
        _ => format!("{}ms", duration.as_millis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(3_400)), "3s 400ms");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
