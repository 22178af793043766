use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Locate the `config/` directory of a service.
///
/// Works both from the workspace root and from inside the service crate.
pub fn configuration_directory(service_dir: &str) -> Result<PathBuf, AppError> {
    let base_path = std::env::current_dir()?;
    Ok(resolve_configuration_directory(&base_path, service_dir))
}

fn resolve_configuration_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Load settings from `<service_dir>/config/base.yaml` layered with `APP_*`
/// environment variables (`APP_SECTION__KEY=value`).
pub fn load_settings<T: DeserializeOwned>(service_dir: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let directory = configuration_directory(service_dir)?;

    let settings = Config::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_workspace_root() {
        let dir = resolve_configuration_directory(Path::new("/srv/app"), "grist-url-builder");
        assert_eq!(dir, PathBuf::from("/srv/app/grist-url-builder/config"));
    }

    #[test]
    fn resolves_from_inside_service_crate() {
        let dir = resolve_configuration_directory(
            Path::new("/srv/app/grist-url-builder"),
            "grist-url-builder",
        );
        assert_eq!(dir, PathBuf::from("/srv/app/grist-url-builder/config"));
    }
}
