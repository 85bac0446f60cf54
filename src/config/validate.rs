use std::path::{Component, Path};

use super::DockhandConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote.app_dir must be a relative path of plain names (letters, digits, '-', '_', '.') without '..' (got '{0}')")]
    InvalidAppDir(String),

    #[error("{field} has invalid value '{value}'. Allowed characters: letters, digits, '-', '_', '.'")]
    InvalidName { field: &'static str, value: String },

    #[error("remote.connect_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("defaults.app_port must be between 1 and 65535 (got {0})")]
    InvalidPort(u32),
}

pub fn validate(config: &DockhandConfig) -> Result<(), ConfigError> {
    let remote = &config.remote;

    if !is_plain_relative(&remote.app_dir) {
        return Err(ConfigError::InvalidAppDir(remote.app_dir.clone()));
    }

    check_name("remote.container_name", &remote.container_name)?;
    check_name("remote.image_name", &remote.image_name)?;
    check_name("remote.nginx_site", &remote.nginx_site)?;

    if remote.connect_timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }

    if let Some(port) = config.defaults.app_port {
        if port == 0 || port > u32::from(u16::MAX) {
            return Err(ConfigError::InvalidPort(port));
        }
    }

    Ok(())
}

/// Every component must be a shell-safe name, so the path can be
/// interpolated into remote commands. At least one name is required.
fn is_plain_relative(app_dir: &str) -> bool {
    let mut named = false;
    for component in Path::new(app_dir).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => {
                let ok = name
                    .to_str()
                    .is_some_and(|name| is_safe_name(name) && !name.chars().all(|c| c == '.'));
                if !ok {
                    return false;
                }
                named = true;
            }
            _ => return false,
        }
    }
    named
}

fn is_safe_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn check_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_safe_name(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate(&DockhandConfig::default()), Ok(()));
    }

    #[test]
    fn app_dir_must_stay_under_home() {
        for bad in [
            "/srv/app",
            "../app",
            "app/../../etc",
            "~/app",
            "",
            ".",
            "./.",
            "...",
            "my app",
            "a;b",
            "app/$(reboot)",
        ] {
            let mut config = DockhandConfig::default();
            config.remote.app_dir = bad.to_string();
            assert_eq!(
                validate(&config),
                Err(ConfigError::InvalidAppDir(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn nested_app_dir_is_accepted() {
        for good in ["apps/shop", "./shop", "shop-1.2/current"] {
            let mut config = DockhandConfig::default();
            config.remote.app_dir = good.to_string();
            assert_eq!(validate(&config), Ok(()), "{good}");
        }
    }

    #[test]
    fn names_are_shell_safe() {
        let mut config = DockhandConfig::default();
        config.remote.container_name = "app; rm -rf /".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidName {
                field: "remote.container_name",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_timeout_and_bad_port() {
        let mut config = DockhandConfig::default();
        config.remote.connect_timeout_secs = 0;
        assert_eq!(validate(&config), Err(ConfigError::ZeroTimeout));

        let mut config = DockhandConfig::default();
        config.defaults.app_port = Some(70000);
        assert_eq!(validate(&config), Err(ConfigError::InvalidPort(70000)));
    }
}
