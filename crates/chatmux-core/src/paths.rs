use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInputs {
    pub home_dir: PathBuf,
    pub xdg_config_home: Option<PathBuf>,
    pub chatmux_dir_override: Option<PathBuf>,
    pub config_file_override: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatmuxPaths {
    pub data_dir: PathBuf,
    pub log_path: PathBuf,

    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

pub fn compute_paths(inputs: PathInputs) -> ChatmuxPaths {
    let data_dir = inputs
        .chatmux_dir_override
        .clone()
        .unwrap_or_else(|| inputs.home_dir.join(".chatmux"));

    let config_dir = match inputs.chatmux_dir_override {
        Some(ref override_dir) => override_dir.join("config"),
        None => inputs
            .xdg_config_home
            .unwrap_or_else(|| inputs.home_dir.join(".config"))
            .join("chatmux"),
    };

    let config_file = inputs
        .config_file_override
        .unwrap_or_else(|| config_dir.join("config.toml"));

    ChatmuxPaths {
        log_path: data_dir.join("chatmux.log"),
        data_dir,
        config_file,
        config_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PathInputs {
        PathInputs {
            home_dir: PathBuf::from("/home/alice"),
            xdg_config_home: None,
            chatmux_dir_override: None,
            config_file_override: None,
        }
    }

    #[test]
    fn compute_paths_default() {
        let got = compute_paths(inputs());
        assert_eq!(got.data_dir, PathBuf::from("/home/alice/.chatmux"));
        assert_eq!(
            got.log_path,
            PathBuf::from("/home/alice/.chatmux/chatmux.log")
        );
        assert_eq!(
            got.config_file,
            PathBuf::from("/home/alice/.config/chatmux/config.toml")
        );
    }

    #[test]
    fn compute_paths_uses_xdg_config_home() {
        let got = compute_paths(PathInputs {
            xdg_config_home: Some(PathBuf::from("/tmp/xdg")),
            ..inputs()
        });
        assert_eq!(got.config_dir, PathBuf::from("/tmp/xdg/chatmux"));
    }

    #[test]
    fn chatmux_dir_override_moves_config_and_log() {
        let got = compute_paths(PathInputs {
            xdg_config_home: Some(PathBuf::from("/tmp/xdg")),
            chatmux_dir_override: Some(PathBuf::from("/tmp/cm")),
            ..inputs()
        });
        assert_eq!(got.config_dir, PathBuf::from("/tmp/cm/config"));
        assert_eq!(got.log_path, PathBuf::from("/tmp/cm/chatmux.log"));
    }

    #[test]
    fn explicit_config_file_wins() {
        let got = compute_paths(PathInputs {
            config_file_override: Some(PathBuf::from("/etc/chatmux.toml")),
            ..inputs()
        });
        assert_eq!(got.config_file, PathBuf::from("/etc/chatmux.toml"));
        assert_eq!(got.config_dir, PathBuf::from("/home/alice/.config/chatmux"));
    }
}
