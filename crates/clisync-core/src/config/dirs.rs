use directories::ProjectDirs;
use std::path::PathBuf;

/// Application directories following XDG spec
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/clisync)
    pub config: PathBuf,

    /// Config file path
    pub config_file: PathBuf,

    /// Runtime directory for the daemon port file, when the platform has one
    pub runtime: Option<PathBuf>,
}

impl Directories {
    /// Standard XDG paths, or `None` when no home directory can be determined.
    #[must_use]
    pub fn new() -> Option<Self> {
        let project = ProjectDirs::from("", "", "clisync")?;
        let config = project.config_dir().to_path_buf();

        Some(Self {
            config_file: config.join("config.json"),
            runtime: project.runtime_dir().map(PathBuf::from),
            config,
        })
    }

    /// Where a supervisor is expected to publish the daemon port.
    #[must_use]
    pub fn default_port_file(&self) -> PathBuf {
        self.runtime
            .as_ref()
            .unwrap_or(&self.config)
            .join("daemon.port")
    }
}
