use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vision provider error: {0}")]
    VisionProvider(String),

    #[error("UI driver error: {0}")]
    Driver(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Playbook error: {0}")]
    Playbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type PilotResult<T> = Result<T, PilotError>;
