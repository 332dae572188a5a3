use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("interface `{0}` not found")]
    UnknownInterface(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid counter value `{value}` in {}", path.display())]
    InvalidCounter { path: PathBuf, value: String },

    #[error("failed to run `{program}`: {source}")]
    TcSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    TcFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("invalid qdisc statistics: {0}")]
    TcParse(#[from] serde_json::Error),

    #[error("failed to write sample: {0}")]
    Write(#[source] std::io::Error),

    #[error("`interval` must be a positive duration")]
    InvalidInterval,
}
