use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create log directory {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`interval` must be a positive duration")]
    InvalidInterval,

    #[error("`name` must not be empty")]
    EmptyName,
}
