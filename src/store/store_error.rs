use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Path {0} already exists and is not a directory")]
    NotADirectory(PathBuf),
    /// A wrapper around any IO error, with the path it happened on
    #[error("IO error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not encode image: {0}")]
    EncodeError(#[from] image::ImageError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::IoError { path, source }
    }
}
