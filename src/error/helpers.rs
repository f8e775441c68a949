use super::{ErrorCode, WordTallyError};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    /// Convert to a configuration error tied to a file
    fn to_config_error(self, path: &Path, message: impl Into<String>) -> Result<T, WordTallyError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_config_error(self, path: &Path, message: impl Into<String>) -> Result<T, WordTallyError> {
        self.map_err(|e| {
            WordTallyError::config_with_code(
                ErrorCode::CONFIG_PARSE_ERROR,
                message,
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })
    }
}

/// Map an I/O error from reading a source location onto the matching fetch code
pub fn fetch_io_error(location: &str, err: std::io::Error) -> WordTallyError {
    let code = match err.kind() {
        std::io::ErrorKind::NotFound => ErrorCode::FETCH_NOT_FOUND,
        _ => ErrorCode::FETCH_IO,
    };
    WordTallyError::fetch_with_code(code, location, err.to_string()).with_source(err)
}
