use crate::gemini::GeminiError;
use crate::image_loader::ImageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    FileNotFound,
    UnsupportedFormat,
    DecodeError,
    RemoteCallError,
}

/// Failure of an extraction. `Display` is the exact text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Error: GEMINI_API_KEY environment variable not set.")]
    MissingCredential,

    #[error("Error: Image file not found.")]
    FileNotFound,

    #[error("An error occurred: {0}")]
    Image(ImageError),

    #[error("An error occurred: {0}")]
    Remote(#[from] GeminiError),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::FileNotFound => ErrorKind::FileNotFound,
            Self::Image(ImageError::UnsupportedFormat(_)) => ErrorKind::UnsupportedFormat,
            Self::Image(_) => ErrorKind::DecodeError,
            Self::Remote(_) => ErrorKind::RemoteCallError,
        }
    }
}

impl From<ImageError> for ExtractError {
    fn from(error: ImageError) -> Self {
        match error {
            ImageError::NotFound(_) => Self::FileNotFound,
            other => Self::Image(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_errors_map_to_kinds() {
        let err = ExtractError::from(ImageError::NotFound("x.png".into()));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.to_string(), "Error: Image file not found.");

        let err = ExtractError::from(ImageError::UnsupportedFormat(".txt".into()));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(err.to_string(), "An error occurred: Unsupported file type: .txt");

        let err = ExtractError::from(ImageError::Raster("bad header".into()));
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert_eq!(
            err.to_string(),
            "An error occurred: Failed to open image file: bad header"
        );
    }

    #[test]
    fn remote_errors_keep_provider_message() {
        let err = ExtractError::from(GeminiError::Api {
            code: 400,
            message: "API key not valid. Please pass a valid API key.".into(),
        });
        assert_eq!(err.kind(), ErrorKind::RemoteCallError);
        assert_eq!(
            err.to_string(),
            "An error occurred: 400 API key not valid. Please pass a valid API key."
        );
    }
}
