use std::path::Path;

pub mod cli;
pub mod config;
pub mod error;
pub mod gemini;
pub mod image_loader;

pub use config::Config;
pub use error::{ErrorKind, ExtractError};
pub use gemini::GeminiClient;

pub const PROMPT: &str = concat!(
    "Extract all text from this receipt, including line items, prices, and the total. ",
    "Present it in a structured format that is easy to read, like the original receipt. ",
    "Identify key fields like subtotal, tax, and total. ",
    "Do not include any other conversational text.",
);

pub fn create_client(api_key: &str, config: &Config) -> GeminiClient {
    GeminiClient::new(api_key)
        .with_base_url(&config.base_url)
        .with_model(&config.model)
}

/// Transcribes the image at `path` and returns the model's text as-is.
///
/// A missing credential is reported before the filesystem or network is touched.
pub async fn extract(config: &Config, path: &Path) -> Result<String, ExtractError> {
    let api_key = config.credential().ok_or(ExtractError::MissingCredential)?;
    let client = create_client(api_key, config);

    let image = image_loader::load(path)?;
    let upload = image.encode_for_upload(image_loader::MAX_INLINE_BYTES)?;
    drop(image);

    let text = client.generate_content(PROMPT, &upload).await?;
    Ok(text)
}

/// Like [`extract`], with failures rendered as their user-facing message.
pub async fn extract_or_message(config: &Config, path: &Path) -> String {
    match extract(config, path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(kind = ?e.kind(), "extraction failed");
            e.to_string()
        }
    }
}
