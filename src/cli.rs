//! Command surface: `--input` is transcribed, the result is printed, and
//! optionally saved with `--output`.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::Config;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "receipt-ocr",
    version,
    about = "A CLI tool to extract text from an image using Gemini 1.5 Flash."
)]
pub struct Cli {
    /// Path to the input image file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to save the output text file (optional).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, env = "GEMINI_API_KEY", hide = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL, hide = true)]
    pub base_url: String,

    /// Model to send the image to.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Log debug output to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config::new(self.api_key.clone())
            .with_base_url(&self.base_url)
            .with_model(&self.model)
    }
}

/// Prints the extraction result to `out` and writes it to `--output` when given.
///
/// Extraction failures are printed like any other result; only failures to
/// write to `out` itself are returned.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> io::Result<()> {
    let text = crate::extract_or_message(&cli.config(), &cli.input).await;
    writeln!(out, "{text}")?;

    if let Some(path) = &cli.output {
        match std::fs::write(path, &text) {
            Ok(()) => writeln!(out, "\nText successfully saved to {}", path.display())?,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to save output");
                writeln!(out, "\nError saving file: {e}")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_short_and_long_flags() {
        let cli =
            Cli::try_parse_from(["receipt-ocr", "-i", "receipt.png", "-o", "out.txt"]).unwrap();
        assert_eq!(cli.input, Path::new("receipt.png"));
        assert_eq!(cli.output.as_deref(), Some(Path::new("out.txt")));

        let cli = Cli::try_parse_from(["receipt-ocr", "--input", "scan.heic"]).unwrap();
        assert_eq!(cli.input, Path::new("scan.heic"));
        assert!(cli.output.is_none());
    }

    #[test]
    fn input_is_required() {
        let err = Cli::try_parse_from(["receipt-ocr", "-o", "out.txt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn config_carries_flags() {
        let cli = Cli::try_parse_from([
            "receipt-ocr",
            "-i",
            "a.png",
            "--api-key",
            "k",
            "--base-url",
            "http://127.0.0.1:9",
            "--model",
            "gemini-test",
        ])
        .unwrap();

        assert_eq!(
            cli.config(),
            Config::new(Some("k".into()))
                .with_base_url("http://127.0.0.1:9")
                .with_model("gemini-test")
        );
    }

    #[tokio::test]
    async fn missing_key_is_printed_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let cli = Cli {
            input: dir.path().join("receipt.png"),
            output: Some(output.clone()),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            verbose: false,
        };

        let mut out = Vec::new();
        run(&cli, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(
            printed,
            format!(
                "{}\n\nText successfully saved to {}\n",
                "Error: GEMINI_API_KEY environment variable not set.",
                output.display()
            )
        );
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "Error: GEMINI_API_KEY environment variable not set."
        );
    }

    #[tokio::test]
    async fn unwritable_output_reports_error_after_result() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            input: dir.path().join("receipt.png"),
            output: Some(dir.path().join("missing-dir").join("out.txt")),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            verbose: false,
        };

        let mut out = Vec::new();
        run(&cli, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Error: GEMINI_API_KEY environment variable not set.\n"));
        assert!(printed.contains("\nError saving file: "));
    }
}
