use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its subdirectories and:
/// - Creates an initial `config.json` file with default settings
/// - Copies `secret_file` into `.secrets/client_secret.json`.
///
/// # Arguments
/// - `tally_home` - The directory that will be the root of the home directory, e.g. `$HOME/tally`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON for the Google Sheets API.
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(tally_home: &Path, secret_file: &Path) -> Result<Out<()>> {
    let config = Config::create(tally_home, secret_file)
        .await
        .context("Unable to create the home directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Created the tally home directory at {}. Place your OAuth token at {} before running \
        'tally aggregate'.",
        config.root().display(),
        config.token_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let tmp = TempDir::new().unwrap();
        let secret = tmp.path().join("secret.json");
        std::fs::write(&secret, r#"{"installed": {}}"#).unwrap();
        let home = tmp.path().join("home");

        let out = init(&home, &secret).await.unwrap();
        assert!(out.message().contains("token.json"));

        let config = Config::load(&home).await.unwrap();
        assert!(config.client_secret_path().is_file());
    }

    #[tokio::test]
    async fn test_init_missing_secret_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let e = init(&tmp.path().join("home"), &tmp.path().join("nope.json"))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Config);
    }
}
