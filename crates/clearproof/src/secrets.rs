//! Provider API key resolution.
//!
//! A key may be configured three ways, checked in this order:
//!
//! 1. `apiKey` - inline value, handy for local runs
//! 2. `apiKeyFile` - path to a file holding the key (Docker secrets)
//! 3. `apiKeyEnvVar` - name of an environment variable holding the key

use std::fs;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key source configured")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The configured places an API key may come from. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    fn direct(&self) -> Option<&'a str> {
        self.direct.filter(|s| !s.is_empty())
    }

    fn file_path(&self) -> Option<&'a str> {
        self.file_path.filter(|s| !s.is_empty())
    }

    fn env_var(&self) -> Option<&'a str> {
        self.env_var.filter(|s| !s.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.direct().is_some() || self.file_path().is_some() || self.env_var().is_some()
    }
}

/// Resolves a key from the first configured source.
pub fn resolve_secret(source: SecretSource<'_>) -> Result<SecretString> {
    if let Some(value) = source.direct() {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = source.file_path() {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileRead {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = source.env_var() {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but an unconfigured key is `Ok(None)`.
pub fn resolve_secret_optional(source: SecretSource<'_>) -> Result<Option<SecretString>> {
    match resolve_secret(source) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the current user's home directory.
/// `~user/...` is left untouched.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source<'a>(
        direct: Option<&'a str>,
        file_path: Option<&'a str>,
        env_var: Option<&'a str>,
    ) -> SecretSource<'a> {
        SecretSource {
            direct,
            file_path,
            env_var,
        }
    }

    #[test]
    #[serial]
    fn test_inline_key_wins() {
        std::env::set_var("CLEARPROOF_TEST_KEY_1", "from-env");
        let key = resolve_secret(source(Some("inline"), None, Some("CLEARPROOF_TEST_KEY_1")))
            .unwrap();
        assert_eq!(key.expose_secret(), "inline");
        std::env::remove_var("CLEARPROOF_TEST_KEY_1");
    }

    #[test]
    #[serial]
    fn test_file_before_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();

        std::env::set_var("CLEARPROOF_TEST_KEY_2", "from-env");
        let key = resolve_secret(source(
            None,
            Some(file.path().to_str().unwrap()),
            Some("CLEARPROOF_TEST_KEY_2"),
        ))
        .unwrap();
        assert_eq!(key.expose_secret(), "from-file");
        std::env::remove_var("CLEARPROOF_TEST_KEY_2");
    }

    #[test]
    #[serial]
    fn test_env_fallback_and_empty_strings() {
        std::env::set_var("CLEARPROOF_TEST_KEY_3", "from-env\n");
        let key = resolve_secret(source(Some(""), Some(""), Some("CLEARPROOF_TEST_KEY_3")))
            .unwrap();
        assert_eq!(key.expose_secret(), "from-env");
        std::env::remove_var("CLEARPROOF_TEST_KEY_3");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resolve_secret(SecretSource::default()),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(source(None, Some("/nonexistent/clearproof/key"), None)),
            Err(SecretError::FileRead { .. })
        ));
        assert!(matches!(
            resolve_secret(source(None, None, Some("CLEARPROOF_DEFINITELY_UNSET_KEY"))),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        let result = resolve_secret(source(None, Some(file.path().to_str().unwrap()), None));
        assert!(matches!(result, Err(SecretError::EmptyFile { .. })));
    }

    #[test]
    fn test_optional_and_is_configured() {
        assert!(resolve_secret_optional(SecretSource::default())
            .unwrap()
            .is_none());
        assert!(!source(Some(""), None, None).is_configured());
        assert!(source(None, None, Some("X")).is_configured());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("~alice/key"), "~alice/key");
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            assert_eq!(expand_home("~/key"), format!("{}/key", home));
            assert_eq!(expand_home("~"), home);
        }
    }
}
