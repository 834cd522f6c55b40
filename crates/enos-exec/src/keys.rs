//! SSH key material and credential decoding

use std::path::{Path, PathBuf};

use russh::keys::{PrivateKey, decode_secret_key, load_secret_key};

/// Where the SSH private key comes from
#[derive(Clone)]
pub enum KeySource {
    /// PEM/OpenSSH encoded key material
    Inline(String),
    /// Path to a key file
    Path(PathBuf),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Inline(_) => f.write_str("Inline([redacted])"),
            KeySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// Where the key passphrase comes from
#[derive(Clone)]
pub enum PassphraseSource {
    /// Passphrase given directly
    Inline(String),
    /// File whose contents are the passphrase
    Path(PathBuf),
}

impl std::fmt::Debug for PassphraseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassphraseSource::Inline(_) => f.write_str("Inline([redacted])"),
            PassphraseSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

impl PassphraseSource {
    /// Read the passphrase
    ///
    /// A single trailing newline in a passphrase file is ignored.
    ///
    /// # Errors
    /// Returns `KeyError::NotFound` if the passphrase file cannot be read
    pub fn resolve(&self) -> Result<String, KeyError> {
        match self {
            PassphraseSource::Inline(passphrase) => Ok(passphrase.clone()),
            PassphraseSource::Path(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| KeyError::NotFound(format!("{}: {e}", path.display())))?;
                let line = contents.strip_suffix('\n').unwrap_or(&contents);
                Ok(line.strip_suffix('\r').unwrap_or(line).to_string())
            }
        }
    }
}

impl KeySource {
    /// Load and decrypt the private key
    ///
    /// # Errors
    /// Returns `KeyError` if the file is missing or too open, the passphrase
    /// cannot be read, or the key cannot be decoded with it
    pub fn load(&self, passphrase: Option<&PassphraseSource>) -> Result<PrivateKey, KeyError> {
        let passphrase = passphrase.map(PassphraseSource::resolve).transpose()?;

        match self {
            KeySource::Inline(pem) => decode_secret_key(pem, passphrase.as_deref())
                .map_err(|e| KeyError::Invalid(e.to_string())),
            KeySource::Path(path) => {
                validate_key_permissions(path)?;
                load_secret_key(path, passphrase.as_deref())
                    .map_err(|e| KeyError::Invalid(format!("{}: {e}", path.display())))
            }
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unable to decode key: {0}")]
    Invalid(String),
}

/// Decode base64 text, ignoring surrounding whitespace
///
/// # Errors
/// Returns `KeyError::InvalidBase64` if the input is not valid base64
pub fn base64_decode(input: &str) -> Result<Vec<u8>, KeyError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|_| KeyError::InvalidBase64)
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| KeyError::NotFound(format!("{}: {e}", path.display())))?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|e| KeyError::NotFound(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KEY: &str = include_str!("../testdata/id_ed25519");
    const ENCRYPTED_KEY: &str = include_str!("../testdata/id_ed25519_passphrase");

    #[test]
    fn test_inline_key_loads() {
        let key = KeySource::Inline(KEY.to_string()).load(None);
        assert!(key.is_ok());
    }

    #[test]
    fn test_inline_key_garbage() {
        let err = KeySource::Inline("not a key".to_string())
            .load(None)
            .unwrap_err();
        assert!(matches!(err, KeyError::Invalid(_)));
    }

    #[test]
    fn test_encrypted_key_needs_passphrase() {
        let source = KeySource::Inline(ENCRYPTED_KEY.to_string());
        assert!(source.load(None).is_err());

        let wrong = PassphraseSource::Inline("wrong".to_string());
        assert!(source.load(Some(&wrong)).is_err());

        let right = PassphraseSource::Inline("hunter2".to_string());
        assert!(source.load(Some(&right)).is_ok());
    }

    #[test]
    fn test_passphrase_file_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hunter2").unwrap();

        let source = PassphraseSource::Path(file.path().to_path_buf());
        assert_eq!(source.resolve().unwrap(), "hunter2");
    }

    #[test]
    fn test_key_path_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KEY.as_bytes()).unwrap();

        let key = KeySource::Path(file.path().to_path_buf()).load(None);
        assert!(key.is_ok());
    }

    #[test]
    fn test_key_path_missing() {
        let err = KeySource::Path(PathBuf::from("/nonexistent/enos/id_rsa"))
            .load(None)
            .unwrap_err();
        assert!(matches!(err, KeyError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_path_too_open() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KEY.as_bytes()).unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = KeySource::Path(file.path().to_path_buf())
            .load(None)
            .unwrap_err();
        assert!(matches!(err, KeyError::BadPermissions(_)));
    }

    #[test]
    fn test_debug_redacts_inline() {
        let rendered = format!("{:?}", KeySource::Inline(KEY.to_string()));
        assert!(!rendered.contains("OPENSSH"));
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(base64_decode(" aGVsbG8= \n").unwrap(), b"hello");
        assert!(matches!(base64_decode("%%%"), Err(KeyError::InvalidBase64)));
    }
}
