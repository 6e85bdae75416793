use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;

use crate::error::{Error, Result};

const SECRET_BYTES: usize = 32;

/// Creates the shared JWT secret at `path` unless a file is already there.
///
/// Existing files are trusted as-is, their content is not validated.
pub fn ensure_secret(path: &Path) -> Result<()> {
    if path.exists() {
        tracing::trace!(path = %path.display(), "JWT secret already present");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::fs("creating", parent, e))?;
    }

    write_secret(path, &generate_secret())?;

    if !path.exists() {
        return Err(Error::fs(
            "verifying JWT secret at",
            path,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file still missing after a successful write",
            ),
        ));
    }

    tracing::info!(path = %path.display(), "Created JWT secret");
    Ok(())
}

/// 32 bytes from the OS CSPRNG, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(unix)]
fn write_secret(path: &Path, secret: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::fs("creating JWT secret at", path, e))?;
    file.write_all(secret.as_bytes())
        .map_err(|e| Error::fs("writing JWT secret to", path, e))
}

#[cfg(not(unix))]
fn write_secret(path: &Path, secret: &str) -> Result<()> {
    std::fs::write(path, secret).map_err(|e| Error::fs("writing JWT secret to", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_hex_secret_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients/jwt.hex");

        ensure_secret(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        ensure_secret(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn existing_invalid_secret_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwt.hex");
        std::fs::write(&path, "not hex").unwrap();

        ensure_secret(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not hex");
    }

    #[test]
    fn secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[cfg(unix)]
    #[test]
    fn secret_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwt.hex");
        ensure_secret(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
