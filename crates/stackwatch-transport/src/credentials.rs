//! TLS credential staging.
//!
//! Pipeline hosts hand over the engine's CA, client certificate, and
//! client key as PEM text. The docker CLI wants files, so the material is
//! written into a private temp directory that lives as long as the
//! returned [`StagedCredentials`].

use std::fs;
use std::path::{Path, PathBuf};

use stackwatch_core::TransportError;
use tempfile::TempDir;
use tracing::debug;

const CA_FILE: &str = "ca.pem";
const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

/// Locations of the three PEM files the docker CLI needs for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsPaths {
    /// Conventional file names inside a certificate directory
    /// (`ca.pem`, `cert.pem`, `key.pem`).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ca: dir.join(CA_FILE),
            cert: dir.join(CERT_FILE),
            key: dir.join(KEY_FILE),
        }
    }
}

/// PEM material written to disk. The directory is removed on drop.
#[derive(Debug)]
pub struct StagedCredentials {
    // Held for its Drop.
    _dir: TempDir,
    paths: TlsPaths,
}

impl StagedCredentials {
    /// Write CA, certificate, and key PEM contents into a fresh temp directory.
    pub fn stage(ca_pem: &str, cert_pem: &str, key_pem: &str) -> Result<Self, TransportError> {
        for (label, pem) in [("CA", ca_pem), ("certificate", cert_pem), ("key", key_pem)] {
            if pem.trim().is_empty() {
                return Err(TransportError::Staging(format!("{label} PEM is empty")));
            }
        }

        let dir = tempfile::Builder::new()
            .prefix("stackwatch-tls-")
            .tempdir()
            .map_err(|e| TransportError::Staging(format!("create temp dir: {e}")))?;
        let paths = TlsPaths::in_dir(dir.path());

        write_pem(&paths.ca, ca_pem)?;
        write_pem(&paths.cert, cert_pem)?;
        write_pem(&paths.key, key_pem)?;
        restrict_key(&paths.key)?;

        debug!(dir = %dir.path().display(), "TLS credentials staged");

        Ok(Self { _dir: dir, paths })
    }

    pub fn paths(&self) -> &TlsPaths {
        &self.paths
    }
}

fn write_pem(path: &Path, pem: &str) -> Result<(), TransportError> {
    let mut contents = pem.trim().to_string();
    contents.push('\n');
    fs::write(path, contents)
        .map_err(|e| TransportError::Staging(format!("write {}: {e}", path.display())))
}

#[cfg(unix)]
fn restrict_key(path: &Path) -> Result<(), TransportError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| TransportError::Staging(format!("chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_key(_path: &Path) -> Result<(), TransportError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

    #[test]
    fn stages_three_files() {
        let staged = StagedCredentials::stage(PEM, PEM, "  key material  ").unwrap();
        let paths = staged.paths().clone();

        assert!(paths.ca.ends_with("ca.pem"));
        assert_eq!(fs::read_to_string(&paths.cert).unwrap(), format!("{PEM}\n"));
        assert_eq!(fs::read_to_string(&paths.key).unwrap(), "key material\n");
    }

    #[test]
    fn directory_removed_on_drop() {
        let staged = StagedCredentials::stage(PEM, PEM, PEM).unwrap();
        let dir = staged.paths().ca.parent().unwrap().to_path_buf();
        assert!(dir.is_dir());

        drop(staged);
        assert!(!dir.exists());
    }

    #[test]
    fn empty_material_rejected() {
        let err = StagedCredentials::stage(PEM, "   ", PEM).unwrap_err();
        assert!(err.to_string().contains("certificate PEM is empty"));
    }

    #[cfg(unix)]
    #[test]
    fn key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let staged = StagedCredentials::stage(PEM, PEM, PEM).unwrap();
        let mode = fs::metadata(&staged.paths().key).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn paths_in_dir() {
        let paths = TlsPaths::in_dir(Path::new("/etc/docker/certs"));
        assert_eq!(paths.key, PathBuf::from("/etc/docker/certs/key.pem"));
    }
}
