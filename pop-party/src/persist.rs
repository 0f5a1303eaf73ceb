/*!
Durable storage for ledgers, session registries and party configurations.

Every save goes through [`atomic_write`]: the bytes are written and synced to a fresh
temporary file in the destination directory, which is then renamed over the destination. A
crash mid-write leaves either the old file or the new one, never a torn mix.

Ledgers call these functions while holding their own lock, so a save can never interleave
with a mutation.
*/

use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::*;

/// Error types that may arise while reading or writing durable storage.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The file system refused an operation.
    #[error("couldn't access {}: {source}", .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file exists but its contents do not decode.
    #[error("couldn't decode {}: {reason}", .path.display())]
    Decode {
        /// The file involved.
        path: PathBuf,
        /// The decoder's explanation.
        reason: String,
    },
    /// A value could not be encoded.
    #[error("couldn't encode {}: {reason}", .path.display())]
    Encode {
        /// The destination file.
        path: PathBuf,
        /// The encoder's explanation.
        reason: String,
    },
}

impl PersistError {
    fn io(path: &Path, source: io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(path: &Path, reason: impl ToString) -> Self {
        PersistError::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn encode(path: &Path, reason: impl ToString) -> Self {
        PersistError::Encode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Replace the contents of `path` with `bytes` atomically, creating parent directories as
/// needed.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o660))
            .map_err(|e| PersistError::io(temp.path(), e))?;
    }

    temp.write_all(bytes)
        .map_err(|e| PersistError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PersistError::io(temp.path(), e))?;

    let _ = temp
        .persist(path)
        .map_err(|e| PersistError::io(path, e.error))?;
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, PersistError> {
    fs::read(path).map_err(|e| PersistError::io(path, e))
}

/// Save `value` as JSON.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec(value).map_err(|e| PersistError::encode(path, e))?;
    atomic_write(path, &bytes)
}

/// Load a value saved with [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| PersistError::decode(path, e))
}

/// Save `value` in the compact binary encoding used for party configurations.
pub fn save_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = bincode::serialize(value).map_err(|e| PersistError::encode(path, e))?;
    atomic_write(path, &bytes)
}

/// Load a value saved with [`save_bincode`].
pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let bytes = read(path)?;
    bincode::deserialize(&bytes).map_err(|e| PersistError::decode(path, e))
}

/// Read a whole text file, such as a TOML party description.
pub fn read_text(path: &Path) -> Result<String, PersistError> {
    fs::read_to_string(path).map_err(|e| PersistError::io(path, e))
}
