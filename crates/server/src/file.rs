use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::ServerError;

/// Characters escaped when a file name is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// The one file being shared, resolved to an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    path: PathBuf,
    dir: PathBuf,
    name: String,
}

impl SharedFile {
    /// Resolves `path` to an absolute, existing regular file.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let given = path.as_ref();
        let path = match std::fs::canonicalize(given) {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServerError::FileNotFound(given.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        if !path.is_file() {
            return Err(ServerError::NotAFile(path));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ServerError::NotAFile(path.clone()))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ServerError::NotAFile(path.clone()))?;

        Ok(Self { path, dir, name })
    }

    /// Absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name; also the single URL path segment served.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the download URL for this file on `host:port`.
    pub fn url(&self, host: IpAddr, port: u16) -> String {
        let name = utf8_percent_encode(&self.name, PATH_SEGMENT);
        format!("http://{host}:{port}/{name}")
    }

    /// Returns `true` if a request path addresses this file.
    ///
    /// The path is percent-decoded before comparison; any query string must
    /// already be stripped.
    pub fn matches_path(&self, request_path: &str) -> bool {
        let Some(segment) = request_path.strip_prefix('/') else {
            return false;
        };
        match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => decoded == self.name,
            Err(_) => false,
        }
    }
}
