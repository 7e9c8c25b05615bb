use serde::{Deserialize, Serialize};

/// Upper bound on files per upload batch, enforced before any URL is
/// requested.
pub const MAX_UPLOAD_BATCH: usize = 30;

/// A locally picked file awaiting upload.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

/// One pre-signed upload target, mapping a filename to the URL it must be
/// PUT to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadUrlInfo {
    pub filename: String,
    pub url: String,
}
