use reqwest::{header::CONTENT_TYPE, Client};
use thiserror::Error;
use url::Url;

mod archive;
mod metadata;

pub use metadata::*;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Input is invalid: {0}")]
    Invalid(String),

    #[error("Unsupported input type")]
    UnsupportedType,

    #[error("Failed to fetch resource: {0}")]
    FetchError(String),
}

/// One source submitted in an upload request. A single source can expand
/// into several tracks when it's an archive.
#[derive(Debug)]
pub enum UploadSource {
    File {
        filename: String,
        content_type: Option<String>,
        data: Vec<u8>,
    },
    Url(String),
}

/// A member of an upload that couldn't be turned into a track. Skips never
/// fail the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMember {
    pub name: String,
    pub reason: String,
}

/// A validated audio file waiting to become an asset
#[derive(Debug)]
pub struct PendingTrack {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// What one source expanded into
#[derive(Debug, Default)]
pub struct Expansion {
    pub tracks: Vec<PendingTrack>,
    pub skipped: Vec<SkippedMember>,
    /// A title suggestion for the enclosing album, if the source carried one
    pub album_hint: Option<String>,
}

impl UploadSource {
    /// A human readable name for skip reporting
    pub fn label(&self) -> String {
        match self {
            Self::File { filename, .. } => filename.clone(),
            Self::Url(url) => url.clone(),
        }
    }

    /// Fetches and validates the source, expanding archives into their
    /// audio members.
    pub async fn resolve(self) -> Result<Expansion, IngestError> {
        match self {
            Self::File {
                filename,
                content_type,
                data,
            } => expand_file(filename, content_type, data),
            Self::Url(url) => {
                let (filename, content_type, data) = fetch_url(&url).await?;
                expand_file(filename, content_type, data)
            }
        }
    }
}

fn expand_file(
    filename: String,
    content_type: Option<String>,
    data: Vec<u8>,
) -> Result<Expansion, IngestError> {
    if is_zip(&filename, content_type.as_deref()) {
        return archive::expand_zip(&filename, &data);
    }

    if !is_audio_filename(&filename) {
        return Err(IngestError::UnsupportedType);
    }

    if data.is_empty() {
        return Err(IngestError::Invalid("file is empty".to_string()));
    }

    let content_type = content_type
        .filter(|c| c.starts_with("audio/"))
        .unwrap_or_else(|| content_type_for(&filename));

    Ok(Expansion {
        tracks: vec![PendingTrack {
            filename,
            content_type,
            data,
        }],
        skipped: Vec::new(),
        album_hint: None,
    })
}

fn is_zip(filename: &str, content_type: Option<&str>) -> bool {
    filename.to_lowercase().ends_with(".zip")
        || content_type.is_some_and(|c| c.contains("zip"))
}

async fn fetch_url(input: &str) -> Result<(String, Option<String>, Vec<u8>), IngestError> {
    let url = Url::parse(input).map_err(|e| IngestError::Invalid(e.to_string()))?;

    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string();

    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IngestError::FetchError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::FetchError(format!(
            "unexpected status {status}"
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let data = response
        .bytes()
        .await
        .map_err(|e| IngestError::FetchError(e.to_string()))?
        .to_vec();

    Ok((filename, content_type, data))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_audio_file_expands_to_one_track() {
        let expansion = expand_file(
            "muppets.mp3".to_string(),
            Some("audio/mpeg".to_string()),
            vec![0u8; 64],
        )
        .expect("expands");

        assert_eq!(expansion.tracks.len(), 1);
        assert_eq!(expansion.tracks[0].content_type, "audio/mpeg");
        assert!(expansion.album_hint.is_none());
    }

    #[test]
    fn test_chrome_content_type_is_normalized() {
        // Chrome uploads mp3s as audio/mp3, which is kept as-is because it
        // is an audio type; non-audio hints fall back to the extension
        let expansion = expand_file(
            "muppets.mp3".to_string(),
            Some("application/octet-stream".to_string()),
            vec![0u8; 64],
        )
        .expect("expands");

        assert_eq!(expansion.tracks[0].content_type, "audio/mpeg");
    }

    #[test]
    fn test_non_audio_file_is_rejected() {
        let result = expand_file("notes.txt".to_string(), None, vec![1, 2, 3]);
        assert!(matches!(result, Err(IngestError::UnsupportedType)));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let result = expand_file("muppets.mp3".to_string(), None, Vec::new());
        assert!(matches!(result, Err(IngestError::Invalid(_))));
    }
}
