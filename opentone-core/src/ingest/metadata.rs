use std::io::Cursor;

use lofty::{Accessor, Probe, TaggedFileExt};

/// Extensions accepted as audio uploads
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "mp4", "ogg", "aif", "aiff",
];

pub fn is_audio_filename(filename: &str) -> bool {
    extension(filename)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// The best available title for an upload: the embedded tag if it has one,
/// otherwise the sanitized filename.
pub fn title_for(filename: &str, data: &[u8]) -> String {
    tagged_title(data).unwrap_or_else(|| title_from_filename(filename))
}

/// Reads the title from the file's embedded tags, if any
pub fn tagged_title(data: &[u8]) -> Option<String> {
    let tagged = Probe::new(Cursor::new(data))
        .guess_file_type()
        .ok()?
        .read()
        .ok()?;

    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;

    tag.title()
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Turns "Le_Duc Vacherin.zip" into "Le Duc Vacherin"
pub fn title_from_filename(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };

    stem.replace('_', " ").trim().to_string()
}

pub fn content_type_for(filename: &str) -> String {
    let mime = match extension(filename).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("m4a" | "mp4") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("aif" | "aiff") => "audio/aiff",
        _ => "application/octet-stream",
    };

    mime.to_string()
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_audio_filename_detection() {
        assert!(is_audio_filename("muppets.mp3"));
        assert!(is_audio_filename("SONG.FLAC"));
        assert!(!is_audio_filename("notes.txt"));
        assert!(!is_audio_filename("mp3"));
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        // Arbitrary bytes carry no tags
        assert_eq!(title_for("emptytags.mp3", &[0u8; 64]), "emptytags");
        assert_eq!(title_for("Le_Duc Vacherin.mp3", &[0u8; 64]), "Le Duc Vacherin");
    }

    #[test]
    fn test_tagged_title_is_none_for_garbage() {
        assert_eq!(tagged_title(&[0u8; 64]), None);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("a.ogg"), "audio/ogg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
