use std::io::{Cursor, Read};

use zip::ZipArchive;

use super::{
    content_type_for, is_audio_filename, title_from_filename, Expansion, IngestError,
    PendingTrack, SkippedMember,
};

/// Expands a ZIP archive into its audio members. Directories, bundler junk,
/// and non-audio members are skipped without failing the batch.
pub(super) fn expand_zip(filename: &str, data: &[u8]) -> Result<Expansion, IngestError> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| IngestError::Invalid(e.to_string()))?;

    let mut expansion = Expansion {
        album_hint: Some(title_from_filename(filename)),
        ..Default::default()
    };

    for index in 0..archive.len() {
        let mut member = match archive.by_index(index) {
            Ok(member) => member,
            Err(e) => {
                expansion.skipped.push(SkippedMember {
                    name: format!("#{index}"),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if member.is_dir() {
            continue;
        }

        let name = member.name().to_string();
        let base = name.rsplit('/').next().unwrap_or(&name).to_string();

        // macOS zips ship resource forks and dotfiles nobody asked for
        if name.starts_with("__MACOSX") || base.starts_with('.') {
            continue;
        }

        if !is_audio_filename(&base) {
            expansion.skipped.push(SkippedMember {
                name: base,
                reason: "not an audio file".to_string(),
            });
            continue;
        }

        let mut buffer = Vec::with_capacity(member.size() as usize);

        if let Err(e) = member.read_to_end(&mut buffer) {
            expansion.skipped.push(SkippedMember {
                name: base,
                reason: e.to_string(),
            });
            continue;
        }

        if buffer.is_empty() {
            expansion.skipped.push(SkippedMember {
                name: base,
                reason: "file is empty".to_string(),
            });
            continue;
        }

        expansion.tracks.push(PendingTrack {
            content_type: content_type_for(&base),
            filename: base,
            data: buffer,
        });
    }

    Ok(expansion)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::zip_bytes;

    #[test]
    fn test_audio_members_become_tracks() {
        let data = zip_bytes(&[
            ("one.mp3", &[1u8; 32]),
            ("two.mp3", &[2u8; 32]),
            ("three.mp3", &[3u8; 32]),
        ]);

        let expansion = expand_zip("Le Duc Vacherin.zip", &data).expect("expands");

        assert_eq!(expansion.tracks.len(), 3);
        assert!(expansion.skipped.is_empty());
        assert_eq!(expansion.album_hint.as_deref(), Some("Le Duc Vacherin"));
    }

    #[test]
    fn test_invalid_members_are_skipped() {
        let data = zip_bytes(&[("song.mp3", &[1u8; 32]), ("cover.txt", &[2u8; 8])]);

        let expansion = expand_zip("mixed.zip", &data).expect("expands");

        assert_eq!(expansion.tracks.len(), 1);
        assert_eq!(expansion.skipped.len(), 1);
        assert_eq!(expansion.skipped[0].name, "cover.txt");
    }

    #[test]
    fn test_mac_junk_is_ignored_silently() {
        let data = zip_bytes(&[
            ("album/song.mp3", &[1u8; 32]),
            ("__MACOSX/album/._song.mp3", &[0u8; 4]),
            ("album/.DS_Store", &[0u8; 4]),
        ]);

        let expansion = expand_zip("album.zip", &data).expect("expands");

        assert_eq!(expansion.tracks.len(), 1);
        assert_eq!(expansion.tracks[0].filename, "song.mp3");
        // Junk doesn't show up as a skip either
        assert!(expansion.skipped.is_empty());
    }

    #[test]
    fn test_garbage_archive_is_invalid() {
        let result = expand_zip("broken.zip", &[0u8; 16]);
        assert!(matches!(result, Err(IngestError::Invalid(_))));
    }
}
