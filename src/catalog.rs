use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const BUNDLED_TRACKS: &str = include_str!("../assets/lofigirl-songs.json");
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

/// Ordered, read-only list of track paths sharing one base location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    base: String,
    tracks: Vec<String>,
}

impl Catalog {
    pub fn new(base: impl Into<String>, tracks: Vec<String>) -> Self {
        Self {
            base: base.into(),
            tracks,
        }
    }

    pub fn bundled(base: &str) -> Result<Self> {
        let tracks: Vec<String> =
            serde_json::from_str(BUNDLED_TRACKS).context("failed to parse bundled catalog")?;
        Ok(Self::new(base, tracks))
    }

    pub fn from_json_file(path: &Path, base: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let tracks: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        Ok(Self::new(base, tracks))
    }

    /// Builds a catalog from every audio file under `root`, with paths kept
    /// relative to it so the root acts as the base location.
    pub fn scan_folder(root: &Path) -> Self {
        let mut tracks = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_audio_file(path) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let joined = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            tracks.push(joined);
        }

        tracks.sort();
        Self::new(format!("{}/", root.display()), tracks)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.tracks.get(index).map(String::as_str)
    }

    pub fn location(&self, index: usize) -> Option<String> {
        self.get(index).map(|path| resolve(&self.base, path))
    }
}

/// Joins a base location (URL prefix or directory) with a relative path.
pub fn resolve(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    if base.ends_with('/') || base.ends_with(std::path::MAIN_SEPARATOR) {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Display name for a track path: `2023/04/1-Late-Night.mp3` becomes `Late Night`.
pub fn song_name(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let without_number = match file_name.find('-') {
        Some(dash) if dash > 0 && file_name[..dash].bytes().all(|b| b.is_ascii_digit()) => {
            &file_name[dash + 1..]
        }
        _ => file_name,
    };
    let without_ext = without_number
        .strip_suffix(".mp3")
        .unwrap_or(without_number);
    without_ext.replace('-', " ")
}

fn is_audio_file(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn song_name_strips_number_extension_and_dashes() {
        assert_eq!(song_name("2023/04/1-Late-Night-Study.mp3"), "Late Night Study");
        assert_eq!(song_name("12-Snowfall.mp3"), "Snowfall");
        assert_eq!(song_name("No-Number.mp3"), "No Number");
        assert_eq!(song_name("folder/track.flac"), "track.flac");
        assert_eq!(song_name(""), "");
    }

    #[test]
    fn location_joins_base_and_path() {
        let catalog = Catalog::new(
            "https://example.test/uploads/",
            vec![String::from("2023/04/a.mp3")],
        );
        assert_eq!(
            catalog.location(0).as_deref(),
            Some("https://example.test/uploads/2023/04/a.mp3")
        );
        assert_eq!(catalog.location(1), None);
        assert_eq!(resolve("https://example.test", "a.mp3"), "https://example.test/a.mp3");
        assert_eq!(resolve("", "a.mp3"), "a.mp3");
    }

    #[test]
    fn bundled_catalog_is_not_empty() {
        let catalog = Catalog::bundled("https://example.test/").expect("bundled");
        assert!(!catalog.is_empty());
        assert!(catalog.get(0).is_some_and(|path| path.ends_with(".mp3")));
    }

    #[test]
    fn json_catalog_loads_from_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        fs::write(&path, r#"["a.mp3", "b.mp3"]"#).expect("write");

        let catalog = Catalog::from_json_file(&path, "base/").expect("catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.location(1).as_deref(), Some("base/b.mp3"));
    }

    #[test]
    fn folder_scan_keeps_only_audio_files_relative_to_root() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("b.mp3"), b"").expect("write");
        fs::write(dir.path().join("nested").join("a.OGG"), b"").expect("write");
        fs::write(dir.path().join("cover.jpg"), b"").expect("write");

        let catalog = Catalog::scan_folder(dir.path());
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0), Some("b.mp3"));
        assert_eq!(catalog.get(1), Some("nested/a.OGG"));
        assert!(catalog.location(0).is_some_and(|loc| loc.ends_with("/b.mp3")));
    }
}
