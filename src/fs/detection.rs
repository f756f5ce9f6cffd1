// src/fs/detection.rs
//! Input file type detection using magic numbers and extension-based fallback.

use std::{fmt, path::Path};

use infer::{Infer, MatcherType};
use mime_guess::MimeGuess;

use crate::error::{Result, SpectrogramError};

/// Coarse file categories; only [`FileCategory::Audio`] can feed a session.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FileCategory {
    Audio,
    Video,
    Other,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileCategory::Audio => "Audio",
            FileCategory::Video => "Video",
            FileCategory::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

/// Holds a detected MIME type + category.
#[derive(Debug)]
pub struct FileType {
    pub mime: String,
    pub category: FileCategory,
}

/// Detect MIME type & category for a given file path.
pub fn detect_file_type(path: &Path) -> Result<FileType> {
    // Magic numbers first; headerless formats fall through to the extension.
    if let Some(kind) = Infer::new().get_from_path(path)? {
        let mime = kind.mime_type().to_string();
        let category = match kind.matcher_type() {
            MatcherType::Audio => FileCategory::Audio,
            MatcherType::Video => FileCategory::Video,
            _ => FileCategory::Other,
        };
        return Ok(FileType { mime, category });
    }

    let mime = MimeGuess::from_path(path).first_or_octet_stream().to_string();
    let category = match mime.split('/').next().unwrap_or("application") {
        "audio" => FileCategory::Audio,
        "video" => FileCategory::Video,
        _ => FileCategory::Other,
    };

    Ok(FileType { mime, category })
}

/// Reject anything that is not recognisably audio before handing it to the
/// decoder.
pub fn ensure_audio_file(path: &Path) -> Result<FileType> {
    let file_type = detect_file_type(path)?;
    if file_type.category != FileCategory::Audio {
        return Err(SpectrogramError::NotAudio {
            path: path.to_path_buf(),
            mime: file_type.mime,
        });
    }
    Ok(file_type)
}
