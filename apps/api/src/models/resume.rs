use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Content types the oracle can read as an inline attachment.
pub const SUPPORTED_ATTACHMENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
];

/// Upload cap for resume files (10 MiB).
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// A resume file, already base64-encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

impl Attachment {
    /// Encodes raw file bytes. Returns `None` when the content type is not one
    /// the oracle accepts.
    pub fn from_bytes(name: impl Into<String>, mime_type: &str, bytes: &[u8]) -> Option<Self> {
        let mime_type = normalize_mime(mime_type);
        if !is_supported_mime(&mime_type) {
            return None;
        }
        Some(Self {
            name: name.into(),
            mime_type,
            data: STANDARD.encode(bytes),
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

pub fn is_supported_mime(mime_type: &str) -> bool {
    SUPPORTED_ATTACHMENT_TYPES.contains(&mime_type)
}

/// Lowercases and drops parameters (`image/JPEG; q=1` → `image/jpeg`).
/// `image/jpg` is a common misspelling and is folded into `image/jpeg`.
fn normalize_mime(raw: &str) -> String {
    let base = raw.split(';').next().unwrap_or_default().trim().to_lowercase();
    if base == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        base
    }
}

/// Candidate data supplied by the user.
///
/// Text and file are mutually exclusive: setting one replaces the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResumeInput {
    #[default]
    Empty,
    Text(String),
    File(Attachment),
}

impl ResumeInput {
    /// Blank text collapses to `Empty`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            ResumeInput::Empty
        } else {
            ResumeInput::Text(text)
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, ResumeInput::Empty)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ResumeInput::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            ResumeInput::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn summary(&self) -> ResumeSummary {
        match self {
            ResumeInput::Empty => ResumeSummary::None,
            ResumeInput::Text(text) => ResumeSummary::Text {
                chars: text.chars().count(),
            },
            ResumeInput::File(file) => ResumeSummary::File {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            },
        }
    }
}

/// What the snapshot reveals about the resume, without echoing its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeSummary {
    None,
    Text { chars: usize },
    File { name: String, mime_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_empty() {
        assert_eq!(ResumeInput::from_text("   \n"), ResumeInput::Empty);
        assert!(!ResumeInput::from_text("").is_present());
    }

    #[test]
    fn test_attachment_encodes_base64() {
        let file = Attachment::from_bytes("cv.pdf", "application/pdf", b"%PDF-1.7").unwrap();
        assert_eq!(file.data, "JVBERi0xLjc=");
        assert!(file.is_pdf());
    }

    #[test]
    fn test_attachment_normalizes_mime() {
        let file = Attachment::from_bytes("me.jpg", "Image/JPG; charset=binary", b"x").unwrap();
        assert_eq!(file.mime_type, "image/jpeg");
    }

    #[test]
    fn test_attachment_rejects_unsupported_type() {
        assert!(Attachment::from_bytes("cv.docx", "application/msword", b"x").is_none());
    }

    #[test]
    fn test_text_and_file_are_exclusive() {
        let file = Attachment::from_bytes("cv.png", "image/png", b"png").unwrap();
        let resume = ResumeInput::File(file);
        assert!(resume.text().is_none());
        assert!(resume.attachment().is_some());

        let resume = ResumeInput::from_text("Built 3 ML pipelines");
        assert!(resume.attachment().is_none());
        assert_eq!(resume.text(), Some("Built 3 ML pipelines"));
    }

    #[test]
    fn test_summary_hides_content() {
        let summary = ResumeInput::from_text("héllo").summary();
        assert_eq!(summary, ResumeSummary::Text { chars: 5 });
    }
}
