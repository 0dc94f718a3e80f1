use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result of a file upload
///
/// Normal uploads return a task to poll; short ("one sentence") uploads are
/// transcribed inline and return the result right away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResult {
    Task {
        task_id: String,
    },
    Inline {
        status: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        data: String,
    },
}

impl UploadResult {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UploadResult::Task { task_id } => Some(task_id),
            UploadResult::Inline { .. } => None,
        }
    }
}

/// Options for `HttpApi::upload`
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Skip summarisation, transcribe only
    pub transcribe_only: bool,
    /// Short clip mode: the result comes back inline
    pub short_mode: bool,
    pub model: crate::session::ModelType,
}

/// One speaker-attributed segment of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub start_time: f64,
    pub end_time: f64,
    pub speaker: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    NormalQuality,
    NormalSpeed,
    ShortAsrQuality,
    ShortAsrSpeed,
    LiveAudioQuality,
    LiveAudioSpeed,
    #[serde(other)]
    Other,
}

/// Delivery attempt of a completion callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRecord {
    pub timestamp: String,
    pub status: String,
    pub code: u32,
}

/// Processing state of a transcription task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub usage_id: Option<String>,
    #[serde(default)]
    pub overview_md: Option<String>,
    #[serde(default)]
    pub summary_md: Option<String>,
    #[serde(default)]
    pub details: Vec<Utterance>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub callback_history: Vec<CallbackRecord>,
    #[serde(default)]
    pub task_type: Option<TaskType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub share_url: String,
    pub expiration_day: i32,
    pub expired_at: String,
}

/// Utterance paired with its translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedUtterance {
    pub utterance: Utterance,
    pub translation: String,
}

/// Translation of a finished task; the shape depends on what was translated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TranslationResult {
    Transcribe {
        task_id: String,
        status: String,
        lang: Language,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        details: Vec<TranslatedUtterance>,
    },
    Summary {
        task_id: String,
        status: String,
        lang: Language,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        overview_md: Option<String>,
        #[serde(default)]
        summary_md: Option<String>,
        #[serde(default)]
        keywords: Vec<String>,
    },
}

impl TranslationResult {
    pub fn status(&self) -> &str {
        match self {
            TranslationResult::Transcribe { status, .. }
            | TranslationResult::Summary { status, .. } => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTranslation {
    pub status: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceTranslation {
    pub status: String,
    pub lang: Language,
    #[serde(default)]
    pub details: Vec<Utterance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTask {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryContent {
    pub short: String,
    pub long: String,
    pub all: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Task completion report forwarded to the service's callback endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub task_id: String,
    pub status: String,
    pub code: u16,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(Error::InvalidArgument(format!(concat!("unknown ", $what, ": {}"), other))),
                }
            }
        }
    };
}

wire_enum!(
    /// Translation target language
    Language, "language" {
        ChineseSimplified => "zh",
        EnglishUs => "en",
        Japanese => "ja",
        Korean => "ko",
        French => "fr",
        German => "de",
    }
);

wire_enum!(
    /// What to export from a finished task
    ExportKind, "export kind" {
        Transcript => "transcript",
        Overview => "overview",
        Summary => "summary",
    }
);

wire_enum!(
    ExportFormat, "export format" {
        Pdf => "pdf",
        Txt => "txt",
        Docx => "docx",
    }
);
