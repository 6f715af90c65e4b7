use thiserror::Error;

/// Errors produced while loading a PDF into a [`DocumentModel`](crate::DocumentModel).
///
/// Tokenizer and object-level variants (`MalformedSyntax`, `MalformedObject`) are
/// recoverable where the failing unit is optional: the containing object or content
/// operator is skipped. Everything else aborts the load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed syntax at byte {position}: {message}")]
    MalformedSyntax { position: usize, message: String },

    #[error("Malformed object at byte {position}: {message}")]
    MalformedObject { position: usize, message: String },

    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    #[error("Document is encrypted")]
    EncryptedDocument,

    #[error("Structural limit exceeded: {0}")]
    StructuralLimitExceeded(String),

    #[error("Unresolved object reference: {0} {1} R")]
    UnresolvedReference(u32, u16),

    #[error("Stream decode error: {0}")]
    StreamDecode(String),
}

impl LoadError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        LoadError::MalformedSyntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn object(position: usize, message: impl Into<String>) -> Self {
        LoadError::MalformedObject {
            position,
            message: message.into(),
        }
    }

    /// Whether this error describes the document structure as a whole
    /// (as opposed to a single damaged object or stream).
    pub fn is_fatal_structure(&self) -> bool {
        matches!(
            self,
            LoadError::Io(_)
                | LoadError::UnreadableDocument(_)
                | LoadError::EncryptedDocument
                | LoadError::StructuralLimitExceeded(_)
        )
    }
}

// The catalog hands out recorded parse failures more than once
impl Clone for LoadError {
    fn clone(&self) -> Self {
        match self {
            LoadError::Io(e) => LoadError::Io(std::io::Error::new(e.kind(), e.to_string())),
            LoadError::MalformedSyntax { position, message } => LoadError::MalformedSyntax {
                position: *position,
                message: message.clone(),
            },
            LoadError::MalformedObject { position, message } => LoadError::MalformedObject {
                position: *position,
                message: message.clone(),
            },
            LoadError::UnreadableDocument(m) => LoadError::UnreadableDocument(m.clone()),
            LoadError::EncryptedDocument => LoadError::EncryptedDocument,
            LoadError::StructuralLimitExceeded(m) => LoadError::StructuralLimitExceeded(m.clone()),
            LoadError::UnresolvedReference(n, g) => LoadError::UnresolvedReference(*n, *g),
            LoadError::StreamDecode(m) => LoadError::StreamDecode(m.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
