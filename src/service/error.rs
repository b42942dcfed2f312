use thiserror::Error;

use super::notify::ErrorKind;
use crate::audio::{AudioSourceError, SourceKind};
use crate::engine::{EngineError, EngineKind};
use crate::selector::SelectError;

/// Why a control call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("model resolution failed: {0}")]
    ModelResolutionFailed(#[from] SelectError),

    #[error("{kind} engine construction failed: {source}")]
    EngineConstructionFailed {
        kind: EngineKind,
        #[source]
        source: EngineError,
    },

    #[error("{0} engine failed")]
    EngineRuntime(EngineKind),

    #[error("{kind:?} source error: {source}")]
    AudioSource {
        kind: SourceKind,
        #[source]
        source: AudioSourceError,
    },

    /// Rejected locally; nothing changed and nothing is notified.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ServiceError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ServiceError::InvalidState(reason.into())
    }

    /// Error class published for this failure, if any.
    pub fn notification(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::ModelResolutionFailed(_) => Some(ErrorKind::ModelResolution),
            ServiceError::EngineConstructionFailed { kind, .. } => {
                Some(ErrorKind::EngineConstruction(*kind))
            }
            ServiceError::EngineRuntime(kind) => Some(ErrorKind::EngineRuntime(*kind)),
            ServiceError::AudioSource {
                kind: SourceKind::Mic,
                ..
            } => Some(ErrorKind::MicSource),
            ServiceError::AudioSource {
                kind: SourceKind::File,
                ..
            } => Some(ErrorKind::FileSource),
            ServiceError::InvalidState(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_is_silent() {
        assert_eq!(ServiceError::invalid("busy").notification(), None);
    }

    #[test]
    fn classes_map_to_notifications() {
        let e: ServiceError = SelectError::NoModels(EngineKind::Stt).into();
        assert_eq!(e.notification(), Some(ErrorKind::ModelResolution));

        let e = ServiceError::AudioSource {
            kind: SourceKind::File,
            source: AudioSourceError::NotFound("x.wav".into()),
        };
        assert_eq!(e.notification(), Some(ErrorKind::FileSource));
        assert!(e.to_string().contains("x.wav"));
    }
}
