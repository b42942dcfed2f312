//! Speech service: one task at a time over speech-to-text, text-to-speech,
//! machine translation and text repair engines.
//!
//! The crate owns orchestration only.  Inference engines, the model catalog,
//! audio playback and media compression are collaborators plugged in through
//! traits ([`engine::EngineFactory`], [`catalog::ModelCatalog`],
//! [`audio::Player`], [`audio::MediaCompressor`]).

pub mod audio;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod event;
pub mod options;
pub mod selector;
pub mod service;
