//! subtrix - multi-language subtitle generation
//!
//! Transcribes one media file once per spoken language, segments each
//! transcript into readable captions, and cross-translates every successful
//! track into every other language. Jobs are tracked in an in-memory store
//! with a retention window, and results are written as SRT files.

pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod matrix;
pub mod media;
pub mod output;
pub mod segment;
pub mod status;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod workflow;
