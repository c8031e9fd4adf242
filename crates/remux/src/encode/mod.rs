//! Engine invocation

pub mod ffmpeg;

pub use ffmpeg::{build_engine_command, EngineParams, EngineProfile};
