//! Test helper modules for wavstream-player integration tests
//!
//! - `audio_generator`: canonical wave files written with hound
//! - `riff_builder`: hand-assembled RIFF containers (filler chunks, odd sizes)
//! - `fixtures`: temporary directory holding generated files

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod fixtures;
pub mod riff_builder;

pub use audio_generator::{generate_pcm_wav, pcm_pattern};
pub use fixtures::Fixtures;
pub use riff_builder::RiffBuilder;
