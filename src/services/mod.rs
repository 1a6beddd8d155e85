//! Services layer for the preference learning engine
//!
//! Provides the text generator collaborator used during contrastive pair
//! synthesis.

pub mod generator;

pub use generator::{style_instruction, GeneratorConfig, OllamaGenerator, ResponseGenerator};
