//! Core engine: the batched fetch → extract → accumulate → score loop.

pub mod accumulator;
pub mod extractor;
pub mod orchestrator;
pub mod scorer;
pub mod state;
