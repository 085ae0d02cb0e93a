//! Scripted transmitter harness
//!
//! A software tuner and decoding engine that replay a JSON script instead of
//! demodulating IQ samples. Used for dry runs of the scanner and as the
//! deterministic backend of the scanner tests.

mod engine;
pub mod script;
mod tuner;

pub use engine::SimFactory;
pub use script::Script;
pub use tuner::SimTuner;
