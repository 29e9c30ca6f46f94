pub mod transcription;
pub mod translation;

pub use transcription::*;
pub use translation::*;
