pub mod file;

pub use file::{open_source, AudioFile, AudioStream};
