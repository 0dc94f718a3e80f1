use crate::error::{Error, Result};
use crate::stream::AudioFormat;
use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::info;

/// Boxed audio source accepted by the feeder
pub type AudioStream = Box<dyn AsyncRead + Unpin + Send>;

fn wav_error(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::AudioSource(io),
        other => Error::InvalidArgument(format!("unsupported WAV file: {other}")),
    }
}

/// 16-bit PCM WAV file loaded into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).map_err(wav_error)?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(Error::InvalidArgument(format!(
                "{} is {}-bit {:?}; only 16-bit integer PCM is supported",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(wav_error)?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bytes_per_sample: 2,
        }
    }

    /// Interleaved little-endian PCM, as sent on the wire
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect()
    }
}

/// Opens `path` as a feeder source.
///
/// `.wav` files are decoded and must match `format`; anything else is streamed
/// as raw PCM straight from disk.
pub async fn open_source(path: impl AsRef<Path>, format: &AudioFormat) -> Result<AudioStream> {
    let path = path.as_ref();
    let is_wav = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        let audio = AudioFile::open(path)?;
        if audio.format() != *format {
            return Err(Error::InvalidArgument(format!(
                "{} is {}Hz/{}ch, expected {}Hz/{}ch",
                path.display(),
                audio.sample_rate,
                audio.channels,
                format.sample_rate,
                format.channels
            )));
        }
        return Ok(Box::new(Cursor::new(audio.pcm_bytes())));
    }

    info!("Streaming raw PCM from {}", path.display());
    let file = tokio::fs::File::open(path).await.map_err(Error::AudioSource)?;
    Ok(Box::new(file))
}
