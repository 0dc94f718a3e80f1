use crate::channel::DuplexChannel;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Chunk size used when the duration-based size comes out as zero
pub const FALLBACK_CHUNK_BYTES: usize = 3200;

/// Raw PCM layout of the audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bytes_per_sample: 2,
        }
    }
}

impl AudioFormat {
    /// Bytes for one sample across all channels
    pub fn frame_bytes(&self) -> u64 {
        u64::from(self.channels) * u64::from(self.bytes_per_sample)
    }

    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * self.frame_bytes()
    }
}

/// Bytes of PCM covering `window`, aligned down to whole frames.
///
/// Computed with millisecond precision so sub-second windows work
/// (16 kHz mono 16-bit over 200 ms = 6400). Falls back to
/// `FALLBACK_CHUNK_BYTES` when the result is zero or not representable.
pub fn chunk_bytes(format: &AudioFormat, window: Duration) -> usize {
    let raw = u64::try_from(window.as_millis())
        .ok()
        .and_then(|millis| format.bytes_per_second().checked_mul(millis))
        .map(|scaled| scaled / 1000);
    let Some(raw) = raw else {
        warn!(
            "Chunk window {:?} overflows the chunk size, using {} bytes",
            window, FALLBACK_CHUNK_BYTES
        );
        return FALLBACK_CHUNK_BYTES;
    };

    let frame = format.frame_bytes();
    let aligned = if frame > 0 { raw - raw % frame } else { raw };
    match usize::try_from(aligned) {
        Ok(0) => FALLBACK_CHUNK_BYTES,
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(
                "Chunk size {} does not fit in memory, using {} bytes",
                aligned, FALLBACK_CHUNK_BYTES
            );
            FALLBACK_CHUNK_BYTES
        }
    }
}

/// Reads until `buf` is full or the source ends; returns the bytes read
async fn read_window<R>(source: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Paces raw audio onto a channel in fixed-size chunks
pub struct AudioFeeder {
    chunk_size: usize,
    pacing: Duration,
    chunks_sent: usize,
    bytes_sent: u64,
}

impl AudioFeeder {
    pub fn new(format: AudioFormat, chunk_duration: Duration) -> Self {
        Self {
            chunk_size: chunk_bytes(&format, chunk_duration),
            pacing: chunk_duration / 2,
            chunks_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Wait between consecutive sends
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Streams `source` onto `channel` until the source is exhausted.
    ///
    /// A short final window is sent as-is. Read failures (other than end of input)
    /// and send failures end feeding immediately; nothing is retried. Cancellation is
    /// observed while reading and while pacing, never in the middle of a send, and
    /// yields `Error::Cancelled`.
    pub async fn feed<R>(
        &mut self,
        channel: &DuplexChannel,
        source: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.chunk_size];

        info!(
            "Feeding audio to session {} ({} byte chunks every {:?})",
            channel.session_id(),
            self.chunk_size,
            self.pacing
        );

        loop {
            let filled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                read = read_window(source, &mut buf) => read.map_err(Error::AudioSource)?,
            };

            if filled == 0 {
                break;
            }

            channel.send_bytes(&buf[..filled]).await?;
            self.chunks_sent += 1;
            self.bytes_sent += filled as u64;
            debug!("Sent chunk {} ({} bytes)", self.chunks_sent, filled);

            if filled < buf.len() {
                // Short read means the source ended mid-window
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.pacing) => {}
            }
        }

        info!(
            "Audio source exhausted: {} chunks, {} bytes",
            self.chunks_sent, self.bytes_sent
        );
        Ok(())
    }
}
