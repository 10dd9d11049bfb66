//! Stand-in adapters for running without voice hardware
//!
//! [`SilenceAudio`] paces 20 ms frames of silence and drops playback;
//! [`LoggingLine`] only logs the actions it is asked to perform. Together
//! they let the gateway register, route and answer SIP calls on a
//! development machine.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use codec_core::FRAME_DURATION_MS;
use parking_lot::Mutex;
use rtp_core::{AudioControl, AudioPath};
use tracing::info;

use crate::line::CallControl;

/// Silent capture, discarded playback, real-time pacing
#[derive(Debug)]
pub struct SilenceAudio {
    frame: Duration,
    next_read: Mutex<Option<Instant>>,
}

impl SilenceAudio {
    pub fn new() -> Self {
        Self {
            frame: Duration::from_millis(u64::from(FRAME_DURATION_MS)),
            next_read: Mutex::new(None),
        }
    }
}

impl Default for SilenceAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPath for SilenceAudio {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let wait = {
            let mut next = self.next_read.lock();
            let now = Instant::now();
            let due = next.map_or(now, |at| at.max(now));
            *next = Some(due + self.frame);
            due.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        buf.fill(0);
        Ok(buf.len())
    }

    fn write(&self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

impl AudioControl for SilenceAudio {
    fn enable(&self) -> io::Result<()> {
        info!("audio path enabled (silence)");
        Ok(())
    }

    fn disable(&self) -> io::Result<()> {
        info!("audio path disabled (silence)");
        *self.next_read.lock() = None;
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> io::Result<()> {
        info!("audio path muted: {}", muted);
        Ok(())
    }
}

/// Line adapter that accepts every action and logs it
#[derive(Debug, Default)]
pub struct LoggingLine;

impl CallControl for LoggingLine {
    fn answer(&self) -> io::Result<()> {
        info!("line: answer");
        Ok(())
    }

    fn dial(&self, number: &str) -> io::Result<()> {
        info!("line: dial {}", number);
        Ok(())
    }

    fn hangup(&self) -> io::Result<()> {
        info!("line: hangup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_paced() {
        let audio = SilenceAudio::new();
        let mut buf = [0xAAu8; 320];
        let start = Instant::now();
        for _ in 0..4 {
            assert_eq!(audio.read(&mut buf).unwrap(), 320);
        }
        // First frame is immediate, the next three wait one frame each
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(buf.iter().all(|b| *b == 0));
        audio.write(&buf).unwrap();
    }
}
