//! Packet counters and silence diagnostics for the media bridge
//!
//! Silence detection only feeds the logs; the bridge never acts on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Snapshot of a bridge's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    /// Datagrams dropped as too short, unparsable or of an unknown payload type
    pub packets_discarded: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub packets_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub packets_discarded: AtomicU64,
}

impl Counters {
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.packets_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_discarded: self.packets_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Amplitude tracker for one direction of one call.
///
/// A frame is silent when no sample exceeds `threshold` in magnitude.
/// Every `interval` the window is logged and reset; a window in which every
/// frame was silent is logged as a warning.
#[derive(Debug)]
pub struct SilenceMonitor {
    label: &'static str,
    call_id: String,
    threshold: u16,
    interval: Duration,
    window_start: Instant,
    frames: u64,
    silent_frames: u64,
    max_amplitude: u16,
}

impl SilenceMonitor {
    pub fn new(label: &'static str, call_id: impl Into<String>, threshold: u16, interval: Duration) -> Self {
        Self {
            label,
            call_id: call_id.into(),
            threshold,
            interval,
            window_start: Instant::now(),
            frames: 0,
            silent_frames: 0,
            max_amplitude: 0,
        }
    }

    /// Record one frame; returns true when the frame counts as silent
    pub fn observe(&mut self, samples: &[i16]) -> bool {
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        self.frames += 1;
        self.max_amplitude = self.max_amplitude.max(peak);
        let silent = peak <= self.threshold;
        if silent {
            self.silent_frames += 1;
        }
        silent
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn silent_frames(&self) -> u64 {
        self.silent_frames
    }

    pub fn max_amplitude(&self) -> u16 {
        self.max_amplitude
    }

    /// Percentage of silent frames in the current window
    pub fn silent_percent(&self) -> u64 {
        if self.frames == 0 {
            0
        } else {
            self.silent_frames * 100 / self.frames
        }
    }

    /// Log and reset the window if `interval` has elapsed
    pub fn maybe_report(&mut self, packets: u64) {
        if self.window_start.elapsed() >= self.interval {
            self.report(packets);
        }
    }

    pub fn report(&mut self, packets: u64) {
        info!(
            call_id = %self.call_id,
            direction = self.label,
            packets,
            frames = self.frames,
            silent_percent = self.silent_percent(),
            max_amplitude = self.max_amplitude,
            "media stats"
        );
        if self.frames > 0 && self.silent_frames == self.frames {
            warn!(
                call_id = %self.call_id,
                direction = self.label,
                "{} audio has been silent for {:?}",
                self.label,
                self.window_start.elapsed()
            );
        }
        self.window_start = Instant::now();
        self.frames = 0;
        self.silent_frames = 0;
        self.max_amplitude = 0;
    }
}
