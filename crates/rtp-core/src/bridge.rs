//! Per-call media bridge
//!
//! Two named threads share one UDP socket bound to the call's local RTP
//! port:
//!
//! - capture: audio path read, G.711 encode, RTP header, `send_to`
//! - playback: `recv_from` with a short timeout, header strip, decode by
//!   payload type, audio path write
//!
//! Both loops poll a shared running flag. A run of consecutive failures in
//! either loop is reported once as [`BridgeEvent::Failed`] and ends that
//! loop; tearing down the call is the owner's job.

use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use codec_core::{
    CodecType, FRAME_BYTES, FRAME_DURATION_MS, FRAME_SAMPLES, G711Codec, pcm_from_le_bytes,
    pcm_to_le_bytes,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::audio::AudioPath;
use crate::packet::{RTP_MIN_HEADER_SIZE, RtpPacket};
use crate::session::RtpSession;
use crate::stats::{BridgeStats, Counters, SilenceMonitor};
use crate::{DEFAULT_MAX_PACKET_SIZE, Result};

/// Which loop of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDirection {
    Capture,
    Playback,
}

impl MediaDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaDirection::Capture => "capture",
            MediaDirection::Playback => "playback",
        }
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals from a bridge to the call owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// `consecutive_failures` reads, writes or sends failed in a row
    Failed {
        call_id: String,
        direction: MediaDirection,
        consecutive_failures: u32,
    },
}

/// Media parameters resolved by SDP negotiation
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind_ip: IpAddr,
    /// 0 lets the OS pick
    pub local_port: u16,
    pub remote: SocketAddr,
    pub codec: CodecType,
    pub failure_threshold: u32,
    /// Peak magnitude at or below which a frame counts as silent
    pub silence_threshold: u16,
    pub stats_interval: Duration,
    pub receive_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(local_port: u16, remote: SocketAddr, codec: CodecType) -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_port,
            remote,
            codec,
            failure_threshold: 5,
            silence_threshold: 100,
            stats_interval: Duration::from_secs(5),
            receive_timeout: Duration::from_millis(100),
        }
    }
}

/// A running bridge for one call
pub struct MediaBridge {
    call_id: String,
    local_addr: SocketAddr,
    remote: SocketAddr,
    codec: CodecType,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    threads: Vec<JoinHandle<()>>,
}

impl MediaBridge {
    /// Bind the RTP socket and spawn the capture and playback threads
    pub fn start(
        call_id: impl Into<String>,
        config: BridgeConfig,
        audio: Arc<dyn AudioPath>,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Result<Self> {
        let call_id = call_id.into();
        let socket = UdpSocket::bind(SocketAddr::new(config.bind_ip, config.local_port))?;
        socket.set_read_timeout(Some(config.receive_timeout))?;
        let local_addr = socket.local_addr()?;
        let recv_socket = socket.try_clone()?;

        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());

        info!(
            call_id = %call_id,
            local = %local_addr,
            remote = %config.remote,
            codec = %config.codec,
            "starting media bridge"
        );

        let capture = CaptureLoop {
            call_id: call_id.clone(),
            socket,
            session: RtpSession::new(config.codec.payload_type(), FRAME_SAMPLES as u32, config.remote),
            codec: G711Codec::new(config.codec),
            audio: audio.clone(),
            running: running.clone(),
            counters: counters.clone(),
            events: events.clone(),
            failure_threshold: config.failure_threshold,
            monitor: SilenceMonitor::new("capture", call_id.clone(), config.silence_threshold, config.stats_interval),
        };
        let playback = PlaybackLoop {
            call_id: call_id.clone(),
            socket: recv_socket,
            audio,
            running: running.clone(),
            counters: counters.clone(),
            events,
            failure_threshold: config.failure_threshold,
            monitor: SilenceMonitor::new("playback", call_id.clone(), config.silence_threshold, config.stats_interval),
        };

        let mut threads = Vec::with_capacity(2);
        threads.push(
            thread::Builder::new()
                .name(format!("rtp-capture-{}", local_addr.port()))
                .spawn(move || capture.run())?,
        );
        let spawned = thread::Builder::new()
            .name(format!("rtp-playback-{}", local_addr.port()))
            .spawn(move || playback.run());
        match spawned {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                for handle in threads {
                    let _ = handle.join();
                }
                return Err(e.into());
            }
        }

        Ok(Self {
            call_id,
            local_addr,
            remote: config.remote,
            codec: config.codec,
            running,
            counters,
            threads,
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn codec(&self) -> CodecType {
        self.codec
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }

    /// Stop both loops and wait for them; idempotent
    pub fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!(call_id = %self.call_id, "media thread panicked");
            }
        }
        let stats = self.counters.snapshot();
        info!(
            call_id = %self.call_id,
            sent = stats.packets_sent,
            received = stats.packets_received,
            discarded = stats.packets_discarded,
            "media bridge stopped"
        );
    }
}

impl Drop for MediaBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for MediaBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBridge")
            .field("call_id", &self.call_id)
            .field("local_addr", &self.local_addr)
            .field("remote", &self.remote)
            .field("codec", &self.codec)
            .field("running", &self.is_running())
            .finish()
    }
}

// Counts consecutive failures and reports the threshold crossing once
struct FailureTracker<'a> {
    call_id: &'a str,
    direction: MediaDirection,
    threshold: u32,
    consecutive: u32,
    events: &'a mpsc::UnboundedSender<BridgeEvent>,
}

impl FailureTracker<'_> {
    fn success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns true once the loop should give up
    fn failure(&mut self, err: &dyn fmt::Display) -> bool {
        self.consecutive += 1;
        warn!(
            call_id = %self.call_id,
            direction = %self.direction,
            consecutive = self.consecutive,
            "media {} error: {}",
            self.direction,
            err
        );
        if self.consecutive < self.threshold {
            return false;
        }
        error!(call_id = %self.call_id, direction = %self.direction, "media bridge failed");
        let _ = self.events.send(BridgeEvent::Failed {
            call_id: self.call_id.to_string(),
            direction: self.direction,
            consecutive_failures: self.consecutive,
        });
        true
    }
}

struct CaptureLoop {
    call_id: String,
    socket: UdpSocket,
    session: RtpSession,
    codec: G711Codec,
    audio: Arc<dyn AudioPath>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    failure_threshold: u32,
    monitor: SilenceMonitor,
}

impl CaptureLoop {
    fn run(mut self) {
        let mut pcm_bytes = [0u8; FRAME_BYTES];
        let mut samples = Vec::with_capacity(FRAME_SAMPLES);
        let mut encoded = [0u8; FRAME_SAMPLES];
        let mut datagram = BytesMut::with_capacity(RTP_MIN_HEADER_SIZE + FRAME_SAMPLES);
        let mut failures = FailureTracker {
            call_id: &self.call_id,
            direction: MediaDirection::Capture,
            threshold: self.failure_threshold,
            consecutive: 0,
            events: &self.events,
        };
        let idle = Duration::from_millis(FRAME_DURATION_MS as u64);

        while self.running.load(Ordering::SeqCst) {
            let read = match self.audio.read(&mut pcm_bytes) {
                Ok(0) => {
                    thread::sleep(idle);
                    continue;
                }
                Ok(n) => n.min(FRAME_BYTES),
                Err(e) => {
                    if failures.failure(&e) {
                        break;
                    }
                    continue;
                }
            };
            // Short reads are padded with silence to a whole frame
            pcm_bytes[read..].fill(0);

            if let Err(e) = pcm_from_le_bytes(&pcm_bytes, &mut samples)
                .and_then(|_| self.codec.encode_to_buffer(&samples, &mut encoded))
            {
                if failures.failure(&e) {
                    break;
                }
                continue;
            }
            self.monitor.observe(&samples);

            let header = self.session.next_header();
            let sent = RtpPacket::serialize_into(&header, &encoded, &mut datagram)
                .and_then(|len| {
                    self.socket
                        .send_to(&datagram[..len], self.session.remote())
                        .map_err(Into::into)
                });
            match sent {
                Ok(len) => {
                    failures.success();
                    self.counters.record_sent(len);
                    trace!(call_id = %self.call_id, seq = header.sequence_number, "rtp sent");
                }
                Err(e) => {
                    if failures.failure(&e) {
                        break;
                    }
                }
            }
            self.monitor
                .maybe_report(self.counters.packets_sent.load(Ordering::Relaxed));
        }
        debug!(call_id = %self.call_id, "capture loop exited");
    }
}

struct PlaybackLoop {
    call_id: String,
    socket: UdpSocket,
    audio: Arc<dyn AudioPath>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    failure_threshold: u32,
    monitor: SilenceMonitor,
}

impl PlaybackLoop {
    fn run(mut self) {
        let mut buf = vec![0u8; DEFAULT_MAX_PACKET_SIZE];
        let mut samples: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES);
        let mut pcm_bytes: Vec<u8> = Vec::with_capacity(FRAME_BYTES);
        let pcmu = G711Codec::new(CodecType::Pcmu);
        let pcma = G711Codec::new(CodecType::Pcma);
        let mut failures = FailureTracker {
            call_id: &self.call_id,
            direction: MediaDirection::Playback,
            threshold: self.failure_threshold,
            consecutive: 0,
            events: &self.events,
        };

        while self.running.load(Ordering::SeqCst) {
            let len = match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => len,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
                Err(e) => {
                    if failures.failure(&e) {
                        break;
                    }
                    continue;
                }
            };
            self.counters.record_received(len);

            if len < RTP_MIN_HEADER_SIZE {
                self.counters.record_discarded();
                continue;
            }
            let packet = match RtpPacket::parse(&buf[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    debug!(call_id = %self.call_id, "dropping rtp datagram: {}", e);
                    self.counters.record_discarded();
                    continue;
                }
            };
            let codec = match CodecType::from_payload_type(packet.header.payload_type) {
                Some(CodecType::Pcmu) => &pcmu,
                Some(CodecType::Pcma) => &pcma,
                None => {
                    trace!(call_id = %self.call_id, pt = packet.header.payload_type, "skipping payload type");
                    self.counters.record_discarded();
                    continue;
                }
            };

            samples.resize(packet.payload.len(), 0);
            pcm_bytes.resize(packet.payload.len() * 2, 0);
            let decoded = codec
                .decode_to_buffer(&packet.payload, &mut samples)
                .and_then(|n| pcm_to_le_bytes(&samples[..n], &mut pcm_bytes));
            let n = match decoded {
                Ok(n) => n,
                Err(e) => {
                    if failures.failure(&e) {
                        break;
                    }
                    continue;
                }
            };
            self.monitor.observe(&samples);

            match self.audio.write(&pcm_bytes[..n]) {
                Ok(()) => failures.success(),
                Err(e) => {
                    if failures.failure(&e) {
                        break;
                    }
                }
            }
            self.monitor
                .maybe_report(self.counters.packets_received.load(Ordering::Relaxed));
        }
        debug!(call_id = %self.call_id, "playback loop exited");
    }
}
