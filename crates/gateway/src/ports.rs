//! RTP port allocation
//!
//! Even ports only (RTP convention, the odd neighbour stays free for
//! RTCP). Allocation walks the range round-robin from the last port
//! handed out, so a just-released port is not immediately reused.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

#[derive(Debug)]
struct PortState {
    allocated: HashSet<u16>,
    next: u16,
}

/// Hands out even RTP ports from a configured range
#[derive(Debug)]
pub struct RtpPortAllocator {
    min: u16,
    max: u16,
    state: Mutex<PortState>,
}

impl RtpPortAllocator {
    pub fn new(min: u16, max: u16) -> Self {
        Self {
            min,
            max,
            state: Mutex::new(PortState {
                allocated: HashSet::new(),
                next: first_even(min).unwrap_or(min),
            }),
        }
    }

    /// Number of even ports in the range
    pub fn capacity(&self) -> usize {
        match first_even(self.min) {
            Some(first) if first <= self.max => usize::from((self.max - first) / 2) + 1,
            _ => 0,
        }
    }

    pub fn allocated_count(&self) -> usize {
        self.state.lock().allocated.len()
    }

    pub fn allocate(&self) -> Result<u16> {
        let capacity = self.capacity();
        let first = first_even(self.min).unwrap_or(self.min);
        let mut state = self.state.lock();
        let mut port = state.next;
        for _ in 0..capacity {
            if port > self.max || port < first {
                port = first;
            }
            let candidate = port;
            // Past 65534 the walk wraps instead of sticking on 65535
            port = port.checked_add(2).unwrap_or(first);
            if state.allocated.insert(candidate) {
                state.next = port;
                debug!("allocated RTP port {}", candidate);
                return Ok(candidate);
            }
        }
        warn!("RTP port range {}-{} exhausted", self.min, self.max);
        Err(Error::NoFreePort {
            min: self.min,
            max: self.max,
        })
    }

    /// Return a port; releasing a port that is not allocated is a no-op
    pub fn release(&self, port: u16) {
        if self.state.lock().allocated.remove(&port) {
            debug!("released RTP port {}", port);
        }
    }
}

fn first_even(min: u16) -> Option<u16> {
    min.checked_add(min % 2)
}
