//! The cellular line, as seen by the gateway
//!
//! The platform layer that intercepts GSM calls is outside this crate. It
//! reports what happens on the line as [`LineEvent`]s and carries out the
//! actions of [`CallControl`].

use std::io;

/// Something happened on the cellular line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Incoming cellular call; `caller` may be empty when withheld
    Ringing { caller: String },
    /// The far end answered a call we dialed
    Answered,
    /// The line call ended, from either side
    Disconnected,
}

/// Actions on the cellular line.
///
/// Implementations block until the modem accepted the command, not until
/// the network completed it; the outcome arrives later as a [`LineEvent`].
pub trait CallControl: Send + Sync {
    /// Pick up a ringing call
    fn answer(&self) -> io::Result<()>;

    /// Place a call to `number`
    fn dial(&self, number: &str) -> io::Result<()>;

    /// End whatever call is on the line
    fn hangup(&self) -> io::Result<()>;
}
