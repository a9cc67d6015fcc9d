//! Business-logic hooks a session reports to.

use shared::Packet;

/// Callbacks fired by a session. Every method has a pass-through default so
/// implementations only override what they care about.
///
/// Hooks run inline on the session's tasks and must not block.
pub trait Processor: Send + Sync {
    /// Called before a transfer dials `addr`. Returning `false` vetoes it.
    fn pre_transfer(&self, _addr: &str) -> bool {
        true
    }

    /// Called once a transfer to `addr` has completed.
    fn post_transfer(&self, _addr: &str) {}

    /// Called once, when the session closes.
    fn on_disconnect(&self) {}

    /// Inspects a packet from the player. Returning `false` drops it.
    fn process_client(&self, _packet: &mut Packet) -> bool {
        true
    }

    /// Inspects a packet from the current server. Returning `false` drops it.
    fn process_server(&self, _packet: &mut Packet) -> bool {
        true
    }
}
