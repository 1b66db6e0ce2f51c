//! Transport selection policy
//!
//! Pure decisions only. The driver supplies what is available and acts on
//! the answer.

use crate::config::FeedConfig;

/// Which transport feeds the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Push,
    Pull,
    /// Nothing will ever deliver events
    Inert,
}

/// What the environment offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Availability {
    /// A push connector was supplied
    pub push: bool,
    /// A snapshot source was supplied and someone listens for stats
    pub pull: bool,
}

/// Transport to start with
pub fn select_initial(config: &FeedConfig, available: Availability) -> Transport {
    if config.use_push && available.push {
        Transport::Push
    } else {
        select_fallback(config, available)
    }
}

/// Transport to use once push is gone for good
pub fn select_fallback(config: &FeedConfig, available: Availability) -> Transport {
    if config.use_pull && available.pull {
        Transport::Pull
    } else {
        Transport::Inert
    }
}

/// A connect error before the first successful connect also starts the
/// poller, while push keeps retrying.
pub fn wants_safety_net(config: &FeedConfig, available: Availability, ever_connected: bool) -> bool {
    !ever_connected && select_fallback(config, available) == Transport::Pull
}

/// The stats refresh poller only runs next to push
pub fn wants_stats_refresh(config: &FeedConfig, available: Availability, initial: Transport) -> bool {
    initial == Transport::Push && available.pull && config.stats_refresh_interval_ms.is_some()
}
