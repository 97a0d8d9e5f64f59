// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Careful resume lets a new connection start from the congestion window a previous connection
//! to the same peer validated, instead of the default initial window.
//!
//! A [`State`] is captured from a connection whose path was stable when it closed, and saved into
//! a [`Store`] shared by every connection of an endpoint. A later connection to the same remote
//! address looks the state up once it has an RTT sample. The saved window is only reused if the
//! new RTT suggests the same network path, and it is capped at a multiple of the initial window.
//!
//! ```
//! use s2n_quic_congestion::{
//!     recovery::{careful_resume::Store, Controller},
//!     settings::Settings,
//!     time::{Clock, Duration, NoopClock},
//!     CongestionController,
//! };
//!
//! let settings = Settings::builder().with_careful_resume(true).build()?;
//! let store = Store::with_capacity(1024);
//! let remote = "192.0.2.1:443".parse().unwrap();
//! let now = NoopClock.get_time();
//! let rtt = Duration::from_millis(50);
//!
//! // nothing has been saved for the peer yet
//! let mut controller = Controller::new(&settings);
//! assert!(!controller.try_careful_resume(&store, remote, rtt, rtt, now));
//! assert_eq!(controller.congestion_window(), settings.initial_window());
//! # Ok::<(), s2n_quic_congestion::settings::Error>(())
//! ```

use crate::{
    settings::{Algorithm, Settings},
    time::{Duration, Timestamp},
};
use core::net::SocketAddr;

mod store;

pub use store::Store;

/// The path state saved when a connection closes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State {
    pub remote_endpoint: SocketAddr,
    pub algorithm: Algorithm,
    pub congestion_window: u32,
    pub smoothed_rtt: Duration,
    pub min_rtt: Duration,
    /// The state may not be used at or after this time
    pub expiration: Timestamp,
}

impl State {
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.has_elapsed(self.expiration)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// How long a saved state remains usable
    pub validity: Duration,
    //= https://datatracker.ietf.org/doc/html/draft-ietf-tsvwg-careful-resume-05#section-4.2
    //# If the current RTT sample is less than half of the saved RTT
    //# [...] the path is likely to have changed
    /// A new RTT at or below the saved RTT divided by this value rejects the saved state
    pub rtt_lower_divisor: u32,
    //= https://datatracker.ietf.org/doc/html/draft-ietf-tsvwg-careful-resume-05#section-4.2
    //# or more than ten times the saved RTT
    /// A new RTT at or above the saved RTT multiplied by this value rejects the saved state
    pub rtt_upper_multiplier: u32,
    /// The resumed window is capped at this multiple of the initial window
    pub jump_multiplier: u32,
    /// A path is saved only if its smoothed RTT is within this multiple of its min RTT
    pub stability_ratio: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(24 * 60 * 60),
            rtt_lower_divisor: 2,
            rtt_upper_multiplier: 10,
            jump_multiplier: 64,
            stability_ratio: 2,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.validity.is_zero() {
            return Err("validity must be positive");
        }
        if self.rtt_lower_divisor < 2 || self.rtt_upper_multiplier < 2 {
            return Err("rtt bounds must be at least 2");
        }
        if self.jump_multiplier == 0 {
            return Err("jump multiplier must be positive");
        }
        if self.stability_ratio == 0 {
            return Err("stability ratio must be positive");
        }
        Ok(())
    }

    /// Returns true if the new RTT samples are close enough to the saved ones to suggest the
    /// same path
    pub fn rtt_matches(&self, state: &State, smoothed_rtt: Duration, min_rtt: Duration) -> bool {
        let matches = |saved: Duration, sample: Duration| {
            sample > saved / self.rtt_lower_divisor
                && sample < saved.saturating_mul(self.rtt_upper_multiplier)
        };

        matches(state.smoothed_rtt, smoothed_rtt) && matches(state.min_rtt, min_rtt)
    }

    /// Returns true if a path with these RTTs is stable enough to be saved
    #[inline]
    pub fn is_stable(&self, smoothed_rtt: Duration, min_rtt: Duration) -> bool {
        smoothed_rtt <= min_rtt.saturating_mul(self.stability_ratio)
    }

    /// The window a connection resumes with, given the saved window
    #[inline]
    pub fn resume_window(&self, settings: &Settings, saved_window: u32) -> u32 {
        let ceiling = settings
            .initial_window()
            .saturating_mul(self.jump_multiplier);
        saved_window.min(ceiling).min(settings.maximum_window())
    }
}
