// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Resolved congestion control configuration
//!
//! ```
//! use s2n_quic_congestion::settings::{Algorithm, Settings};
//!
//! let settings = Settings::builder()
//!     .with_algorithm(Algorithm::Bbr)
//!     .with_max_datagram_size(1350)?
//!     .with_initial_window_packets(16)
//!     .build()?;
//!
//! assert_eq!(settings.initial_window(), 16 * 1350);
//! # Ok::<(), s2n_quic_congestion::settings::Error>(())
//! ```

use crate::{
    recovery::{bbr, careful_resume, cubic},
    time::Duration,
};
use core::fmt;

/// The smallest datagram size a QUIC path is permitted to use
pub const MINIMUM_MAX_DATAGRAM_SIZE: u16 = 1200;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
//# The RECOMMENDED value is 2 * max_datagram_size.
pub const MINIMUM_WINDOW_PACKETS: u32 = 2;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
//# Endpoints SHOULD use an initial congestion
//# window of ten times the maximum datagram size (max_datagram_size)
const DEFAULT_INITIAL_WINDOW_PACKETS: u32 = 10;

const DEFAULT_MAXIMUM_WINDOW: u32 = 128 * 1024 * 1024;

const DEFAULT_SEND_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// The congestion control algorithm used by a [`Controller`](crate::recovery::Controller)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(bolero_generator::TypeGenerator))]
pub enum Algorithm {
    #[default]
    Cubic,
    Bbr,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Cubic => f.write_str("cubic"),
            Self::Bbr => f.write_str("bbr"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("max datagram size {0} is below the minimum of 1200")]
    MaxDatagramSizeTooSmall(u16),
    #[error("minimum window of {0} packets is below the floor of 2")]
    MinimumWindowTooSmall(u32),
    #[error("initial window of {initial} packets is below the minimum window of {minimum}")]
    InitialWindowBelowMinimum { initial: u32, minimum: u32 },
    #[error("window of {0} packets does not fit in the byte counter")]
    WindowOverflow(u32),
    #[error("maximum window of {maximum} bytes is below the initial window of {initial} bytes")]
    MaximumWindowBelowInitial { maximum: u32, initial: u32 },
    #[error("invalid cubic parameter: {0}")]
    InvalidCubicParameter(&'static str),
    #[error("invalid bbr parameter: {0}")]
    InvalidBbrParameter(&'static str),
    #[error("invalid careful resume parameter: {0}")]
    InvalidCarefulResumeParameter(&'static str),
}

/// Congestion control settings, resolved and validated
///
/// Consumed once when a [`Controller`](crate::recovery::Controller) is constructed. Changing
/// any value for a live connection requires constructing a new controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    algorithm: Algorithm,
    max_datagram_size: u16,
    initial_window_packets: u32,
    minimum_window_packets: u32,
    maximum_window: u32,
    send_idle_timeout: Duration,
    hystart_enabled: bool,
    pacing_enabled: bool,
    careful_resume_enabled: bool,
    careful_resume: careful_resume::Config,
    cubic: cubic::Parameters,
    bbr: bbr::Parameters,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            max_datagram_size: MINIMUM_MAX_DATAGRAM_SIZE,
            initial_window_packets: DEFAULT_INITIAL_WINDOW_PACKETS,
            minimum_window_packets: MINIMUM_WINDOW_PACKETS,
            maximum_window: DEFAULT_MAXIMUM_WINDOW,
            send_idle_timeout: DEFAULT_SEND_IDLE_TIMEOUT,
            hystart_enabled: true,
            pacing_enabled: true,
            careful_resume_enabled: false,
            careful_resume: careful_resume::Config::default(),
            cubic: cubic::Parameters::default(),
            bbr: bbr::Parameters::default(),
        }
    }
}

impl Settings {
    pub fn builder() -> Builder {
        Builder::default()
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    pub fn max_datagram_size(&self) -> u16 {
        self.max_datagram_size
    }

    /// The initial congestion window in bytes
    #[inline]
    pub fn initial_window(&self) -> u32 {
        self.initial_window_packets * self.max_datagram_size as u32
    }

    /// The smallest congestion window in bytes any algorithm may reduce to
    #[inline]
    pub fn minimum_window(&self) -> u32 {
        self.minimum_window_packets * self.max_datagram_size as u32
    }

    /// The largest congestion window in bytes any algorithm may grow to
    #[inline]
    pub fn maximum_window(&self) -> u32 {
        self.maximum_window
    }

    /// An ACK gap longer than this is treated as an idle period by Cubic
    #[inline]
    pub fn send_idle_timeout(&self) -> Duration {
        self.send_idle_timeout
    }

    #[inline]
    pub fn hystart_enabled(&self) -> bool {
        self.hystart_enabled
    }

    #[inline]
    pub fn pacing_enabled(&self) -> bool {
        self.pacing_enabled
    }

    #[inline]
    pub fn careful_resume_enabled(&self) -> bool {
        self.careful_resume_enabled
    }

    #[inline]
    pub fn careful_resume(&self) -> &careful_resume::Config {
        &self.careful_resume
    }

    #[inline]
    pub fn cubic(&self) -> &cubic::Parameters {
        &self.cubic
    }

    #[inline]
    pub fn bbr(&self) -> &bbr::Parameters {
        &self.bbr
    }

    /// Clamps `window` to the configured minimum and maximum windows
    #[inline]
    pub(crate) fn clamp_window(&self, window: u32) -> u32 {
        window.clamp(self.minimum_window(), self.maximum_window)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Builder {
    settings: Settings,
}

impl Builder {
    /// Sets the congestion control algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.settings.algorithm = algorithm;
        self
    }

    /// Sets the maximum datagram size used to convert packet counts to bytes
    pub fn with_max_datagram_size(mut self, max_datagram_size: u16) -> Result<Self, Error> {
        if max_datagram_size < MINIMUM_MAX_DATAGRAM_SIZE {
            return Err(Error::MaxDatagramSizeTooSmall(max_datagram_size));
        }
        self.settings.max_datagram_size = max_datagram_size;
        Ok(self)
    }

    /// Sets the initial congestion window, in packets
    pub fn with_initial_window_packets(mut self, packets: u32) -> Self {
        self.settings.initial_window_packets = packets;
        self
    }

    /// Sets the minimum congestion window, in packets
    pub fn with_minimum_window_packets(mut self, packets: u32) -> Result<Self, Error> {
        if packets < MINIMUM_WINDOW_PACKETS {
            return Err(Error::MinimumWindowTooSmall(packets));
        }
        self.settings.minimum_window_packets = packets;
        Ok(self)
    }

    /// Sets the maximum congestion window, in bytes
    pub fn with_maximum_window(mut self, bytes: u32) -> Self {
        self.settings.maximum_window = bytes;
        self
    }

    pub fn with_send_idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.send_idle_timeout = timeout;
        self
    }

    pub fn with_hystart(mut self, enabled: bool) -> Self {
        self.settings.hystart_enabled = enabled;
        self
    }

    pub fn with_pacing(mut self, enabled: bool) -> Self {
        self.settings.pacing_enabled = enabled;
        self
    }

    pub fn with_careful_resume(mut self, enabled: bool) -> Self {
        self.settings.careful_resume_enabled = enabled;
        self
    }

    pub fn with_careful_resume_config(
        mut self,
        config: careful_resume::Config,
    ) -> Result<Self, Error> {
        config
            .validate()
            .map_err(Error::InvalidCarefulResumeParameter)?;
        self.settings.careful_resume = config;
        Ok(self)
    }

    pub fn with_cubic(mut self, parameters: cubic::Parameters) -> Result<Self, Error> {
        parameters.validate().map_err(Error::InvalidCubicParameter)?;
        self.settings.cubic = parameters;
        Ok(self)
    }

    pub fn with_bbr(mut self, parameters: bbr::Parameters) -> Result<Self, Error> {
        parameters.validate().map_err(Error::InvalidBbrParameter)?;
        self.settings.bbr = parameters;
        Ok(self)
    }

    /// Validates the relationships between the configured windows and returns the `Settings`
    pub fn build(self) -> Result<Settings, Error> {
        let settings = self.settings;
        let mds = settings.max_datagram_size as u32;

        if settings.initial_window_packets < settings.minimum_window_packets {
            return Err(Error::InitialWindowBelowMinimum {
                initial: settings.initial_window_packets,
                minimum: settings.minimum_window_packets,
            });
        }

        let initial = settings
            .initial_window_packets
            .checked_mul(mds)
            .ok_or(Error::WindowOverflow(settings.initial_window_packets))?;

        if settings.maximum_window < initial {
            return Err(Error::MaximumWindowBelowInitial {
                maximum: settings.maximum_window,
                initial,
            });
        }

        Ok(settings)
    }
}
