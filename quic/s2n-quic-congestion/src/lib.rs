// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Sender-side congestion control for a QUIC transport.
//!
//! A [`recovery::Controller`] is created from resolved [`settings::Settings`] and is driven by
//! the [`event`] records produced by loss detection. Two algorithms are provided, Cubic and BBR,
//! along with a shared [`recovery::careful_resume::Store`] that lets new connections reuse a
//! window validated by a previous connection to the same peer.

pub mod counter;
pub mod event;
pub mod recovery;
pub mod settings;
pub mod time;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use recovery::{CongestionController, Controller, NetworkStatistics};
pub use settings::{Algorithm, Settings};
