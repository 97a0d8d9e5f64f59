// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod bandwidth;
pub mod bbr;
pub mod careful_resume;
pub mod congestion_controller;
mod controller;
pub mod cubic;
mod hybrid_slow_start;
mod inflight;
mod pacing;

pub use bandwidth::Bandwidth;
pub use bbr::BbrCongestionController;
pub use congestion_controller::{CongestionController, NetworkStatistics};
pub use controller::Controller;
pub use cubic::CubicCongestionController;
pub use crate::settings::Algorithm;
