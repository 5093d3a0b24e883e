// SPDX-License-Identifier: Apache-2.0

//! Metric specification and registration for the fragmenter dataplane.
//!
//! Counters and gauges are declared as [`MetricSpec`]s and registered against the global
//! [`metrics`] recorder via the [`Register`] trait; [`rate`] provides the smoothing used to
//! turn monotonic counters into rates.

mod rate;
mod register;
mod spec;

pub use rate::*;
pub use register::*;
pub use spec::*;
