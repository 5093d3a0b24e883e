// SPDX-License-Identifier: Apache-2.0

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

//! # Pipeline Building Blocks
//!
//! This crate provides the building blocks for constructing pipelines of network functions.
//! There are two main methods provided for linking network functions together in sequence:
//!
//! - `StaticChain`: A trait for statically chaining network functions together.
//! - `DynPipeline`: A pipeline that can be dynamically constructed at runtime.
//!
//! ## Network Functions
//!
//! A network function is anything that implements the [`NetworkFunction`] trait.
//! You can look at the [`sample_nfs`] module for some examples of simple network functions.
//!
//! ## Static Chaining
//!
//! You can statically chain together a series of network functions using the
//! [`StaticChain::chain`] method. [`StaticChain`] is implemented for all types that implement
//! [`NetworkFunction`].
//!
//! ```rust
//! use fragplane_pipeline::{NetworkFunction, StaticChain};
//! use fragplane_pipeline::sample_nfs::{InspectHeaders, Passthrough};
//! use net::buffer::TestBuffer;
//! use net::packet::Packet;
//!
//! let mut pipeline = InspectHeaders.chain(Passthrough);
//! let pkts: Vec<Packet<TestBuffer>> = vec![];
//! pipeline.process(pkts.into_iter());
//! ```
//!
//! Note that `pipeline` implements the [`NetworkFunction`] trait and can be used anywhere a
//! network function is expected.
//!
//! <div class="warning">
//!
//! Keep statically linked chains short.
//!
//! The [`StaticChain::chain`] method triggers compiler/linker limitations; long chains cause
//! long compile times.
//!
//! </div>
//!
//! ## Dynamic Pipeline
//!
//! You can also use [`DynPipeline`] to construct a pipeline at runtime or to dynamically chain
//! together a series of network functions.
//!
//! ```rust
//! use fragplane_pipeline::DynPipeline;
//! use fragplane_pipeline::sample_nfs::{InspectHeaders, Passthrough};
//! use net::buffer::TestBuffer;
//!
//! let mut pipeline = DynPipeline::<TestBuffer>::new();
//! pipeline = pipeline.add_stage(InspectHeaders);
//! pipeline = pipeline.add_stage(Passthrough);
//! ```
//!
//! Here again `pipeline` implements [`NetworkFunction`] and can be used anywhere a network
//! function is expected.

mod dyn_nf;
mod pipeline;
/// Sample network functions
pub mod sample_nfs;
mod static_nf;

#[allow(unused)]
pub use dyn_nf::{DynNetworkFunction, nf_dyn};
#[allow(unused)]
pub use pipeline::DynPipeline;
#[allow(unused)]
pub use static_nf::{Chained, NetworkFunction, StaticChain};

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::sample_nfs::{InspectHeaders, Passthrough};
    use crate::{DynPipeline, NetworkFunction, StaticChain};
    use net::packet::test_utils::{addr_v4, build_test_ipv4_packet};

    #[test]
    fn mixed_dyn_static_pipeline() {
        let mut pipeline = DynPipeline::new();
        let num_stages = 50;

        for _ in 0..num_stages {
            pipeline = pipeline.add_stage(
                Passthrough
                    .chain(InspectHeaders)
                    .chain(Passthrough)
                    .chain(Passthrough),
            );
        }

        let packets = vec![build_test_ipv4_packet(addr_v4("198.51.100.1"), 128)].into_iter();
        let packets_out: Vec<_> = pipeline.process(packets).collect();

        assert_eq!(packets_out.len(), 1);
        assert_eq!(packets_out[0].total_len(), 14 + 20 + 128);
    }
}
