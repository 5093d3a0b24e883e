// SPDX-License-Identifier: Apache-2.0

use crate::{DynNetworkFunction, NetworkFunction, nf_dyn};
use dyn_iter::{DynIter, IntoDynIterator};
use net::buffer::PacketBufferMut;
use net::packet::Packet;

/// A pipeline whose stages are assembled at runtime.
///
/// Stages run in the order they were added.
///
/// # See Also
///
/// [`DynNetworkFunction`]
#[derive(Default)]
pub struct DynPipeline<Buf: PacketBufferMut> {
    nfs: Vec<Box<dyn DynNetworkFunction<Buf>>>,
}

impl<Buf: PacketBufferMut> DynPipeline<Buf> {
    /// Create a [`DynPipeline`].
    #[must_use]
    pub fn new() -> Self {
        Self { nfs: Vec::new() }
    }

    /// Add a static network function to the pipeline.
    ///
    /// This method takes a [`NetworkFunction`] and adds it to the pipeline.
    #[must_use]
    pub fn add_stage<NF: NetworkFunction<Buf> + 'static>(self, nf: NF) -> Self {
        self.add_stage_dyn(nf_dyn(nf))
    }

    /// Add a dynamic network function to the pipeline.
    ///
    /// This method takes a [`DynNetworkFunction`] and adds it to the pipeline.
    ///
    /// # See Also
    ///
    /// [`DynNetworkFunction`]
    /// [`nf_dyn`]
    #[must_use]
    pub fn add_stage_dyn(mut self, nf: Box<dyn DynNetworkFunction<Buf>>) -> Self {
        self.nfs.push(nf);
        self
    }

    /// The number of stages currently in the pipeline.
    #[must_use]
    pub fn num_stages(&self) -> usize {
        self.nfs.len()
    }
}

impl<Buf: PacketBufferMut> DynNetworkFunction<Buf> for DynPipeline<Buf> {
    fn process_dyn<'a>(&'a mut self, input: DynIter<'a, Packet<Buf>>) -> DynIter<'a, Packet<Buf>> {
        self.nfs
            .iter_mut()
            .fold(input, move |input, nf| nf.process_dyn(input))
            .into_dyn_iter()
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for DynPipeline<Buf> {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> {
        self.process_dyn(input.into_dyn_iter())
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::sample_nfs::{InspectHeaders, Passthrough};
    use crate::{DynPipeline, NetworkFunction};
    use dyn_iter::IntoDynIterator;
    use net::packet::test_utils::{addr_v4, build_test_ipv4_packet};

    use crate::DynNetworkFunction;

    #[test]
    fn long_dyn_pipeline() {
        let mut pipeline = DynPipeline::new();
        let num_stages = 1000;

        for i in 0..num_stages {
            pipeline = if i % 2 == 0 {
                pipeline.add_stage(Passthrough)
            } else {
                pipeline.add_stage(InspectHeaders)
            };
        }
        assert_eq!(pipeline.num_stages(), num_stages);

        let packets = vec![build_test_ipv4_packet(addr_v4("198.51.100.1"), 64)].into_iter();
        let packets_out: Vec<_> = pipeline.process(packets).collect();

        assert_eq!(packets_out.len(), 1);
    }

    #[test]
    fn process_dyn_preserves_order() {
        let mut pipeline = DynPipeline::new().add_stage(Passthrough);

        let packet1 = build_test_ipv4_packet(addr_v4("198.51.100.1"), 100);
        let packet2 = build_test_ipv4_packet(addr_v4("198.51.100.2"), 200);
        let packets = vec![packet1, packet2].into_iter().into_dyn_iter();

        let packets_out: Vec<_> = pipeline.process_dyn(packets).collect();
        assert_eq!(packets_out.len(), 2);
        assert_eq!(packets_out[0].total_len(), 14 + 20 + 100);
        assert_eq!(packets_out[1].total_len(), 14 + 20 + 200);
    }
}
