// SPDX-License-Identifier: Apache-2.0

use net::buffer::PacketBufferMut;
use net::packet::Packet;
use std::marker::PhantomData;

/// Trait for an object that processes a stream of packets.
///
/// Implementations transform the input iterator into the output iterator lazily: packets are
/// pulled through the whole chain one at a time, and a function may consume packets (emit
/// fewer than it received) or mint new ones (emit more).
pub trait NetworkFunction<Buf: PacketBufferMut> {
    /// Process a stream of packets, producing the (possibly shorter or longer) output stream.
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a;
}

/// A trait for statically chaining network functions together.
///
/// `StaticChain` is implemented for every [`NetworkFunction`]; calling
/// [`chain`][StaticChain::chain] produces a [`Chained`] which is itself a [`NetworkFunction`].
pub trait StaticChain<Buf: PacketBufferMut>: NetworkFunction<Buf> + Sized {
    /// Chain `next` after `self`, producing a composite [`NetworkFunction`].
    fn chain<Next: NetworkFunction<Buf>>(self, next: Next) -> Chained<Buf, Self, Next> {
        Chained {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

impl<Buf: PacketBufferMut, T: NetworkFunction<Buf>> StaticChain<Buf> for T {}

/// Composite of two [`NetworkFunction`]s; the output of the first feeds the second.
#[derive(Debug)]
pub struct Chained<Buf: PacketBufferMut, First, Second>
where
    First: NetworkFunction<Buf>,
    Second: NetworkFunction<Buf>,
{
    first: First,
    second: Second,
    _marker: PhantomData<Buf>,
}

impl<Buf: PacketBufferMut, First, Second> NetworkFunction<Buf> for Chained<Buf, First, Second>
where
    First: NetworkFunction<Buf>,
    Second: NetworkFunction<Buf>,
{
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        self.second.process(self.first.process(input))
    }
}
