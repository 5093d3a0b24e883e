// SPDX-License-Identifier: Apache-2.0

//! Packet parsing traits

use std::num::NonZero;

/// Map a `NonZero<u16>` length into the `NonZero<usize>` space.
pub trait IntoNonZeroUSize {
    /// Convert to a `NonZero<usize>`.
    fn into_non_zero_usize(self) -> NonZero<usize>;
}

impl IntoNonZeroUSize for NonZero<u16> {
    fn into_non_zero_usize(self) -> NonZero<usize> {
        NonZero::new(usize::from(self.get())).unwrap_or_else(|| unreachable!())
    }
}

/// Error for buffers whose length cannot be represented in a `u16`.
#[derive(Debug, thiserror::Error)]
#[error("illegal buffer length: {0}")]
pub struct IllegalBufferLength(pub usize);

pub trait Parse: Sized {
    type Error: core::error::Error;
    /// Parse from a buffer.
    ///
    /// # Errors
    ///
    /// Returns an error in the event that parsing fails.
    fn parse(buf: &[u8]) -> Result<(Self, NonZero<u16>), ParseError<Self::Error>>;
}

pub trait DeParse {
    type Error;

    fn size(&self) -> NonZero<u16>;
    /// Write a data structure (e.g., a packet header) to a buffer.
    ///
    /// Returns the number of bytes written in the event of success.
    ///
    /// # Errors
    ///
    /// Will return an error if there is not enough space in the buffer
    /// or if serialization fails from some other (implementation-dependent) reason.
    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<u16>, DeParseError<Self::Error>>;
}

pub(crate) trait ParsePayload {
    type Next;
    fn parse_payload(&self, cursor: &mut Reader) -> Option<Self::Next>;
}

#[derive(thiserror::Error, Debug)]
#[error("expected at least {expected} bytes, got {actual}")]
pub struct LengthError {
    pub(crate) expected: NonZero<usize>,
    pub(crate) actual: usize,
}

#[derive(Debug)]
pub(crate) struct Reader<'buf> {
    pub(crate) inner: &'buf [u8],
    pub(crate) remaining: u16,
}

#[derive(Debug)]
pub(crate) struct Writer<'buf> {
    pub(crate) inner: &'buf mut [u8],
    pub(crate) remaining: u16,
}

impl Reader<'_> {
    pub(crate) fn new(buf: &[u8]) -> Result<Reader, IllegalBufferLength> {
        if buf.len() > usize::from(u16::MAX) {
            return Err(IllegalBufferLength(buf.len()));
        }
        #[allow(clippy::cast_possible_truncation)] // bounded above
        Ok(Reader {
            inner: buf,
            remaining: buf.len() as u16,
        })
    }

    fn consume(&mut self, n: NonZero<u16>) -> Result<(), LengthError> {
        if n.get() > self.remaining {
            return Err(LengthError {
                expected: n.into_non_zero_usize(),
                actual: usize::from(self.remaining),
            });
        }
        self.remaining -= n.get();
        Ok(())
    }

    pub(crate) fn parse<T: Parse>(&mut self) -> Result<(T, NonZero<u16>), ParseError<T::Error>> {
        let current = self.inner.len() - usize::from(self.remaining);
        let (value, len_consumed) = T::parse(&self.inner[current..])?;
        match self.consume(len_consumed) {
            Ok(()) => Ok((value, len_consumed)),
            Err(e) => Err(ParseError::Length(e)),
        }
    }
}

impl Writer<'_> {
    pub(crate) fn new(buf: &mut [u8]) -> Result<Writer, IllegalBufferLength> {
        if buf.len() > usize::from(u16::MAX) {
            return Err(IllegalBufferLength(buf.len()));
        }
        let len = buf.len();
        #[allow(clippy::cast_possible_truncation)] // bounded above
        Ok(Writer {
            inner: buf,
            remaining: len as u16,
        })
    }

    fn consume(&mut self, n: NonZero<u16>) -> Result<(), LengthError> {
        if n.get() > self.remaining {
            return Err(LengthError {
                expected: n.into_non_zero_usize(),
                actual: usize::from(self.remaining),
            });
        }
        self.remaining -= n.get();
        Ok(())
    }

    pub(crate) fn write<T: DeParse>(
        &mut self,
        val: &T,
    ) -> Result<NonZero<u16>, DeParseError<T::Error>> {
        let current = self.inner.len() - usize::from(self.remaining);
        let consumed = val.deparse(&mut self.inner[current..])?;
        self.consume(consumed).map_err(DeParseError::Length)?;
        Ok(consumed)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError<E: core::error::Error> {
    #[error(transparent)]
    Length(LengthError),
    #[error(transparent)]
    Invalid(E),
    #[error("buffer too long: {0}")]
    BufferTooLong(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum DeParseError<E> {
    #[error(transparent)]
    Length(LengthError),
    #[error("invalid write operation")]
    Invalid(E),
    #[error("buffer too long: {0}")]
    BufferTooLong(usize),
}
