// SPDX-License-Identifier: Apache-2.0

//! Traits for checksum calculation and manipulation

use std::fmt::Debug;

/// A trait for checksum calculation and manipulation.
///
/// This trait is used to calculate and manipulate checksums in various headers.
pub trait Checksum {
    /// The error type for the header.
    type Error: Debug;
    /// The payload type over which the checksum is computed.
    type Payload<'a>: ?Sized
    where
        Self: 'a;
    /// The checksum type.
    type Checksum: Eq + Copy + Sized + Debug + From<u16> + Into<u16>;

    /// Get the checksum value from the header
    ///
    /// # Returns
    ///
    /// Returns `None` if the checksum is not present.
    fn checksum(&self) -> Option<Self::Checksum>;

    /// Compute the checksum value from the header and payload
    ///
    /// # Errors
    ///
    /// Returns an error if checksum computation fails.
    fn compute_checksum(&self, payload: &Self::Payload<'_>) -> Result<Self::Checksum, Self::Error>;

    /// Set the checksum value in the header.
    ///
    /// The validity of the checksum is not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the checksum cannot be set.
    fn set_checksum(&mut self, checksum: Self::Checksum) -> Result<&mut Self, Self::Error>;

    /// Validate the checksum value in the header.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if checksum computation fails or if the checksum is invalid.
    fn validate_checksum(
        &self,
        payload: &Self::Payload<'_>,
    ) -> Result<Self::Checksum, ChecksumError<Self>> {
        let checksum_result = self.compute_checksum(payload);
        let expected = match checksum_result {
            Ok(checksum) => checksum,
            Err(error) => return Err(ChecksumError::Compute { error }),
        };
        let Some(actual) = self.checksum() else {
            return Err(ChecksumError::NotPresent);
        };
        if expected == actual {
            Ok(expected)
        } else {
            Err(ChecksumError::Mismatch { expected, actual })
        }
    }

    /// Update the checksum value in the header.
    ///
    /// The post-condition of this function is that the checksum is valid.
    /// I.e., the `validate_checksum` function will not return an `Err` variant when given the same
    /// value for `payload` as was passed into this function.
    ///
    /// # Errors
    ///
    /// Returns an error if checksum computation fails or if setting the checksum fails.
    fn update_checksum(&mut self, payload: &Self::Payload<'_>) -> Result<&mut Self, Self::Error> {
        let ret = self.set_checksum(self.compute_checksum(payload)?)?;
        #[cfg(debug_assertions)]
        #[allow(clippy::panic)] // this is basically a debug_assert
        match ret.validate_checksum(payload) {
            Ok(_) => {}
            Err(ChecksumError::Mismatch { expected, actual }) => {
                panic!(
                    "checksum implementation is faulty: expected: {expected:?}, actual: {actual:?}",
                );
            }
            Err(ChecksumError::Compute { error }) => {
                return Err(error);
            }
            Err(ChecksumError::NotPresent) => {
                unreachable!() // We managed to compute the checksum at the beginning of the function
            }
        }
        Ok(ret)
    }
}

/// An error resulting from a checksum mismatch.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError<T: Checksum + ?Sized> {
    /// The checksum in the header does not match the computed checksum.
    #[error("checksum mismatch: expected {expected:?}, actual {actual:?}")]
    Mismatch {
        /// The expected (computed) checksum.
        expected: T::Checksum,
        /// The actual checksum in the header.
        actual: T::Checksum,
    },
    /// The checksum computation failed.
    #[error("checksum computation failed: {error:?}")]
    Compute {
        /// The error that occurred during checksum computation.
        error: T::Error,
    },
    /// The checksum is not present in the header.
    #[error("checksum not present")]
    NotPresent,
}
