// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Borrowed views on the values carried by a PDU.

use core::{ops::Range, slice::ChunksExact};

use super::*;
use crate::{
    error::Error,
    util::{pack_coils, packed_coils_len},
};

/// Coil states packed LSB first, eight per byte.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coils<'c> {
    bits: RawData<'c>,
    count: usize,
}

impl<'c> Coils<'c> {
    /// Pack `states` into `target`.
    pub fn from_bools(states: &[Coil], target: &'c mut [u8]) -> Result<Self, Error> {
        let packed_len = pack_coils(states, target)?;
        Ok(Self {
            bits: &target[..packed_len],
            count: states.len(),
        })
    }

    /// View on `count` coils that are already packed.
    pub(crate) const fn from_packed(bits: &'c [u8], count: usize) -> Self {
        Self { bits, count }
    }

    /// Apply the requested quantity to a response payload.
    ///
    /// The byte count of the payload must match the quantity exactly.
    pub(crate) fn limit(self, quantity: usize) -> Result<Self, Error> {
        if packed_coils_len(quantity) != self.bits.len() {
            return Err(Error::ByteCount(self.bits.len() as u8));
        }
        Ok(Self::from_packed(self.bits, quantity))
    }

    /// Number of coils.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of bytes the packed coils occupy on the wire.
    #[must_use]
    pub const fn packed_len(&self) -> usize {
        packed_coils_len(self.count)
    }

    /// The packed bytes, padding bits included.
    #[must_use]
    pub fn packed(&self) -> &'c [u8] {
        let bits = self.bits;
        bits.get(..self.packed_len()).unwrap_or(bits)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Coil> {
        if index >= self.count {
            return None;
        }
        bit(self.bits, index)
    }
}

fn bit(bits: &[u8], index: usize) -> Option<Coil> {
    bits.get(index / 8)
        .map(|byte| ((byte >> (index % 8)) & 1) != 0)
}

/// Iterates the coil states in ascending address order.
#[derive(Debug, Clone)]
pub struct CoilsIter<'c> {
    bits: &'c [u8],
    indices: Range<usize>,
}

impl Iterator for CoilsIter<'_> {
    type Item = Coil;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.indices.next()?;
        bit(self.bits, index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl<'c> IntoIterator for Coils<'c> {
    type Item = Coil;
    type IntoIter = CoilsIter<'c>;

    fn into_iter(self) -> Self::IntoIter {
        CoilsIter {
            bits: self.bits,
            indices: 0..self.count,
        }
    }
}

/// Register values in big-endian byte order.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data<'d> {
    bytes: RawData<'d>,
    count: usize,
}

impl<'d> Data<'d> {
    /// Serialize `words` into `target`.
    pub fn from_words(words: &[Word], target: &'d mut [u8]) -> Result<Self, Error> {
        let len = words.len() * 2;
        if words.is_empty() || target.len() < len {
            return Err(Error::BufferSize);
        }
        let bytes = &mut target[..len];
        BigEndian::write_u16_into(words, bytes);
        Ok(Self {
            bytes,
            count: words.len(),
        })
    }

    /// View on the first `count` words of `bytes`.
    pub(crate) const fn from_raw(bytes: &'d [u8], count: usize) -> Self {
        Self { bytes, count }
    }

    /// Apply the requested quantity to a response payload.
    pub(crate) fn limit(self, quantity: usize) -> Result<Self, Error> {
        if self.bytes.len() != quantity * 2 {
            return Err(Error::ByteCount(self.bytes.len() as u8));
        }
        Ok(Self::from_raw(self.bytes, quantity))
    }

    /// Number of words.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The words as transmitted.
    #[must_use]
    pub fn payload(&self) -> &'d [u8] {
        let bytes = self.bytes;
        bytes.get(..self.count * 2).unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Word> {
        if index >= self.count {
            return None;
        }
        self.bytes
            .get(index * 2..index * 2 + 2)
            .map(BigEndian::read_u16)
    }
}

/// Iterates the register values in ascending address order.
#[derive(Debug, Clone)]
pub struct DataIter<'d>(ChunksExact<'d, u8>);

impl Iterator for DataIter<'_> {
    type Item = Word;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(BigEndian::read_u16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'d> IntoIterator for Data<'d> {
    type Item = Word;
    type IntoIter = DataIter<'d>;

    fn into_iter(self) -> Self::IntoIter {
        DataIter(self.payload().chunks_exact(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn pack_bools() {
        let buff = &mut [0x00, 0xFF];
        let coils = Coils::from_bools(&[true, false, true, true], buff).unwrap();
        assert_eq!(coils.len(), 4);
        assert_eq!(coils.packed(), &[0b1101]);
        assert_eq!(
            coils.into_iter().collect::<Vec<_>>(),
            [true, false, true, true]
        );
    }

    #[test]
    fn coil_bits_are_lsb_first() {
        // 0xCD 0x01 from a read coils response of 10 coils
        let coils = Coils::from_packed(&[0xCD, 0x01], 10);
        let states: Vec<_> = coils.into_iter().collect();
        assert_eq!(
            states,
            [true, false, true, true, false, false, true, true, true, false]
        );
        assert_eq!(coils.get(8), Some(true));
        assert_eq!(coils.get(10), None);
        assert!(Coils::from_packed(&[0xFF], 0).is_empty());
    }

    #[test]
    fn limit_coils_to_requested_quantity() {
        let coils = Coils::from_packed(&[0b0101_0011, 0b1], 16);
        let limited = coils.limit(9).unwrap();
        assert_eq!(limited.len(), 9);
        assert_eq!(limited.into_iter().count(), 9);
        assert_eq!(limited.get(9), None);

        assert_eq!(coils.limit(17), Err(Error::ByteCount(2)));
        assert_eq!(coils.limit(8), Err(Error::ByteCount(2)));
    }

    #[test]
    fn serialize_words() {
        let words = [0xABCD, 0xEF00, 0x1234];
        assert_eq!(
            Data::from_words(&words, &mut [0; 5]),
            Err(Error::BufferSize)
        );
        assert_eq!(Data::from_words(&[], &mut [0; 2]), Err(Error::BufferSize));

        let buff = &mut [0; 8];
        let data = Data::from_words(&words, buff).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.payload(), &[0xAB, 0xCD, 0xEF, 0x00, 0x12, 0x34]);
        assert_eq!(data.into_iter().collect::<Vec<_>>(), words);
    }

    #[test]
    fn read_words() {
        let data = Data::from_raw(&[0xFF, 0xAB, 0xCD, 0xEF, 0x33], 2);
        assert_eq!(data.get(0), Some(0xFFAB));
        assert_eq!(data.get(1), Some(0xCDEF));
        assert_eq!(data.get(2), None);
        assert_eq!(data.into_iter().size_hint(), (2, Some(2)));
    }

    #[test]
    fn limit_data_to_requested_quantity() {
        let data = Data::from_raw(&[0x00, 0x01, 0x00, 0x02], 2);
        assert_eq!(data.limit(2), Ok(data));
        assert_eq!(data.limit(3), Err(Error::ByteCount(4)));

        let odd = Data::from_raw(&[0x00, 0x01, 0x00], 1);
        assert_eq!(odd.limit(1), Err(Error::ByteCount(3)));
    }
}
