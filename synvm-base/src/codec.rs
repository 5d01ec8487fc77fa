//! Word codec: raw program bytes to machine words and back.
//!
//! A program image is a sequence of little-endian byte pairs. Each pair
//! `(low, high)` becomes the word `high * 256 + low`. A trailing unpaired byte
//! is dropped.
//!
//! # Examples
//!
//! ```
//! # use synvm_base::codec::{self, Decoder};
//! let image: &[u8] = &[
//!     0x09, 0x00, 0x00, 0x80, 0x01, 0x80, 0x04, 0x00, // add <0> <1> 4
//!     0x13, 0x00, 0x00, 0x80,                         // out <0>
//!     0x00,                                           // dangling byte
//! ];
//! let words: Vec<u16> = Decoder::new(image).into_iter().collect();
//!
//! assert_eq!(words, &[9, 32768, 32769, 4, 19, 32768]);
//! assert_eq!(codec::decode(image), words);
//! ```

use std::iter::FusedIterator;

/// Decodes a whole image at once. See module-level documentation.
pub fn decode(bytes: &[u8]) -> Vec<u16> {
    Decoder::new(bytes).into_iter().collect()
}

/// Encodes words back to little-endian byte pairs.
///
/// ```
/// # use synvm_base::codec;
/// assert_eq!(codec::encode(&[0x1234, 21]), &[0x34, 0x12, 0x15, 0x00]);
/// ```
pub fn encode(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Word decoder over a borrowed image. Can be turned into an iterator using
/// [`Decoder::into_iter`].
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Number of whole words in the image.
    pub fn word_count(&self) -> usize {
        self.buffer.len() / 2
    }

    /// `true` if the image has a trailing byte that will be dropped.
    pub fn has_trailing_byte(&self) -> bool {
        self.buffer.len() % 2 == 1
    }

    /// Decodes and returns the next word, or [`None`] once fewer than two
    /// bytes remain.
    pub fn next_word(&mut self) -> Option<u16> {
        let pair = self.buffer.get(self.offset..self.offset + 2)?;
        self.offset += 2;

        Some(u16::from_le_bytes([pair[0], pair[1]]))
    }
}

impl<'a> IntoIterator for Decoder<'a> {
    type IntoIter = Words<'a>;
    type Item = <Self::IntoIter as Iterator>::Item;

    fn into_iter(self) -> Self::IntoIter {
        Words(self)
    }
}

/// Iterator wrapper over [`Decoder`].
#[derive(Clone, Debug)]
pub struct Words<'a>(Decoder<'a>);

impl Iterator for Words<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_word()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.0.buffer.len() - self.0.offset.min(self.0.buffer.len())) / 2;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Words<'_> {}
impl FusedIterator for Words<'_> {}
