/// Size of the sliding-window dictionary in bytes.
pub const DICTIONARY_SIZE: usize = 4096;

const WINDOW_MASK: usize = DICTIONARY_SIZE - 1;

/// Copy instructions encode `length - 3` in a nibble; this value escapes into
/// an extra length byte.
const EXTENDED_LENGTH: usize = 18;

/// Longest run a single copy instruction can produce.
const MAX_RUN: usize = EXTENDED_LENGTH + 0xff;

/// Stateful LZSS decompressor over a 4096-byte circular dictionary.
///
/// One instance belongs to one decode session. Its dictionary and write
/// cursor carry over from one [`decompress`](Self::decompress) call to the
/// next, so later blocks can reference bytes produced by earlier ones.
///
/// # Stream layout
/// A flag byte announces the next eight instructions, least significant bit
/// first:
/// - `0`: literal, one byte copied to the output.
/// - `1`: copy, two bytes `x0 x1` giving a 12-bit dictionary position
///   (`x0 | (x1 & 0x0f) << 8`) and a run length `3 + (x1 >> 4)`. A run length
///   of 18 is followed by one byte that is added to it.
pub struct LzssDecompressor {
    dictionary: Box<[u8; DICTIONARY_SIZE]>,
    cursor: usize,
}

impl Default for LzssDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl LzssDecompressor {
    /// Fresh decompressor: zeroed dictionary, cursor at 0.
    pub fn new() -> Self {
        Self {
            dictionary: Box::new([0u8; DICTIONARY_SIZE]),
            cursor: 0,
        }
    }

    /// Decompressor seeded with `contents`, cursor at 0.
    pub fn with_dictionary(contents: &[u8; DICTIONARY_SIZE]) -> Self {
        let mut lzss = Self::new();
        lzss.reset_dictionary(contents);
        lzss
    }

    /// Overwrite the dictionary. The write cursor is left where it is.
    pub fn reset_dictionary(&mut self, contents: &[u8; DICTIONARY_SIZE]) {
        self.dictionary.copy_from_slice(contents);
    }

    /// Position of the next dictionary byte to be overwritten.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the write cursor; `pos` wraps modulo the dictionary size.
    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos & WINDOW_MASK;
    }

    /// Read-only view of the current dictionary contents.
    pub fn dictionary(&self) -> &[u8; DICTIONARY_SIZE] {
        &self.dictionary
    }

    #[inline]
    fn push(&mut self, output: &mut Vec<u8>, byte: u8) {
        output.push(byte);
        self.dictionary[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & WINDOW_MASK;
    }

    /// Decompress one block, producing at most `output_size` bytes.
    ///
    /// Running out of input in the middle of an instruction, or filling the
    /// output, stops decoding and returns what has been produced so far.
    /// Neither case is an error.
    pub fn decompress(&mut self, input: &[u8], output_size: usize) -> Vec<u8> {
        // `output_size` comes from the header; reserve only what `input` can yield.
        let mut output = Vec::with_capacity(output_size.min(input.len().saturating_mul(MAX_RUN)));
        let mut src = 0usize;
        let mut flags = 0u32;

        while src < input.len() {
            flags >>= 1;
            if flags & 0x100 == 0 {
                flags = input[src] as u32 | 0xff00;
                src += 1;
            }

            if flags & 1 == 1 {
                if src + 1 >= input.len() {
                    return output;
                }
                let x0 = input[src] as usize;
                let x1 = input[src + 1] as usize;
                src += 2;

                let mut position = x0 | ((x1 & 0x0f) << 8);
                let mut length = 3 + (x1 >> 4);
                if length == EXTENDED_LENGTH {
                    let Some(&extra) = input.get(src) else {
                        return output;
                    };
                    length += extra as usize;
                    src += 1;
                }

                // The source may overlap the bytes this run is writing.
                for _ in 0..length {
                    if output.len() >= output_size {
                        return output;
                    }
                    let byte = self.dictionary[position];
                    self.push(&mut output, byte);
                    position = (position + 1) & WINDOW_MASK;
                }
            } else {
                let Some(&byte) = input.get(src) else {
                    return output;
                };
                src += 1;
                if output.len() >= output_size {
                    return output;
                }
                self.push(&mut output, byte);
            }
        }

        output
    }
}
