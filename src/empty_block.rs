//! Empty-block detection.
//!
//! A block is "empty" when every byte equals the first byte. The scanner
//! advances to a machine-word boundary and compares word-sized windows
//! before falling back to byte-wise comparison, the same optimization shape
//! as `libewf_empty_block_test` in the reference implementation.

/// The largest word size we batch comparisons over.
type Word = usize;
const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// Returns `true` if every byte in `block` equals `block[0]`.
///
/// An empty slice is trivially "empty" (there is nothing to contradict a
/// repeated-byte claim); callers that need a byte to replicate should check
/// `block.is_empty()` first.
pub fn is_empty_block(block: &[u8]) -> bool {
    if block.len() <= 1 {
        return true;
    }

    let first = block[0];
    let mut rest = &block[1..];

    // Byte-wise until we reach a word boundary relative to the slice start
    // (the slice is not guaranteed to be aligned in memory, so we align by
    // position within the slice, which is enough to let the compiler emit
    // wide loads for the aligned middle section).
    let misalignment = rest.as_ptr() as usize % WORD_SIZE;
    let prefix_len = if misalignment == 0 {
        0
    } else {
        (WORD_SIZE - misalignment).min(rest.len())
    };
    for &b in &rest[..prefix_len] {
        if b != first {
            return false;
        }
    }
    rest = &rest[prefix_len..];

    let fill = Word::from_ne_bytes([first; WORD_SIZE]);
    let mut chunks = rest.chunks_exact(WORD_SIZE);
    for chunk in &mut chunks {
        let word = Word::from_ne_bytes(chunk.try_into().unwrap());
        if word != fill {
            return false;
        }
    }

    chunks.remainder().iter().all(|&b| b == first)
}
