//! G.711 lookup tables
//!
//! Encode tables cover the full 16-bit input range (64 KiB each), decode
//! tables the 256 codes. All four are generated from the reference
//! algorithms on first use.

use super::reference::{alaw_compress, alaw_expand, ulaw_compress, ulaw_expand};
use std::sync::LazyLock;

static ULAW_ENCODE_TABLE: LazyLock<Box<[u8; 65536]>> =
    LazyLock::new(|| encode_table(ulaw_compress));

static ULAW_DECODE_TABLE: LazyLock<[i16; 256]> = LazyLock::new(|| decode_table(ulaw_expand));

static ALAW_ENCODE_TABLE: LazyLock<Box<[u8; 65536]>> =
    LazyLock::new(|| encode_table(alaw_compress));

static ALAW_DECODE_TABLE: LazyLock<[i16; 256]> = LazyLock::new(|| decode_table(alaw_expand));

fn encode_table(compress: fn(i16) -> u8) -> Box<[u8; 65536]> {
    let mut table = Box::new([0u8; 65536]);
    for (index, slot) in table.iter_mut().enumerate() {
        *slot = compress(index_to_sample(index));
    }
    table
}

fn decode_table(expand: fn(u8) -> i16) -> [i16; 256] {
    let mut table = [0i16; 256];
    for (code, slot) in table.iter_mut().enumerate() {
        *slot = expand(code as u8);
    }
    table
}

// Offset binary: index 0 is -32768, index 65535 is 32767
fn index_to_sample(index: usize) -> i16 {
    (index as u16).wrapping_sub(32768) as i16
}

fn sample_to_index(sample: i16) -> usize {
    (sample as u16).wrapping_add(32768) as usize
}

/// Build all tables now instead of on the first frame.
pub fn init_tables() {
    LazyLock::force(&ULAW_ENCODE_TABLE);
    LazyLock::force(&ULAW_DECODE_TABLE);
    LazyLock::force(&ALAW_ENCODE_TABLE);
    LazyLock::force(&ALAW_DECODE_TABLE);
}

/// μ-law compression by table lookup
#[inline]
pub fn ulaw_encode(sample: i16) -> u8 {
    ULAW_ENCODE_TABLE[sample_to_index(sample)]
}

/// μ-law expansion by table lookup
#[inline]
pub fn ulaw_decode(code: u8) -> i16 {
    ULAW_DECODE_TABLE[code as usize]
}

/// A-law compression by table lookup
#[inline]
pub fn alaw_encode(sample: i16) -> u8 {
    ALAW_ENCODE_TABLE[sample_to_index(sample)]
}

/// A-law expansion by table lookup
#[inline]
pub fn alaw_decode(code: u8) -> i16 {
    ALAW_DECODE_TABLE[code as usize]
}
