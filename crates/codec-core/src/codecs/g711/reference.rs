//! G.711 companding, ITU-T reference algorithms
//!
//! Bit-exact ports of the STL G.711 module. The lookup tables in
//! [`super::tables`] are generated from these functions, so they are the
//! single source of truth for the conversion.
//!
//! - A-law keeps the 13 most significant bits of the input, folds negative
//!   values with a one's complement and toggles the even bits (`^ 0x55`).
//! - μ-law keeps 14 bits, adds a bias of 33 before segmenting and inverts
//!   the result.

/// Compress one linear sample to A-law.
pub fn alaw_compress(sample: i16) -> u8 {
    let mut ix = if sample < 0 {
        (((!sample) as u16) >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut iexp = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            iexp += 1;
        }
        ix -= 16;
        ix += iexp << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

/// Expand one A-law code to a linear sample.
///
/// Reconstructs at the midpoint of the quantization interval.
pub fn alaw_expand(compressed: u8) -> i16 {
    let ix = ((compressed ^ 0x0055) as i16) & 0x007F;
    let iexp = ix >> 4;
    let mut mant = ix & 0x000F;

    if iexp > 0 {
        mant += 16;
    }
    mant = (mant << 4) + 0x0008;
    if iexp > 1 {
        mant <<= iexp - 1;
    }

    if compressed > 127 { mant } else { -mant }
}

/// Compress one linear sample to μ-law.
pub fn ulaw_compress(sample: i16) -> u8 {
    let absno = if sample < 0 {
        (((!sample) as u16) >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let absno = absno.min(0x1FFF);

    let mut i = absno >> 6;
    let mut segno = 1;
    while i != 0 {
        segno += 1;
        i >>= 1;
    }

    let high_nibble = 0x0008 - segno;
    let low_nibble = 0x000F - ((absno >> segno) & 0x000F);
    let mut code = (high_nibble << 4) | low_nibble;
    if sample >= 0 {
        code |= 0x0080;
    }
    code as u8
}

/// Expand one μ-law code to a linear sample.
pub fn ulaw_expand(compressed: u8) -> i16 {
    let sign = if compressed < 0x0080 { -1 } else { 1 };
    let inverted = (!compressed) as i16;
    let exponent = (inverted >> 4) & 0x0007;
    let mantissa = inverted & 0x000F;
    let step = 4 << (exponent + 1);

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * 33)
}
