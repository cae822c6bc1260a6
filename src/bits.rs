//! Unchecked get/set of an unsigned integer of 1 to 64 bits at any bit offset.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte.
//! A field is always assembled in big-endian bit order first. Little-endian fields
//! wider than one byte are then byte-swapped as if they occupied the smallest
//! byte-multiple container, with the padding bits of a partial byte removed again
//! by [expand] and [contract].
//!
//! Nothing here checks the field against the length of `bytes` beyond the slice
//! indexing itself; callers validate bounds first.

use crate::{errors::CodecError, value::Endian};

const BYTE_BIT: usize = 8;
const U64_BIT: usize = 64;

/// Position of a field relative to the first byte it touches.
struct Span {
    /// Index of the first byte.
    pos: usize,
    /// Bits of the first byte before the field starts.
    msb_offset: usize,
    /// Bits of the first byte after the field ends (0 when the field continues).
    lsb_offset: usize,
    /// Bits of the field beyond the first byte.
    overflow: usize,
}

impl Span {
    fn new(offset: usize, width: usize) -> Self {
        let msb_offset = offset % BYTE_BIT;
        let lsb_offset = BYTE_BIT.saturating_sub(msb_offset + width);

        Span {
            pos: offset / BYTE_BIT,
            msb_offset,
            lsb_offset,
            overflow: width - (BYTE_BIT - msb_offset - lsb_offset),
        }
    }

    /// Bits of the first byte that belong to the field.
    fn mask(&self) -> u8 {
        u8::MAX >> (self.msb_offset + self.lsb_offset) << self.lsb_offset
    }
}

fn check_width(width: usize) -> Result<(), CodecError> {
    if width == 0 || width > U64_BIT {
        return Err(CodecError::InvalidWidth(width));
    }

    Ok(())
}

/// Low `width` bits set.
pub fn width_mask(width: usize) -> u64 {
    u64::MAX >> (U64_BIT - width)
}

fn need_swap(width: usize, endian: Endian) -> bool {
    width > BYTE_BIT && endian.resolve() == Endian::Little
}

/// Reads `width` bits starting at bit `offset` of `bytes`.
///
/// # Panics
///
/// Panics if the field extends past the end of `bytes`.
pub fn get_bits(
    bytes: &[u8],
    offset: usize,
    width: usize,
    endian: Endian,
) -> Result<u64, CodecError> {
    check_width(width)?;

    let span = Span::new(offset, width);
    let mut pos = span.pos;
    let mut overflow = span.overflow;

    let mut value = u64::from((bytes[pos] & span.mask()) >> span.lsb_offset);

    while overflow >= BYTE_BIT {
        pos += 1;
        value = (value << BYTE_BIT) | u64::from(bytes[pos]);
        overflow -= BYTE_BIT;
    }

    if overflow > 0 {
        pos += 1;
        value = (value << overflow) | u64::from(bytes[pos] >> (BYTE_BIT - overflow));
    }

    if need_swap(width, endian) {
        value = swap_bytes_in(value, width);
    }

    Ok(value)
}

/// Writes the low `width` bits of `value` at bit `offset` of `bytes`.
///
/// Bits of the touched bytes outside the field are preserved. Bits of `value`
/// above `width` are ignored.
///
/// # Panics
///
/// Panics if the field extends past the end of `bytes`.
pub fn set_bits(
    bytes: &mut [u8],
    offset: usize,
    width: usize,
    endian: Endian,
    value: u64,
) -> Result<(), CodecError> {
    check_width(width)?;

    let span = Span::new(offset, width);
    let mut pos = span.pos;
    let mut overflow = span.overflow;

    let mut value = value & width_mask(width);
    if need_swap(width, endian) {
        value = swap_bytes_out(value, width);
    }

    bytes[pos] = (bytes[pos] & !span.mask()) | ((value << span.lsb_offset) >> overflow) as u8;

    while overflow >= BYTE_BIT {
        pos += 1;
        overflow -= BYTE_BIT;
        bytes[pos] = (value >> overflow) as u8;
    }

    if overflow > 0 {
        pos += 1;
        let lsb_offset = BYTE_BIT - overflow;
        bytes[pos] = (bytes[pos] & !(u8::MAX << lsb_offset)) | (value << lsb_offset) as u8;
    }

    Ok(())
}

/// Converts a big-endian bit pattern of `width` bits into its little-endian value.
fn swap_bytes_in(value: u64, width: usize) -> u64 {
    let msb_offset = U64_BIT - width;
    let swapped = (value << msb_offset).swap_bytes();

    match width % BYTE_BIT {
        0 => swapped,
        truncated => expand(swapped, width, msb_offset, truncated),
    }
}

/// Converts a little-endian value of `width` bits into the big-endian bit pattern to store.
fn swap_bytes_out(value: u64, width: usize) -> u64 {
    let msb_offset = U64_BIT - width;
    let swapped = value.swap_bytes();

    let pattern = match width % BYTE_BIT {
        0 => swapped,
        truncated => contract(swapped, width, msb_offset, truncated),
    };

    pattern >> msb_offset
}

/// Moves the `truncated` bits of the partial byte, left in the high end of their
/// byte by the swap, down against the `width - truncated` contiguous bits.
fn expand(value: u64, width: usize, msb_offset: usize, truncated: usize) -> u64 {
    let contiguous = width - truncated;

    let trunc_msb_offset = BYTE_BIT - truncated;
    let trunc_lsb_offset = contiguous + trunc_msb_offset;

    let clear_mask = u64::MAX >> (msb_offset + truncated);
    let trunc_bits = value >> trunc_lsb_offset << contiguous;

    (value & clear_mask) | trunc_bits
}

/// Inverse of [expand]: lifts the partial byte's bits up against the contiguous
/// bytes at the top of the word, so the pattern can be shifted down by `msb_offset`.
fn contract(value: u64, width: usize, msb_offset: usize, truncated: usize) -> u64 {
    let contiguous = width - truncated;

    let trunc_lsb_offset = BYTE_BIT - truncated;
    let trunc_msb_offset = contiguous + trunc_lsb_offset;

    let clear_mask = u64::MAX << (msb_offset + truncated);
    let trunc_bits = value << trunc_msb_offset >> contiguous;

    (value & clear_mask) | trunc_bits
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const WIDTHS: [usize; 12] = [1, 7, 8, 9, 15, 16, 17, 31, 32, 33, 63, 64];
    const ENDIANS: [Endian; 3] = [Endian::Big, Endian::Little, Endian::Host];

    fn bit(bytes: &[u8], pos: usize) -> u8 {
        (bytes[pos / 8] >> (7 - pos % 8)) & 1
    }

    fn samples(width: usize) -> [u64; 4] {
        let mask = width_mask(width);
        [0, 1, mask, 0xAAAA_AAAA_AAAA_AAAA & mask]
    }

    #[test]
    fn test_get_bits_crossing_byte_boundary() {
        let data = [0xFF, 0x7F, 0x80];
        assert_eq!(get_bits(&data, 4, 12, Endian::Big).unwrap(), 0xF7F);
        assert_eq!(get_bits(&data, 4, 12, Endian::Little).unwrap(), 0xFF7);
    }

    #[test]
    fn test_get_bits_within_byte() {
        let data = [0b11_000001, 0b10000_101];
        assert_eq!(get_bits(&data, 0, 2, Endian::Big).unwrap(), 3);
        assert_eq!(get_bits(&data, 2, 11, Endian::Big).unwrap(), 48);
        assert_eq!(get_bits(&data, 13, 3, Endian::Big).unwrap(), 5);
        assert_eq!(get_bits(&data, 13, 3, Endian::Little).unwrap(), 5);
    }

    #[test]
    fn test_get_bits_aligned_matches_std() {
        let data = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

        assert_eq!(
            get_bits(&data, 0, 16, Endian::Big).unwrap(),
            u16::from_be_bytes([0x01, 0x23]) as u64
        );
        assert_eq!(
            get_bits(&data, 0, 16, Endian::Little).unwrap(),
            u16::from_le_bytes([0x01, 0x23]) as u64
        );
        assert_eq!(
            get_bits(&data, 8, 32, Endian::Little).unwrap(),
            u32::from_le_bytes([0x23, 0x45, 0x67, 0x89]) as u64
        );
        assert_eq!(
            get_bits(&data, 0, 64, Endian::Little).unwrap(),
            u64::from_le_bytes(data)
        );
        assert_eq!(
            get_bits(&data, 0, 64, Endian::Host).unwrap(),
            u64::from_ne_bytes(data)
        );
    }

    #[test]
    fn test_get_bits_unaligned_64() {
        let data = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE];
        assert_eq!(get_bits(&data, 7, 64, Endian::Big).unwrap(), u64::MAX);
        assert_eq!(get_bits(&data, 6, 64, Endian::Big).unwrap(), u64::MAX >> 1);
    }

    #[test]
    fn test_set_bits_aligned_matches_std() {
        let value = 0x0123_4567_89AB_CDEFu64;

        for bytes in [2usize, 3, 4, 5, 6, 7, 8] {
            let width = bytes * 8;
            let value = value & width_mask(width);

            let mut data = [0u8; 8];
            set_bits(&mut data, 0, width, Endian::Little, value).unwrap();
            assert_eq!(data[..bytes], value.to_le_bytes()[..bytes]);

            let mut data = [0u8; 8];
            set_bits(&mut data, 0, width, Endian::Big, value).unwrap();
            assert_eq!(data[..bytes], value.to_be_bytes()[8 - bytes..]);
        }
    }

    #[test]
    fn test_set_bits_preserves_neighbours() {
        let mut data = [0xFF, 0xFF];
        set_bits(&mut data, 4, 4, Endian::Big, 0).unwrap();
        assert_eq!(data, [0xF0, 0xFF]);

        let mut data = [0x00, 0x00, 0x00];
        set_bits(&mut data, 4, 12, Endian::Big, 0xFFF).unwrap();
        assert_eq!(data, [0x0F, 0xFF, 0x00]);
    }

    #[test]
    fn test_set_bits_ignores_excess_value_bits() {
        let mut data = [0x00, 0x00];
        set_bits(&mut data, 2, 4, Endian::Big, u64::MAX).unwrap();
        assert_eq!(data, [0b0011_1100, 0x00]);
    }

    #[test]
    fn test_invalid_width() {
        let mut data = [0u8; 16];
        assert_eq!(
            get_bits(&data, 0, 0, Endian::Big).unwrap_err(),
            CodecError::InvalidWidth(0)
        );
        assert_eq!(
            get_bits(&data, 0, 65, Endian::Big).unwrap_err(),
            CodecError::InvalidWidth(65)
        );
        assert_eq!(
            set_bits(&mut data, 0, 0, Endian::Little, 1).unwrap_err(),
            CodecError::InvalidWidth(0)
        );
    }

    #[test]
    fn test_round_trip_matrix() {
        for width in WIDTHS {
            for offset in 0..8 {
                for endian in ENDIANS {
                    for value in samples(width) {
                        let original = [0xA5u8; 10];
                        let mut data = original;

                        set_bits(&mut data, offset, width, endian, value).unwrap();
                        assert_eq!(
                            get_bits(&data, offset, width, endian).unwrap(),
                            value,
                            "width {width} offset {offset} {endian:?}"
                        );

                        for pos in (0..offset).chain(offset + width..80) {
                            assert_eq!(bit(&data, pos), bit(&original, pos));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_twelve_bit_little_endian_every_alignment() {
        for offset in 0..8 {
            let mut data = [0u8; 3];
            set_bits(&mut data, offset, 12, Endian::Little, 0xABC).unwrap();
            assert_eq!(get_bits(&data, offset, 12, Endian::Little).unwrap(), 0xABC);
            // stored pattern: low byte first, then the high nibble
            assert_eq!(get_bits(&data, offset, 12, Endian::Big).unwrap(), 0xBCA);
        }
    }

    #[test]
    fn test_expand_contract_inverse() {
        for width in (9..64).filter(|width| width % 8 != 0) {
            let value = 0x5A5A_5A5A_5A5A_5A5A & width_mask(width);

            assert!(swap_bytes_in(value, width) <= width_mask(width));
            assert_eq!(swap_bytes_out(swap_bytes_in(value, width), width), value);
            assert_eq!(swap_bytes_in(swap_bytes_out(value, width), width), value);
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            width in 1usize..=64,
            offset in 0usize..24,
            raw in any::<u64>(),
            endian in prop_oneof![Just(Endian::Big), Just(Endian::Little), Just(Endian::Host)],
        ) {
            let value = raw & width_mask(width);
            let mut data = [0x5Au8; 12];

            set_bits(&mut data, offset, width, endian, value).unwrap();
            prop_assert_eq!(get_bits(&data, offset, width, endian).unwrap(), value);
        }
    }
}
