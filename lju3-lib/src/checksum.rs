//! One's-complement style checksums used by every UD-family packet.

/// 8-bit checksum: byte-wise sum with end-around carry.
///
/// Each time adding a byte carries out of the low 8 bits, one extra is added
/// to the accumulator before truncation.
pub fn checksum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| {
        let sum = acc as u16 + b as u16;
        if sum > 0xFF {
            (sum + 1) as u8
        } else {
            sum as u8
        }
    })
}

/// 16-bit checksum: plain unsigned sum of all bytes, wrapping at 16 bits.
pub fn checksum16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(checksum8(&[]), 0);
        assert_eq!(checksum16(&[]), 0);
    }

    #[test]
    fn checksum8_without_carry_is_plain_sum() {
        assert_eq!(checksum8(&[0x01, 0x02, 0x03]), 0x06);
    }

    #[test]
    fn checksum8_adds_one_per_carry() {
        // 0xFF + 0x02 = 0x101 -> carry -> 0x01 + 1
        assert_eq!(checksum8(&[0xFF, 0x02]), 0x02);
        // crossing 256 twice adds two extra
        assert_eq!(checksum8(&[0xFF, 0xFF, 0xFF]), 0xFF);
    }

    #[test]
    fn crossing_256_increments_by_exactly_one() {
        let base = [0xF0, 0x0A];
        let before = checksum8(&base);
        assert_eq!(before, 0xFA);
        let after = checksum8(&[0xF0, 0x0A, 0x10]);
        // 0xFA + 0x10 = 0x10A -> 0x0A, plus one for the carry
        assert_eq!(after, 0x0B);
    }

    #[test]
    fn checksum16_sums_bytes() {
        assert_eq!(checksum16(&[0xFF; 255]), 0xFF * 255);
        assert_eq!(checksum16(&[0x01, 0x02, 0xFF]), 0x0102);
    }

    #[test]
    fn checksums_are_deterministic() {
        let data: Vec<u8> = (0..=200u8).map(|b| b.wrapping_mul(37)).collect();
        assert_eq!(checksum8(&data), checksum8(&data));
        assert_eq!(checksum16(&data), checksum16(&data));
    }
}
