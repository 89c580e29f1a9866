//! Fixed-width bit vectors shifted through the IR and DR.
//!
//! Bit `i` of a payload is stored in byte `i / 8` at position `i % 8`, and bit 0 is the first bit
//! shifted into the TAP.  For the GPIO chains this means bit `i` belongs to pin `i`.
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct ScanPayload {
    width: usize,
    bytes: Vec<u8>,
}

impl ScanPayload {
    /// An all-zero payload of `width` bits
    pub fn zeros(width: usize) -> Self {
        Self {
            width,
            bytes: vec![0; width.div_ceil(8)],
        }
    }

    /// The low `width` bits of `value`
    pub fn from_value(width: usize, value: u32) -> Self {
        assert!(width <= 32);
        let mut payload = Self::zeros(width);
        for i in 0..width {
            payload.set(i, (value >> i) & 1 != 0);
        }
        payload
    }

    /// Build a payload from bytes as captured by a cable.  Bits above `width` are cleared, and
    /// missing bytes read as zero.
    pub fn from_bytes(width: usize, data: &[u8]) -> Self {
        let mut payload = Self::zeros(width);
        let len = payload.bytes.len().min(data.len());
        payload.bytes[..len].copy_from_slice(&data[..len]);
        payload.mask_tail();
        payload
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits used in the final byte, 1 to 8.  This is the `bits` argument the `Cable`
    /// methods expect.
    pub fn last_byte_bits(&self) -> u8 {
        match self.width % 8 {
            0 => 8,
            n => n as u8,
        }
    }

    pub fn get(&self, bit: usize) -> bool {
        assert!(bit < self.width);
        self.bytes[bit / 8] & (1 << (bit % 8)) != 0
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        assert!(bit < self.width);
        if value {
            self.bytes[bit / 8] |= 1 << (bit % 8);
        } else {
            self.bytes[bit / 8] &= !(1 << (bit % 8));
        }
    }

    /// The payload as an integer, bit 0 least significant.  Only valid for widths up to 32.
    pub fn value(&self) -> u32 {
        assert!(self.width <= 32);
        let mut value = 0;
        for (i, b) in self.bytes.iter().enumerate() {
            value |= (*b as u32) << (8 * i);
        }
        value
    }

    fn mask_tail(&mut self) {
        let bits = self.width % 8;
        if bits != 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= (1 << bits) - 1;
            }
        }
    }
}

impl fmt::Debug for ScanPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Most significant bit first, the way it reads in a datasheet
        write!(f, "{}'b", self.width)?;
        for i in (0..self.width).rev() {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_zero_is_lsb_of_first_byte() {
        let mut p = ScanPayload::zeros(12);
        p.set(0, true);
        p.set(9, true);
        assert_eq!(p.as_bytes(), &[0x01, 0x02]);
        assert_eq!(p.value(), 0x201);
        assert_eq!(p.last_byte_bits(), 4);
    }

    #[test]
    fn from_bytes_masks_unused_bits() {
        let p = ScanPayload::from_bytes(4, &[0xff, 0xff]);
        assert_eq!(p.as_bytes(), &[0x0f]);
        assert_eq!(p.value(), 0xf);

        let p = ScanPayload::from_bytes(10, &[0xaa]);
        assert_eq!(p.as_bytes(), &[0xaa, 0x00]);
    }

    #[test]
    fn from_value_and_debug() {
        let p = ScanPayload::from_value(4, 0b1101);
        assert!(p.get(0));
        assert!(!p.get(1));
        assert!(p.get(3));
        assert_eq!(alloc::format!("{:?}", p), "4'b1101");
        assert_eq!(ScanPayload::from_value(8, 0x5a).last_byte_bits(), 8);
    }
}
