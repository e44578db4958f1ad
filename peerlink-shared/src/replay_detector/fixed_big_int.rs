use std::fmt;

/// FixedBigInt is a bit array of fixed length, shifted as a whole.
pub(crate) struct FixedBigInt {
    bits: Vec<u64>,
    n: usize,
    msb_mask: u64,
}

impl fmt::Display for FixedBigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for i in (0..self.bits.len()).rev() {
            out += format!("{:016X}", self.bits[i]).as_str();
        }
        write!(f, "{out}")
    }
}

impl FixedBigInt {
    pub(crate) fn new(n: usize) -> Self {
        let mut chunk_size = n.div_ceil(64);
        if chunk_size == 0 {
            chunk_size = 1;
        }

        FixedBigInt {
            bits: vec![0; chunk_size],
            n,
            msb_mask: if n % 64 == 0 {
                u64::MAX
            } else {
                (1 << (n % 64)) - 1
            },
        }
    }

    /// Shifts the array left by n bits; bits past the length are dropped.
    pub(crate) fn lsh(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let n_chunk = n / 64;
        let n_n = n % 64;

        for i in (0..self.bits.len()).rev() {
            let mut carry: u64 = 0;
            if i >= n_chunk {
                let i_src = i - n_chunk;
                if n_n > 0 && i_src >= 1 {
                    carry = self.bits[i_src - 1] >> (64 - n_n);
                }
                self.bits[i] = (self.bits[i_src] << n_n) | carry;
            } else {
                self.bits[i] = 0;
            }
        }

        if let Some(last) = self.bits.last_mut() {
            *last &= self.msb_mask;
        }
    }

    pub(crate) fn bit(&self, i: usize) -> usize {
        if i >= self.n {
            return 0;
        }
        let chunk = i / 64;
        let pos = i % 64;
        usize::from(self.bits[chunk] & (1 << pos) != 0)
    }

    pub(crate) fn set_bit(&mut self, i: usize) {
        if i >= self.n {
            return;
        }
        let chunk = i / 64;
        let pos = i % 64;
        self.bits[chunk] |= 1 << pos;
    }
}
