//! Arithmetic over GF(2^255 - 19) and the Elligator-2 point map.
//!
//! Backs `hash_to_point`. curve25519-dalek does not expose raw field
//! elements, so the map carries its own 4x64 limb arithmetic. The branch
//! structure is the `ge_fromfe_frombytes_vartime` map every CryptoNote
//! chain shares; the result is NOT cofactor-cleared, callers multiply by 8.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};

/// Field element mod p = 2^255 - 19, little-endian u64 limbs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Fe([u64; 4]);

const P: Fe = Fe([
    0xffff_ffff_ffff_ffed,
    0xffff_ffff_ffff_ffff,
    0xffff_ffff_ffff_ffff,
    0x7fff_ffff_ffff_ffff,
]);

/// Montgomery curve constant A = 486662.
const CURVE_A: u64 = 486_662;

/// sqrt(-1) mod p.
const SQRT_M1_BYTES: [u8; 32] = [
    0xb0, 0xa0, 0x0e, 0x4a, 0x27, 0x1b, 0xee, 0xc4, 0x78, 0xe4, 0x2f, 0xad, 0x06, 0x18, 0x43,
    0x2f, 0xa7, 0xd7, 0xfb, 0x3d, 0x99, 0x00, 0x4d, 0x2b, 0x0b, 0xdf, 0xc1, 0x4f, 0x80, 0x24,
    0x83, 0x2b,
];

impl Fe {
    const ZERO: Fe = Fe([0; 4]);
    const ONE: Fe = Fe([1, 0, 0, 0]);

    fn from_u64(value: u64) -> Fe {
        Fe([value, 0, 0, 0])
    }

    fn from_bytes(bytes: &[u8; 32]) -> Fe {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *limb = u64::from_le_bytes(chunk);
        }
        Fe(limbs).reduce()
    }

    fn to_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    fn is_zero(self) -> bool {
        self.0 == [0; 4]
    }

    fn is_odd(self) -> bool {
        self.0[0] & 1 == 1
    }

    fn geq(self, other: Fe) -> bool {
        for i in (0..4).rev() {
            if self.0[i] != other.0[i] {
                return self.0[i] > other.0[i];
            }
        }
        true
    }

    /// Raw addition; returns the carry out of the top limb.
    fn add_raw(self, other: Fe) -> (Fe, bool) {
        let mut limbs = [0u64; 4];
        let mut carry = 0u128;
        for (i, limb) in limbs.iter_mut().enumerate() {
            let sum = u128::from(self.0[i]) + u128::from(other.0[i]) + carry;
            *limb = sum as u64;
            carry = sum >> 64;
        }
        (Fe(limbs), carry != 0)
    }

    /// Raw subtraction; caller guarantees self >= other.
    fn sub_raw(self, other: Fe) -> Fe {
        let mut limbs = [0u64; 4];
        let mut borrow = 0u64;
        for (i, limb) in limbs.iter_mut().enumerate() {
            let (diff, b1) = self.0[i].overflowing_sub(other.0[i]);
            let (diff, b2) = diff.overflowing_sub(borrow);
            *limb = diff;
            borrow = u64::from(b1) + u64::from(b2);
        }
        Fe(limbs)
    }

    fn reduce(self) -> Fe {
        let mut value = self;
        while value.geq(P) {
            value = value.sub_raw(P);
        }
        value
    }

    fn add(self, other: Fe) -> Fe {
        let (sum, carry) = self.add_raw(other);
        // operands are < p < 2^255, so no carry escapes
        debug_assert!(!carry);
        sum.reduce()
    }

    fn sub(self, other: Fe) -> Fe {
        if self.geq(other) {
            self.sub_raw(other)
        } else {
            let (lifted, _) = self.add_raw(P);
            lifted.sub_raw(other).reduce()
        }
    }

    fn neg(self) -> Fe {
        if self.is_zero() {
            Fe::ZERO
        } else {
            P.sub_raw(self)
        }
    }

    /// Schoolbook multiply with 2^256 = 38 folding.
    fn mul(self, other: Fe) -> Fe {
        let mut product = [0u64; 8];
        for i in 0..4 {
            let mut carry = 0u128;
            for j in 0..4 {
                let term = u128::from(self.0[i]) * u128::from(other.0[j])
                    + u128::from(product[i + j])
                    + carry;
                product[i + j] = term as u64;
                carry = term >> 64;
            }
            product[i + 4] = carry as u64;
        }
        let lo = Fe([product[0], product[1], product[2], product[3]]);
        let hi = Fe([product[4], product[5], product[6], product[7]]);
        let (folded, carry) = lo.add_raw(hi.mul_small(38));
        let folded = if carry {
            let (again, _) = folded.add_raw(Fe::from_u64(38));
            again
        } else {
            folded
        };
        folded.reduce()
    }

    fn mul_small(self, factor: u64) -> Fe {
        let mut limbs = [0u64; 4];
        let mut carry = 0u128;
        for (i, limb) in limbs.iter_mut().enumerate() {
            let term = u128::from(self.0[i]) * u128::from(factor) + carry;
            *limb = term as u64;
            carry = term >> 64;
        }
        let mut out = Fe(limbs);
        // fold overflow back in via 2^256 = 38
        let mut fold = carry as u64 * 38;
        while fold != 0 {
            let (sum, overflowed) = out.add_raw(Fe::from_u64(fold));
            out = sum;
            fold = if overflowed { 38 } else { 0 };
        }
        out.reduce()
    }

    fn square(self) -> Fe {
        self.mul(self)
    }

    /// Square-and-multiply over the exponent's limbs, LSB first.
    fn pow(self, exponent: [u64; 4]) -> Fe {
        let mut result = Fe::ONE;
        let mut base = self;
        for limb in exponent {
            let mut bits = limb;
            for _ in 0..64 {
                if bits & 1 == 1 {
                    result = result.mul(base);
                }
                base = base.square();
                bits >>= 1;
            }
        }
        result
    }

    /// a^(p-2): modular inverse.
    fn invert(self) -> Fe {
        self.pow([
            0xffff_ffff_ffff_ffeb,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x7fff_ffff_ffff_ffff,
        ])
    }

    /// a^((p-5)/8) = a^(2^252 - 3).
    fn pow_p58(self) -> Fe {
        self.pow([
            0xffff_ffff_ffff_fffd,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x0fff_ffff_ffff_ffff,
        ])
    }

    /// Square root, if one exists. Candidate a^((p+3)/8), adjusted by
    /// sqrt(-1) when the first candidate misses.
    fn sqrt(self) -> Option<Fe> {
        if self.is_zero() {
            return Some(Fe::ZERO);
        }
        let candidate = self.pow([
            0xffff_ffff_ffff_fffe,
            0xffff_ffff_ffff_ffff,
            0xffff_ffff_ffff_ffff,
            0x0fff_ffff_ffff_ffff,
        ]);
        if candidate.square() == self {
            return Some(candidate);
        }
        let adjusted = candidate.mul(sqrt_m1());
        if adjusted.square() == self {
            return Some(adjusted);
        }
        None
    }
}

fn sqrt_m1() -> Fe {
    Fe::from_bytes(&SQRT_M1_BYTES)
}

/// (u/v)^((p+3)/8) computed as u * v^3 * (u * v^7)^((p-5)/8).
fn div_pow_m1(u: Fe, v: Fe) -> Fe {
    let v3 = v.square().mul(v);
    let v7 = v3.square().mul(v);
    u.mul(v3).mul(u.mul(v7).pow_p58())
}

/// sqrt of sign * factor * A * (A + 2), the fffb constants of the
/// reference implementation, computed on demand.
fn fffb(factor: Fe, negate: bool) -> Fe {
    let a = Fe::from_u64(CURVE_A);
    let product = factor.mul(a).mul(a.add(Fe::from_u64(2)));
    let product = if negate { product.neg() } else { product };
    product.sqrt().expect("curve constant is a square")
}

/// Elligator-2: 32 uniform bytes to a curve point (not cofactor-cleared).
pub(crate) fn map_to_curve(hash: &[u8; 32]) -> EdwardsPoint {
    let u = Fe::from_bytes(hash);
    let neg_a = Fe::from_u64(CURVE_A).neg();

    let u2 = u.square();
    let v = u2.add(u2); // 2u^2
    let w = v.add(Fe::ONE); // 2u^2 + 1

    // x = w^2 - 2 A^2 u^2
    let a2u2 = Fe::from_u64(CURVE_A).square().mul(u2);
    let mut x = w.square().sub(a2u2.add(a2u2));

    let mut rx = div_pow_m1(w, x);
    let mut y = rx.square().mul(x);

    let mut z = neg_a;
    let sign;
    if y == w {
        rx = rx.mul(fffb(Fe::from_u64(2), false)).mul(u);
        z = z.mul(v);
        sign = false;
    } else if y == w.neg() {
        rx = rx.mul(fffb(Fe::from_u64(2), true)).mul(u);
        z = z.mul(v);
        sign = false;
    } else {
        // quadratic non-residue branch: twist x by sqrt(-1)
        x = x.mul(sqrt_m1());
        y = rx.square().mul(x);
        if y == w {
            rx = rx.mul(fffb(sqrt_m1(), false));
        } else {
            rx = rx.mul(fffb(sqrt_m1(), true));
        }
        sign = true;
    }

    if rx.is_odd() != sign {
        rx = rx.neg();
    }

    // projective (X : Y : Z) = (rx * (z + w) : z - w : z + w)
    let z_coord = z.add(w);
    let y_coord = z.sub(w);
    let x_coord = rx.mul(z_coord);

    let z_inv = z_coord.invert();
    let affine_x = x_coord.mul(z_inv);
    let affine_y = y_coord.mul(z_inv);

    let mut compressed = affine_y.to_bytes();
    if affine_x.is_odd() {
        compressed[31] |= 0x80;
    }
    CompressedEdwardsY(compressed)
        .decompress()
        .expect("map produces a valid point")
}
