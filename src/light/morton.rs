//! Z-order (Morton) codes and the radix sort that keeps lights in spatial
//! order.
//!
//! The code is computed from the *base* (x, z) world coordinates only, so
//! animation offsets never invalidate the sort. Sorting improves locality of
//! the cluster rasterization; it is not required for correctness.

use glam::Vec3;

/// Spread the low 16 bits of `v` so each lands in an even bit position.
#[inline]
#[must_use]
pub fn spread16(v: u32) -> u32 {
    let mut x = v & 0x0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// Interleave two 16-bit coordinates into a 32-bit Z-order code.
#[inline]
#[must_use]
pub fn morton2d(x: u32, z: u32) -> u32 {
    spread16(x) | (spread16(z) << 1)
}

/// Morton code for a world position: (x, z) truncated to `u32`. Negative
/// coordinates saturate to 0, collapsing them onto the first curve cell —
/// acceptable for a locality-only ordering.
#[inline]
#[must_use]
pub fn morton_for(position: Vec3) -> u32 {
    morton2d(position.x as u32, position.z as u32)
}

/// Stable LSD radix sort (radix 256, 4 passes) keyed by a 32-bit value.
///
/// `scratch` is the caller-owned spill buffer; its capacity is reserved once
/// at store creation so per-frame sorts never allocate. Passes whose digit
/// is constant across all items are skipped.
pub(crate) fn radix_sort_by_key<T: Copy>(
    items: &mut [T],
    scratch: &mut Vec<T>,
    key: impl Fn(&T) -> u32,
) {
    let len = items.len();
    if len < 2 {
        return;
    }

    for pass in 0..4 {
        let shift = pass * 8;
        let mut counts = [0usize; 256];
        for item in items.iter() {
            counts[((key(item) >> shift) & 0xff) as usize] += 1;
        }
        // All items share this digit: the pass is an identity permutation.
        if counts.iter().any(|&c| c == len) {
            continue;
        }

        let mut offsets = [0usize; 256];
        let mut total = 0;
        for (offset, &count) in offsets.iter_mut().zip(counts.iter()) {
            *offset = total;
            total += count;
        }

        scratch.clear();
        scratch.extend_from_slice(items);
        for item in scratch.iter() {
            let digit = ((key(item) >> shift) & 0xff) as usize;
            items[offsets[digit]] = *item;
            offsets[digit] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread16_known_values() {
        assert_eq!(spread16(0), 0);
        assert_eq!(spread16(1), 1);
        assert_eq!(spread16(0b11), 0b101);
        assert_eq!(spread16(0xffff), 0x5555_5555);
    }

    #[test]
    fn test_morton_matches_bit_spread() {
        for (x, z) in [(0u32, 0u32), (1, 0), (0, 1), (3, 5), (65535, 65535)] {
            let expected = spread16(x) | (spread16(z) << 1);
            assert_eq!(morton2d(x, z), expected);
        }
    }

    #[test]
    fn test_morton_for_truncates() {
        assert_eq!(
            morton_for(Vec3::new(3.9, 100.0, 5.2)),
            morton2d(3, 5),
            "y must be ignored and x/z truncated"
        );
        // Negative coordinates saturate to zero
        assert_eq!(morton_for(Vec3::new(-4.0, 0.0, -1.0)), 0);
    }

    #[test]
    fn test_radix_sort_orders_by_key() {
        let mut items: Vec<u32> =
            vec![0xdead_beef, 3, 0xffff_ffff, 42, 42, 0, 1 << 24];
        let mut scratch = Vec::new();
        radix_sort_by_key(&mut items, &mut scratch, |&v| v);
        let mut expected = items.clone();
        expected.sort_unstable();
        assert_eq!(items, expected);
    }

    #[test]
    fn test_radix_sort_is_stable() {
        // Key collisions keep insertion order: sort (key, payload) pairs
        // where payload records original position.
        let mut items: Vec<(u32, u32)> =
            vec![(5, 0), (1, 1), (5, 2), (1, 3), (5, 4)];
        let mut scratch = Vec::new();
        radix_sort_by_key(&mut items, &mut scratch, |&(k, _)| k);
        assert_eq!(items, vec![(1, 1), (1, 3), (5, 0), (5, 2), (5, 4)]);
    }

    #[test]
    fn test_radix_sort_idempotent() {
        let mut items: Vec<u32> = (0..257).rev().collect();
        let mut scratch = Vec::new();
        radix_sort_by_key(&mut items, &mut scratch, |&v| v);
        let once = items.clone();
        radix_sort_by_key(&mut items, &mut scratch, |&v| v);
        assert_eq!(items, once);
    }
}
