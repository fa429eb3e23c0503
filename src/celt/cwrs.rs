//! Combinatorial pulse-vector indexing (the reference's "CWRS": Combinatorial
//! Codes With Restricted Sum).
//!
//! Encodes/decodes a bijection between integers in `0..V(n,k)` and integer
//! vectors of length `n` whose absolute values sum to `k`. `V(n,k)` is the
//! exact combinatorial count described in `spec.md` §4.2 step 11 and has no
//! dependency on any reference table, so this part of the codec is exact
//! rather than approximated.

use std::sync::OnceLock;

/// `(n, k)` pairs outside this range fall back to the uncached recurrence;
/// every `(n, k)` the allocator and PVQ search actually reach in practice
/// (bands are at most a few dozen bins wide, pulse caps are in the low
/// hundreds) stays comfortably inside it.
const MAX_N: usize = 48;
const MAX_K: u32 = 256;

/// Flattened `(MAX_N+1) x (MAX_K+1)` table of `count(n, k)`, built once on
/// first use. Row `n` is `MAX_K + 1` entries wide, so `table[n * (MAX_K+1) +
/// k]` holds `count(n, k)`.
struct PulseCountTable(Vec<u64>);

fn pulse_count_table() -> &'static PulseCountTable {
    static TABLE: OnceLock<PulseCountTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let stride = (MAX_K as usize) + 1;
        let mut table = vec![0_u64; (MAX_N + 1) * stride];
        for row_k in 0..stride {
            table[row_k] = u64::from(row_k == 0);
        }
        for ni in 1..=MAX_N {
            table[ni * stride] = 1;
            for ki in 1..stride {
                let mut acc = table[(ni - 1) * stride + ki];
                for j in 1..=ki {
                    acc += 2 * table[(ni - 1) * stride + ki - j];
                }
                table[ni * stride + ki] = acc;
            }
        }
        PulseCountTable(table)
    })
}

fn count_uncached(n: usize, k: u32) -> u64 {
    let mut table = vec![vec![0_u64; (k as usize) + 1]; n + 1];
    for row in table.iter_mut() {
        row[0] = 1;
    }
    for row_k in 0..=k as usize {
        table[0][row_k] = if row_k == 0 { 1 } else { 0 };
    }
    for ni in 1..=n {
        for ki in 1..=k as usize {
            let mut acc = table[ni - 1][ki];
            for j in 1..=ki {
                acc += 2 * table[ni - 1][ki - j];
            }
            table[ni][ki] = acc;
        }
    }
    table[n][k as usize]
}

/// Number of length-`n` integer vectors whose entries' absolute values sum to
/// `k`.
///
/// `count(n, 0) == 1` for all `n` (the all-zero vector).
/// `count(0, k) == 0` for `k > 0`, `count(0, 0) == 1`.
/// `count(n, k) == count(n-1, k) + 2 * sum_{j=1}^{k} count(n-1, k-j)`
/// (choose the magnitude of the first component, with a factor of two for
/// its sign when the magnitude is nonzero).
///
/// Backed by a table built once via [`pulse_count_table`] so the hot PVQ
/// encode/decode path never rebuilds it; only `(n, k)` pairs that fall
/// outside the precomputed bounds pay for a fresh (allocating) recurrence.
pub(crate) fn count(n: usize, k: u32) -> u64 {
    if n <= MAX_N && k <= MAX_K {
        let stride = (MAX_K as usize) + 1;
        pulse_count_table().0[n * stride + k as usize]
    } else {
        count_uncached(n, k)
    }
}

/// Encodes a pulse vector `y` (length `n`, `sum(|y_i|) == k`) into its
/// combinatorial rank in `0..count(n, k)`.
pub(crate) fn encode_pulses(y: &[i32]) -> u64 {
    let n = y.len();
    let k: u32 = y.iter().map(|v| v.unsigned_abs()).sum();
    let mut index = 0_u64;
    let mut remaining_k = k;
    for (i, &yi) in y.iter().enumerate() {
        let remaining_n = n - i - 1;
        let a = yi.unsigned_abs();
        if a > 0 {
            index += count(remaining_n, remaining_k);
            for j in 1..a {
                index += 2 * count(remaining_n, remaining_k - j);
            }
            let c = count(remaining_n, remaining_k - a);
            if yi < 0 {
                index += c;
            }
        }
        remaining_k -= a;
    }
    index
}

/// Decodes a combinatorial rank back into a pulse vector of length `n` with
/// `sum(|y_i|) == k`. Inverse of [`encode_pulses`].
pub(crate) fn decode_pulses(n: usize, k: u32, mut index: u64) -> Vec<i32> {
    let mut y = vec![0_i32; n];
    let mut remaining_k = k;
    for i in 0..n {
        let remaining_n = n - i - 1;
        if remaining_k == 0 {
            continue;
        }
        let c0 = count(remaining_n, remaining_k);
        if index < c0 {
            continue;
        }
        index -= c0;
        let mut a = 1_u32;
        loop {
            let c = count(remaining_n, remaining_k - a);
            if index < c {
                y[i] = a as i32;
                break;
            }
            index -= c;
            if index < c {
                y[i] = -(a as i32);
                break;
            }
            index -= c;
            a += 1;
        }
        remaining_k -= y[i].unsigned_abs();
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_brute_force_for_small_n_k() {
        fn brute(n: usize, k: u32) -> u64 {
            if n == 0 {
                return if k == 0 { 1 } else { 0 };
            }
            let mut total = 0;
            for a in 0..=k {
                let factor = if a == 0 { 1 } else { 2 };
                total += factor * brute(n - 1, k - a);
            }
            total
        }

        for n in 0..=4 {
            for k in 0..=6 {
                assert_eq!(count(n, k), brute(n, k), "n={} k={}", n, k);
            }
        }
    }

    #[test]
    fn encode_decode_round_trips_exhaustively() {
        let n = 3;
        let k = 4;
        let total = count(n, k);

        // Enumerate a handful of vectors by brute force and check round trip.
        fn enumerate(n: usize, k: i32, prefix: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
            if n == 0 {
                if k == 0 {
                    out.push(prefix.clone());
                }
                return;
            }
            for a in -(k)..=(k) {
                if a.abs() > k {
                    continue;
                }
                prefix.push(a);
                enumerate(n - 1, k - a.abs(), prefix, out);
                prefix.pop();
            }
        }

        let mut vectors = Vec::new();
        enumerate(n, k as i32, &mut Vec::new(), &mut vectors);
        assert_eq!(vectors.len() as u64, total);

        let mut seen_ranks = std::collections::HashSet::new();
        for v in &vectors {
            let rank = encode_pulses(v);
            assert!(rank < total);
            assert!(seen_ranks.insert(rank), "duplicate rank for {:?}", v);
            let back = decode_pulses(n, k, rank);
            assert_eq!(&back, v);
        }
    }
}
