// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wraparound compensation for fixed-width hardware registers.
//!
//! INVARIANTS:
//! - At most one wrap is assumed between two samples; the sampling interval
//!   of each counter is chosen so that this holds.

/// Largest value a register of `width_bits` bits holds before wrapping to zero.
pub const fn wrap_threshold(width_bits: u8) -> u64 {
    if width_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << width_bits) - 1
    }
}

/// Returns the monotonic increment between two raw samples of one register.
///
/// When `new_raw` is below `prev_raw` the register wrapped once and the
/// increment is `(wrap_threshold - prev_raw) + new_raw`.
pub fn accumulate(prev_raw: u64, new_raw: u64, wrap_threshold: u64) -> u64 {
    debug_assert!(wrap_threshold != 0, "wrap threshold must be non-zero");
    if new_raw >= prev_raw {
        new_raw - prev_raw
    } else {
        wrap_threshold.saturating_sub(prev_raw) + new_raw
    }
}
