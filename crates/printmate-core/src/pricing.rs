// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Price estimate shown next to the order form. The shop's backend recomputes
// the authoritative price; this mirrors its rate card so the preview matches.

use crate::types::{Binding, ColorMode, SideMode, TransformParameters};

/// Per-page rate in INR.
const RATE_COLOR: u64 = 5;
const RATE_BW: u64 = 1;

/// Flat surcharge for spiral binding in INR.
const SPIRAL_SURCHARGE: u64 = 20;

/// Estimate the order total in INR.
///
/// Double-sided printing halves the billable pages, rounded up. Zero pages
/// always estimates to zero regardless of binding.
pub fn estimate(page_count: u32, params: &TransformParameters) -> u64 {
    if page_count == 0 {
        return 0;
    }

    let per_page = match params.color_mode {
        ColorMode::Color => RATE_COLOR,
        ColorMode::Bw => RATE_BW,
    };

    let effective_pages = match params.side_mode {
        SideMode::Double => (u64::from(page_count) + 1) / 2,
        SideMode::Single => u64::from(page_count),
    };

    let binding = match params.binding {
        Binding::Spiral => SPIRAL_SURCHARGE,
        Binding::None | Binding::Soft => 0,
    };

    let copies = u64::from(params.copies.max(1));
    effective_pages * per_page * copies + binding
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Orientation;

    fn params() -> TransformParameters {
        TransformParameters {
            range_expression: String::new(),
            orientation: Orientation::Portrait,
            color_mode: ColorMode::Bw,
            side_mode: SideMode::Single,
            binding: Binding::None,
            copies: 1,
        }
    }

    #[test]
    fn bw_single_no_binding() {
        assert_eq!(estimate(10, &params()), 10);
    }

    #[test]
    fn color_costs_five_per_page() {
        let p = TransformParameters {
            color_mode: ColorMode::Color,
            ..params()
        };
        assert_eq!(estimate(10, &p), 50);
    }

    #[test]
    fn double_sided_halves_rounded_up() {
        let p = TransformParameters {
            side_mode: SideMode::Double,
            ..params()
        };
        assert_eq!(estimate(9, &p), 5);
        assert_eq!(estimate(10, &p), 5);
    }

    #[test]
    fn spiral_adds_flat_surcharge_once() {
        let p = TransformParameters {
            binding: Binding::Spiral,
            copies: 3,
            ..params()
        };
        assert_eq!(estimate(4, &p), 4 * 3 + 20);
    }

    #[test]
    fn zero_pages_estimates_zero() {
        let p = TransformParameters {
            binding: Binding::Spiral,
            ..params()
        };
        assert_eq!(estimate(0, &p), 0);
    }

    #[test]
    fn zero_copies_treated_as_one() {
        let p = TransformParameters {
            copies: 0,
            ..params()
        };
        assert_eq!(estimate(2, &p), 2);
    }
}
