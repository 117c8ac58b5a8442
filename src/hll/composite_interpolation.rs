// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! X table for the composite estimator.
//!
//! For each `lg_config_k` the table maps the raw HLL estimate (X) back to the
//! cardinality that produces it on average (Y), with Y sampled at multiples of
//! [`get_y_stride`]. The X values are the expected raw estimate under a
//! Poisson model of the register values: with `n` items spread over `k`
//! registers each register receives `lambda = n / k` items on average and
//! `P(register <= m) = exp(-lambda * 2^-m)`. The raw estimate is then
//! `cf * k / E[2^-register]`, which makes `x[0] = cf * k`, the raw estimate of
//! an empty array.
//!
//! Tables are computed once per `lg_config_k` on first use.
//!
//! The Java and C++ libraries ship an empirically measured table instead, so
//! composite estimates (and the out-of-order estimate built on them) agree with
//! theirs only approximately. HIP estimates and the binary layout are exact.

use std::sync::OnceLock;

use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;

/// Number of points in every X table.
pub(crate) const X_ARR_LEN: usize = 40;

const NUM_LG_K: usize = (MAX_LG_K - MIN_LG_K + 1) as usize;

// register values above 63 never occur
const MAX_REGISTER_VALUE: i32 = 63;

static X_ARRS: [OnceLock<[f64; X_ARR_LEN]>; NUM_LG_K] = [const { OnceLock::new() }; NUM_LG_K];

/// HLL bias correction factor used by the raw estimate.
pub(crate) fn correction_factor(lg_config_k: u8) -> f64 {
    match lg_config_k {
        4 => 0.673,
        5 => 0.697,
        6 => 0.709,
        _ => {
            let k = (1u32 << lg_config_k) as f64;
            0.7213 / (1.0 + 1.079 / k)
        }
    }
}

/// Y distance between consecutive X table points.
pub(crate) fn get_y_stride(lg_config_k: u8) -> u32 {
    (1u32 << lg_config_k) / 8
}

/// Strictly increasing X table for `lg_config_k`.
pub(crate) fn get_x_arr(lg_config_k: u8) -> &'static [f64] {
    assert!(
        (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
        "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}]"
    );
    X_ARRS[(lg_config_k - MIN_LG_K) as usize].get_or_init(|| build_x_arr(lg_config_k))
}

fn build_x_arr(lg_config_k: u8) -> [f64; X_ARR_LEN] {
    let k = (1u32 << lg_config_k) as f64;
    let cf = correction_factor(lg_config_k);
    let y_stride = get_y_stride(lg_config_k) as f64;

    let mut x_arr = [0.0; X_ARR_LEN];
    for (i, x) in x_arr.iter_mut().enumerate() {
        let lambda = y_stride * i as f64 / k;
        *x = cf * k / expected_inv_pow2(lambda);
    }
    x_arr
}

/// `E[2^-M]` for a register `M` fed a Poisson(`lambda`) number of items.
fn expected_inv_pow2(lambda: f64) -> f64 {
    let cdf = |m: i32| {
        if m < 0 {
            0.0
        } else {
            (-lambda * f64::exp2(-(m as f64))).exp()
        }
    };
    (0..=MAX_REGISTER_VALUE)
        .map(|m| f64::exp2(-(m as f64)) * (cdf(m) - cdf(m - 1)))
        .sum()
}

#[cfg(test)]
mod tests {
    use googletest::assert_that;
    use googletest::prelude::near;

    use super::*;

    #[test]
    fn test_first_point_is_empty_raw_estimate() {
        for lg_k in MIN_LG_K..=MAX_LG_K {
            let k = (1u32 << lg_k) as f64;
            let x_arr = get_x_arr(lg_k);
            assert_eq!(x_arr.len(), X_ARR_LEN);
            assert_eq!(x_arr[0], correction_factor(lg_k) * k * k / k);
        }
    }

    #[test]
    fn test_strictly_increasing() {
        for lg_k in MIN_LG_K..=MAX_LG_K {
            let x_arr = get_x_arr(lg_k);
            assert!(x_arr.windows(2).all(|w| w[0] < w[1]), "lg_k {lg_k}");
        }
    }

    #[test]
    fn test_asymptotically_unbiased() {
        // far from the small-range regime the raw estimate tracks n
        let lg_k = 12;
        let x_arr = get_x_arr(lg_k);
        let y_last = (get_y_stride(lg_k) as usize * (X_ARR_LEN - 1)) as f64;
        assert_that!(x_arr[X_ARR_LEN - 1] / y_last, near(1.0, 0.05));
    }

    #[test]
    fn test_cached_table_is_shared() {
        let a = get_x_arr(10);
        let b = get_x_arr(10);
        assert!(std::ptr::eq(a, b));
    }
}
