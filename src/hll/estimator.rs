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

//! HIP (Historical Inverse Probability) estimator and the composite estimator
//!
//! Every register array owns one [`HipEstimator`]. It tracks:
//! - **HIP accumulator**: a running estimate bumped on every register increase,
//!   accurate as long as updates arrive in stream order
//! - **KxQ registers**: the sum of `2^-value` over all registers, split in two
//!   for numerical precision, feeding the raw HLL estimate
//!
//! Once the out-of-order flag is set (after a merge by an external driver) the
//! HIP accumulator is no longer trusted and the composite estimator is used.

use crate::common::NumStdDev;
use crate::hll::composite_interpolation;
use crate::hll::cubic_interpolation;
use crate::hll::harmonic_numbers;
use crate::hll::relative_error;

/// Relative standard error factor of the HIP estimator, `sqrt(ln(2))`.
const HLL_HIP_RSE_FACTOR: f64 = 0.8325546;
/// Relative standard error factor of the composite estimator, `sqrt(3 ln(2) - 1)`.
const HLL_NON_HIP_RSE_FACTOR: f64 = 1.03896;

/// HIP accumulator, KxQ registers and out-of-order flag of a register array.
#[derive(Debug, Clone)]
pub struct HipEstimator {
    /// HIP estimator accumulator
    hip_accum: f64,
    /// KxQ register for values < 32 (larger inverse powers)
    kxq0: f64,
    /// KxQ register for values >= 32 (tiny inverse powers)
    kxq1: f64,
    /// Out-of-order flag: when true, estimates come from the composite estimator
    out_of_order: bool,
}

impl PartialEq for HipEstimator {
    fn eq(&self, other: &Self) -> bool {
        // bit-identical after a binary round trip
        self.hip_accum.to_bits() == other.hip_accum.to_bits()
            && self.kxq0.to_bits() == other.kxq0.to_bits()
            && self.kxq1.to_bits() == other.kxq1.to_bits()
            && self.out_of_order == other.out_of_order
    }
}

impl HipEstimator {
    /// Create a new HIP estimator for a sketch with 2^lg_config_k registers
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1u32 << lg_config_k;
        Self {
            hip_accum: 0.0,
            kxq0: k as f64, // all registers start at 0 and contribute 1/2^0
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Restores an estimator from its serialized fields.
    pub fn from_parts(hip_accum: f64, kxq0: f64, kxq1: f64, out_of_order: bool) -> Self {
        Self {
            hip_accum,
            kxq0,
            kxq1,
            out_of_order,
        }
    }

    /// Update the estimator when a register changes from old_value to new_value
    ///
    /// The HIP accumulator is bumped by `k / (kxq0 + kxq1)` evaluated before the
    /// KxQ registers change. This happens in and out of order, so the
    /// accumulator stays current for serialization.
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1u32 << lg_config_k) as f64;
        self.hip_accum += k / (self.kxq0 + self.kxq1);
        self.update_kxq(old_value, new_value);
    }

    fn update_kxq(&mut self, old_value: u8, new_value: u8) {
        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Current cardinality estimate: HIP while in order, composite otherwise.
    ///
    /// # Arguments
    /// * `lg_config_k` - Log2 of number of registers (k)
    /// * `cur_min` - Current minimum register value (0 for Array6/8)
    /// * `num_at_cur_min` - Number of registers at cur_min value
    pub fn estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        if self.out_of_order {
            self.composite_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            self.hip_accum
        }
    }

    /// Raw HLL estimate `cf * k^2 / (kxq0 + kxq1)`.
    fn raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1u32 << lg_config_k) as f64;
        let correction_factor = composite_interpolation::correction_factor(lg_config_k);
        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Linear counting estimate from the number of registers still at 0.
    fn bitmap_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = 1u32 << lg_config_k;

        let num_unhit = if cur_min == 0 { num_at_cur_min } else { 0 };

        // all registers hit
        if num_unhit == 0 {
            return (k as f64) * (k as f64 / 0.5).ln();
        }

        let num_hit = k - num_unhit;
        harmonic_numbers::bitmap_estimate(k, num_hit)
    }

    /// Composite estimate: the bias-corrected raw estimate, or the linear
    /// counting estimate when the cardinality is small.
    pub fn composite_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let raw_est = self.raw_estimate(lg_config_k);

        let x_arr = composite_interpolation::get_x_arr(lg_config_k);
        let y_stride = composite_interpolation::get_y_stride(lg_config_k) as f64;

        if raw_est < x_arr[0] {
            return 0.0;
        }

        let x_arr_len_m1 = x_arr.len() - 1;

        // above the table: extrapolate linearly from the last point
        if raw_est > x_arr[x_arr_len_m1] {
            let final_y = y_stride * (x_arr_len_m1 as f64);
            let factor = final_y / x_arr[x_arr_len_m1];
            return raw_est * factor;
        }

        let adj_est = cubic_interpolation::using_x_arr_and_y_stride(x_arr, y_stride, raw_est);

        let k = 1u32 << lg_config_k;
        if adj_est > (3 * k) as f64 {
            return adj_est;
        }

        let lin_est = self.bitmap_estimate(lg_config_k, cur_min, num_at_cur_min);

        let avg_est = (adj_est + lin_est) / 2.0;

        let crossover = match lg_config_k {
            4 => 0.718,
            5 => 0.672,
            _ => 0.64,
        };

        if avg_est > crossover * (k as f64) {
            adj_est
        } else {
            lin_est
        }
    }

    /// Lower confidence bound of [`estimate`](Self::estimate).
    ///
    /// For `lg_config_k > 12` the bound never drops below the number of
    /// registers known to be hit.
    pub fn lower_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        if lg_config_k > relative_error::MAX_TABLED_LG_K {
            let k = 1u32 << lg_config_k;
            let eps = self.closed_form_eps(k, num_std_dev);
            let num_non_zeros = if cur_min == 0 { k - num_at_cur_min } else { k };
            return (estimate / (1.0 + eps)).max(num_non_zeros as f64);
        }
        let re = relative_error::get_rel_err(false, self.out_of_order, lg_config_k, num_std_dev);
        estimate / (1.0 + re)
    }

    /// Upper confidence bound of [`estimate`](Self::estimate).
    pub fn upper_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let estimate = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        if lg_config_k > relative_error::MAX_TABLED_LG_K {
            let eps = self.closed_form_eps(1u32 << lg_config_k, num_std_dev);
            return estimate / (1.0 - eps);
        }
        let re = relative_error::get_rel_err(true, self.out_of_order, lg_config_k, num_std_dev);
        estimate / (1.0 + re)
    }

    fn closed_form_eps(&self, k: u32, num_std_dev: NumStdDev) -> f64 {
        let rse_factor = if self.out_of_order {
            HLL_NON_HIP_RSE_FACTOR
        } else {
            HLL_HIP_RSE_FACTOR
        };
        num_std_dev.as_u8() as f64 * rse_factor / (k as f64).sqrt()
    }

    /// Get the HIP accumulator value
    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    /// Get the kxq0 register value
    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    /// Get the kxq1 register value
    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    /// Check if this estimator is in out-of-order mode
    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    /// Set the out-of-order flag
    ///
    /// The HIP accumulator is kept as is so that it survives a serialization
    /// round trip; it is simply not consulted while the flag is set.
    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
    }

    /// Set the HIP accumulator directly
    pub fn set_hip_accum(&mut self, value: f64) {
        self.hip_accum = value;
    }
}

/// Compute 1 / 2^value (inverse power of 2)
#[inline]
fn inv_pow2(value: u8) -> f64 {
    if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}
