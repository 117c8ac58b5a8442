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

//! The capability shared by every dense register array.

use crate::common::NumStdDev;
use crate::hll::AuxMap;
use crate::hll::HipEstimator;
use crate::hll::HllType;
use crate::hll::IterMode;
use crate::hll::PairIter;

/// A dense array of `2^lg_config_k` HLL registers.
///
/// Implementors store the registers and the [`HipEstimator`]; the estimator
/// math is provided on top of the accessors.
pub trait RegisterArray {
    /// Log2 of the number of registers.
    fn lg_config_k(&self) -> u8;

    /// The packing of this array.
    fn hll_type(&self) -> HllType;

    /// Every register value is at least `cur_min`. Always 0 for 6- and 8-bit arrays.
    fn cur_min(&self) -> u8;

    /// Number of registers whose value is exactly `cur_min`.
    fn num_at_cur_min(&self) -> u32;

    fn estimator(&self) -> &HipEstimator;

    fn set_out_of_order(&mut self, out_of_order: bool);

    /// Decoded value of register `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below [`num_registers`](Self::num_registers).
    fn get(&self, slot: u32) -> u8;

    /// Raises the register addressed by `coupon` to its value, if larger.
    fn update(&mut self, coupon: u32);

    /// The packed register buffer as serialized.
    fn register_bytes(&self) -> &[u8];

    /// Exception map of the 4-bit array, if any register overflowed.
    fn aux_map(&self) -> Option<&AuxMap> {
        None
    }

    fn num_registers(&self) -> u32 {
        1 << self.lg_config_k()
    }

    fn is_empty(&self) -> bool {
        self.cur_min() == 0 && self.num_at_cur_min() == self.num_registers()
    }

    fn is_out_of_order(&self) -> bool {
        self.estimator().is_out_of_order()
    }

    /// HIP estimate, or the composite estimate once out of order.
    fn estimate(&self) -> f64 {
        self.estimator()
            .estimate(self.lg_config_k(), self.cur_min(), self.num_at_cur_min())
    }

    fn composite_estimate(&self) -> f64 {
        self.estimator()
            .composite_estimate(self.lg_config_k(), self.cur_min(), self.num_at_cur_min())
    }

    fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator().lower_bound(
            self.lg_config_k(),
            self.cur_min(),
            self.num_at_cur_min(),
            num_std_dev,
        )
    }

    fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator().upper_bound(
            self.lg_config_k(),
            self.cur_min(),
            self.num_at_cur_min(),
            num_std_dev,
        )
    }

    /// Walks the registers in slot order.
    fn iter(&self, mode: IterMode) -> PairIter<'_>
    where
        Self: Sized,
    {
        PairIter::new(self, mode)
    }
}
