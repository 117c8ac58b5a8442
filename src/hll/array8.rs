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

//! HyperLogLog Array8 mode - 8-bit (1 byte per slot) representation
//!
//! Array8 is the simplest register array, storing one byte per slot with no
//! bit packing, `cur_min` tracking or exception map.

use crate::hll::HipEstimator;
use crate::hll::HllType;
use crate::hll::IterMode;
use crate::hll::PairIter;
use crate::hll::RegisterArray;
use crate::hll::check_lg_config_k;
use crate::hll::get_slot;
use crate::hll::get_value;

/// Core Array8 data structure - one byte per slot, no packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array8 {
    lg_config_k: u8,
    /// Direct byte array: bytes[slot] = value
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    estimator: HipEstimator,
}

impl Array8 {
    /// Creates an empty array of `2^lg_config_k` registers.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in `[4, 21]`.
    pub fn new(lg_config_k: u8) -> Self {
        check_lg_config_k(lg_config_k);
        let k = 1 << lg_config_k;

        Self {
            lg_config_k,
            bytes: vec![0u8; k as usize].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    pub(crate) fn from_parts(
        lg_config_k: u8,
        bytes: Box<[u8]>,
        num_zeros: u32,
        estimator: HipEstimator,
    ) -> Self {
        debug_assert_eq!(bytes.len(), 1 << lg_config_k);
        Self {
            lg_config_k,
            bytes,
            num_zeros,
            estimator,
        }
    }

    /// Builds an Array8 holding the same register values as `src`.
    pub fn convert_from(src: &dyn RegisterArray) -> Self {
        let mut dst = Array8::new(src.lg_config_k());
        dst.estimator.set_out_of_order(src.is_out_of_order());
        for pair in PairIter::new(src, IterMode::Valid) {
            dst.update(pair.coupon());
        }
        dst.estimator.set_hip_accum(src.estimator().hip_accum());
        dst
    }

    /// Get the number of zero-valued slots
    pub fn num_zeros(&self) -> u32 {
        self.num_zeros
    }
}

impl RegisterArray for Array8 {
    fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    fn hll_type(&self) -> HllType {
        HllType::Hll8
    }

    fn cur_min(&self) -> u8 {
        0
    }

    fn num_at_cur_min(&self) -> u32 {
        self.num_zeros
    }

    fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }

    fn set_out_of_order(&mut self, out_of_order: bool) {
        self.estimator.set_out_of_order(out_of_order);
    }

    #[inline]
    fn get(&self, slot: u32) -> u8 {
        self.bytes[slot as usize]
    }

    fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.bytes[slot as usize];
        if new_value > old_value {
            self.estimator
                .update(self.lg_config_k, old_value, new_value);
            self.bytes[slot as usize] = new_value;
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    fn register_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
