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

//! HyperLogLog Array6 mode - 6-bit packed representation
//!
//! Array6 stores register values using 6 bits per slot, which covers every
//! coupon value (0-63) without `cur_min` tracking or an exception map.

use crate::hll::HipEstimator;
use crate::hll::HllType;
use crate::hll::IterMode;
use crate::hll::PairIter;
use crate::hll::RegisterArray;
use crate::hll::check_lg_config_k;
use crate::hll::get_slot;
use crate::hll::get_value;

const VAL_MASK_6: u16 = 0x3F; // 6 bits: 0b0011_1111

/// Core Array6 data structure - stores 6-bit values with cross-byte packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array6 {
    lg_config_k: u8,
    /// Packed 6-bit values, may cross byte boundaries
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    estimator: HipEstimator,
}

impl Array6 {
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
            bytes: vec![0u8; num_bytes(lg_config_k)].into_boxed_slice(),
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
        debug_assert_eq!(bytes.len(), num_bytes(lg_config_k));
        Self {
            lg_config_k,
            bytes,
            num_zeros,
            estimator,
        }
    }

    /// Builds an Array6 holding the same register values as `src`.
    ///
    /// The HIP accumulator and out-of-order flag are copied, the KxQ registers
    /// are recomputed.
    pub fn convert_from(src: &dyn RegisterArray) -> Self {
        let mut dst = Array6::new(src.lg_config_k());
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

    /// Get value from a slot (6-bit value)
    ///
    /// Uses 16-bit window reads to handle values crossing byte boundaries.
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 7) as u8;

        let two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        ((two_bytes >> shift) & VAL_MASK_6) as u8
    }

    /// Set value in a slot (6-bit value)
    ///
    /// Uses read-modify-write on 16-bit window to preserve surrounding bits.
    #[inline]
    fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= 63, "6-bit value must be 0-63");

        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 0x7) as u8;

        let mut two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        two_bytes &= !(VAL_MASK_6 << shift);
        two_bytes |= ((value as u16) & VAL_MASK_6) << shift;

        let [lo, hi] = two_bytes.to_le_bytes();
        self.bytes[byte_idx] = lo;
        self.bytes[byte_idx + 1] = hi;
    }
}

impl RegisterArray for Array6 {
    fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    fn hll_type(&self) -> HllType {
        HllType::Hll6
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

    fn get(&self, slot: u32) -> u8 {
        assert!(slot < self.num_registers(), "slot {slot} out of range");
        self.get_raw(slot)
    }

    fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get_raw(slot);
        if new_value > old_value {
            self.estimator
                .update(self.lg_config_k, old_value, new_value);
            self.put_raw(slot, new_value);
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    fn register_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// `k * 6 / 8` bytes plus one so the last 16-bit window stays in bounds.
pub(crate) fn num_bytes(lg_config_k: u8) -> usize {
    let k = 1usize << lg_config_k;
    ((k * 3) >> 2) + 1
}
