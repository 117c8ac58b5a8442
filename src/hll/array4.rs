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

//! HyperLogLog Array4 mode - 4-bit packed representation with exception handling
//!
//! Array4 stores every register as a nibble relative to `cur_min`, two slots per
//! byte (low nibble = even slot, high nibble = odd slot). A register whose value
//! reaches `cur_min + 15` no longer fits: its nibble becomes [`AUX_TOKEN`] and
//! the true value moves to the [`AuxMap`]. When no register is left at
//! `cur_min`, the whole array is rebased one step up, which pulls exceptions
//! back into the nibbles as they come within range.

use crate::hll::AUX_TOKEN;
use crate::hll::AuxMap;
use crate::hll::HipEstimator;
use crate::hll::HllType;
use crate::hll::IterMode;
use crate::hll::PairIter;
use crate::hll::RegisterArray;
use crate::hll::check_lg_config_k;
use crate::hll::get_slot;
use crate::hll::get_value;

/// Decoded content of one nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nibble {
    /// Register value is `cur_min + offset`, with `offset` in `0..15`.
    Direct(u8),
    /// Register value is held by the exception map.
    Overflow,
}

impl Nibble {
    #[inline]
    fn from_raw(raw: u8) -> Self {
        debug_assert!(raw <= AUX_TOKEN);
        if raw == AUX_TOKEN {
            Nibble::Overflow
        } else {
            Nibble::Direct(raw)
        }
    }

    #[inline]
    fn raw(self) -> u8 {
        match self {
            Nibble::Direct(offset) => offset,
            Nibble::Overflow => AUX_TOKEN,
        }
    }
}

/// Core Array4 data structure - 4-bit packed registers plus exception map
#[derive(Debug, Clone, PartialEq)]
pub struct Array4 {
    lg_config_k: u8,
    /// Packed 4-bit offsets, 2 per byte
    bytes: Box<[u8]>,
    /// Every register value is >= cur_min
    cur_min: u8,
    /// Count of slots at exactly cur_min (when 0, cur_min advances)
    num_at_cur_min: u32,
    /// True values of the slots holding AUX_TOKEN; never empty when present
    aux_map: Option<AuxMap>,
    estimator: HipEstimator,
}

impl Array4 {
    /// Creates an empty array of `2^lg_config_k` registers.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in `[4, 21]`.
    pub fn new(lg_config_k: u8) -> Self {
        check_lg_config_k(lg_config_k);
        Self {
            lg_config_k,
            bytes: vec![0u8; num_bytes(lg_config_k)].into_boxed_slice(),
            cur_min: 0,
            num_at_cur_min: 1 << lg_config_k,
            aux_map: None,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Assembles an array from already validated serialized state.
    pub(crate) fn from_parts(
        lg_config_k: u8,
        bytes: Box<[u8]>,
        cur_min: u8,
        num_at_cur_min: u32,
        aux_map: Option<AuxMap>,
        estimator: HipEstimator,
    ) -> Self {
        debug_assert_eq!(bytes.len(), num_bytes(lg_config_k));
        debug_assert!(aux_map.as_ref().is_none_or(|aux| !aux.is_empty()));
        Self {
            lg_config_k,
            bytes,
            cur_min,
            num_at_cur_min,
            aux_map,
            estimator,
        }
    }

    /// Builds an Array4 holding the same register values as `src`.
    ///
    /// `cur_min` is the smallest value found in `src`; the HIP accumulator and
    /// the out-of-order flag are copied, the KxQ registers are recomputed.
    pub fn convert_from(src: &dyn RegisterArray) -> Self {
        let lg_config_k = src.lg_config_k();
        let mut dst = Array4::new(lg_config_k);
        dst.estimator.set_out_of_order(src.is_out_of_order());

        let (cur_min, num_at_cur_min) = cur_min_and_num(src);

        for pair in PairIter::new(src, IterMode::Valid) {
            let (slot, value) = (pair.slot(), pair.value());
            dst.estimator.update(lg_config_k, 0, value);
            if value >= cur_min + AUX_TOKEN {
                dst.put_nibble(slot, Nibble::Overflow);
                dst.aux_map
                    .get_or_insert_with(|| AuxMap::new(lg_config_k))
                    .must_add(slot, value);
            } else {
                dst.put_nibble(slot, Nibble::Direct(value - cur_min));
            }
        }

        dst.cur_min = cur_min;
        dst.num_at_cur_min = num_at_cur_min;
        dst.estimator.set_hip_accum(src.estimator().hip_accum());
        dst
    }

    /// Get raw 4-bit value from slot (not adjusted for cur_min)
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        let byte = self.bytes[(slot >> 1) as usize];
        if slot & 1 == 0 {
            byte & 15 // low nibble for even slots
        } else {
            byte >> 4 // high nibble for odd slots
        }
    }

    /// Set raw 4-bit value in slot
    #[inline]
    fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= AUX_TOKEN);

        let byte_idx = (slot >> 1) as usize;
        let old_byte = self.bytes[byte_idx];
        self.bytes[byte_idx] = if slot & 1 == 0 {
            (old_byte & 0xF0) | (value & 0x0F) // set low nibble
        } else {
            (old_byte & 0x0F) | (value << 4) // set high nibble
        };
    }

    #[inline]
    fn nibble(&self, slot: u32) -> Nibble {
        Nibble::from_raw(self.get_raw(slot))
    }

    #[inline]
    fn put_nibble(&mut self, slot: u32, nibble: Nibble) {
        self.put_raw(slot, nibble.raw());
    }

    /// True value of a slot whose nibble is AUX_TOKEN.
    fn aux_value(&self, slot: u32) -> u8 {
        match &self.aux_map {
            Some(aux) => aux.must_find(slot),
            None => panic!("AUX_TOKEN at slot {slot} but no aux map"),
        }
    }

    /// Raises `cur_min` by one and re-encodes every register against it.
    ///
    /// Only called while no register is at `cur_min`, so every direct nibble
    /// is at least 1.
    fn shift_to_bigger_cur_min(&mut self) {
        let new_cur_min = self.cur_min + 1;
        let mut num_at_new = 0;
        let mut num_aux_tokens = 0;

        for slot in 0..self.num_registers() {
            match self.nibble(slot) {
                Nibble::Overflow => num_aux_tokens += 1,
                Nibble::Direct(0) => panic!(
                    "slot {slot} at cur_min {} while num_at_cur_min is 0",
                    self.cur_min
                ),
                Nibble::Direct(offset) => {
                    let decremented = offset - 1;
                    self.put_nibble(slot, Nibble::Direct(decremented));
                    if decremented == 0 {
                        num_at_new += 1;
                    }
                }
            }
        }

        // exceptions that drop to offset 14 move back into the nibbles
        let mut new_aux = None;
        if let Some(old_aux) = self.aux_map.take() {
            debug_assert_eq!(old_aux.count(), num_aux_tokens);
            for pair in old_aux.iter() {
                let (slot, value) = (pair.slot(), pair.value());
                debug_assert_eq!(self.nibble(slot), Nibble::Overflow);

                let new_shifted = value - new_cur_min;
                if new_shifted < AUX_TOKEN {
                    debug_assert_eq!(new_shifted, AUX_TOKEN - 1);
                    self.put_nibble(slot, Nibble::Direct(new_shifted));
                } else {
                    new_aux
                        .get_or_insert_with(|| AuxMap::new(self.lg_config_k))
                        .must_add(slot, value);
                }
            }
        } else {
            debug_assert_eq!(num_aux_tokens, 0);
        }

        self.aux_map = new_aux;
        self.cur_min = new_cur_min;
        self.num_at_cur_min = num_at_new;
    }
}

impl RegisterArray for Array4 {
    fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    fn hll_type(&self) -> HllType {
        HllType::Hll4
    }

    fn cur_min(&self) -> u8 {
        self.cur_min
    }

    fn num_at_cur_min(&self) -> u32 {
        self.num_at_cur_min
    }

    fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }

    fn set_out_of_order(&mut self, out_of_order: bool) {
        self.estimator.set_out_of_order(out_of_order);
    }

    fn get(&self, slot: u32) -> u8 {
        match self.nibble(slot) {
            Nibble::Direct(offset) => self.cur_min + offset,
            Nibble::Overflow => self.aux_value(slot),
        }
    }

    fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        // registers never go below cur_min
        if new_value <= self.cur_min {
            return;
        }

        let nibble = self.nibble(slot);
        let lower_bound = nibble.raw() + self.cur_min;
        if new_value <= lower_bound {
            return;
        }

        let old_value = match nibble {
            Nibble::Direct(offset) => offset + self.cur_min,
            Nibble::Overflow => self.aux_value(slot),
        };
        if new_value <= old_value {
            return;
        }

        self.estimator
            .update(self.lg_config_k, old_value, new_value);

        let shifted_new = new_value - self.cur_min;
        match (nibble, shifted_new >= AUX_TOKEN) {
            // Case 1: both old and new are exceptions
            (Nibble::Overflow, true) => match self.aux_map.as_mut() {
                Some(aux) => aux.must_replace(slot, new_value),
                None => panic!("AUX_TOKEN at slot {slot} but no aux map"),
            },
            // Case 2: cur_min cannot have moved since the checks above
            (Nibble::Overflow, false) => {
                unreachable!("AUX_TOKEN at slot {slot} with non-exception new value {new_value}")
            }
            // Case 3: old not exception, new is exception
            (Nibble::Direct(_), true) => {
                self.put_nibble(slot, Nibble::Overflow);
                let lg_config_k = self.lg_config_k;
                self.aux_map
                    .get_or_insert_with(|| AuxMap::new(lg_config_k))
                    .must_add(slot, new_value);
            }
            // Case 4: neither is exception
            (Nibble::Direct(_), false) => {
                self.put_nibble(slot, Nibble::Direct(shifted_new));
            }
        }

        if old_value == self.cur_min {
            self.num_at_cur_min -= 1;
            while self.num_at_cur_min == 0 {
                self.shift_to_bigger_cur_min();
            }
        }
    }

    fn register_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn aux_map(&self) -> Option<&AuxMap> {
        self.aux_map.as_ref()
    }
}

/// k/2 bytes for 4-bit packing
pub(crate) fn num_bytes(lg_config_k: u8) -> usize {
    1 << (lg_config_k - 1)
}

/// Smallest register value of `src` and the number of registers holding it.
fn cur_min_and_num(src: &dyn RegisterArray) -> (u8, u32) {
    let mut histogram = [0u32; 64];
    for pair in PairIter::new(src, IterMode::All) {
        histogram[pair.value() as usize] += 1;
    }
    histogram
        .iter()
        .enumerate()
        .find(|(_, count)| **count > 0)
        .map(|(value, count)| (value as u8, *count))
        .unwrap_or((0, src.num_registers()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::Array8;
    use crate::hll::pack_coupon;

    fn assert_aux_consistent(arr: &Array4) {
        let tokens: Vec<u32> = (0..arr.num_registers())
            .filter(|&slot| arr.get_raw(slot) == AUX_TOKEN)
            .collect();
        let mut keys: Vec<u32> = arr.aux_map.iter().flat_map(|aux| aux.iter()).map(|p| p.slot()).collect();
        keys.sort_unstable();
        assert_eq!(tokens, keys);
        assert!(arr.aux_map.as_ref().is_none_or(|aux| aux.count() > 0));
    }

    fn true_count_at_cur_min(arr: &Array4) -> u32 {
        (0..arr.num_registers())
            .filter(|&slot| arr.get(slot) == arr.cur_min)
            .count() as u32
    }

    #[test]
    fn test_array4_basic() {
        let arr = Array4::new(10);

        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(100), 0);
        assert_eq!(arr.register_bytes().len(), 512);
        assert!(arr.is_empty());
        assert_eq!(arr.num_at_cur_min(), 1024);
    }

    #[test]
    fn test_get_set_raw() {
        let mut data = Array4::new(4);

        data.put_raw(0, 5);
        assert_eq!(data.get_raw(0), 5);

        data.put_raw(1, 7);
        assert_eq!(data.get_raw(1), 7);

        // both values share one byte
        assert_eq!(data.bytes[0], 0x75); // 0111_0101 = 7 << 4 | 5

        data.put_raw(2, 15);
        data.put_raw(3, 3);
        assert_eq!(data.get_raw(2), 15);
        assert_eq!(data.get_raw(3), 3);
        assert_eq!(data.nibble(2), Nibble::Overflow);
        assert_eq!(data.nibble(3), Nibble::Direct(3));
    }

    #[test]
    fn test_nibble_round_trip_every_slot() {
        let mut data = Array4::new(5);
        for value in 0..=AUX_TOKEN {
            for slot in 0..32 {
                data.put_raw(slot, value);
            }
            for slot in 0..32 {
                assert_eq!(data.get_raw(slot), value, "slot {slot}");
            }
        }
        // neighbours are untouched
        data.put_raw(6, 9);
        data.put_raw(7, 2);
        data.put_raw(6, 4);
        assert_eq!(data.get_raw(7), 2);
        assert_eq!(data.get_raw(6), 4);
    }

    #[test]
    fn test_update_basic() {
        let mut data = Array4::new(4);

        data.update(pack_coupon(0, 5));
        assert_eq!(data.get(0), 5);

        // a smaller value is ignored
        data.update(pack_coupon(0, 3));
        assert_eq!(data.get(0), 5);

        data.update(pack_coupon(0, 8));
        assert_eq!(data.get(0), 8);
        assert_eq!(data.num_at_cur_min(), 15);
    }

    #[test]
    fn test_slot_bits_above_k_are_masked() {
        let mut data = Array4::new(4);
        data.update(pack_coupon(16 + 3, 2));
        assert_eq!(data.get(3), 2);
    }

    #[test]
    fn test_kxq_register_split() {
        let mut arr = Array4::new(8);

        arr.update(pack_coupon(0, 10)); // value < 32, goes to kxq0
        arr.update(pack_coupon(1, 40)); // value >= 32, goes to kxq1

        assert_eq!(arr.estimator.kxq0(), 254.0 + 1.0 / 1024.0);
        assert_eq!(arr.estimator.kxq1(), 1.0 / (1u64 << 40) as f64);
        assert_eq!(arr.get(1), 40);
        assert!(arr.aux_map().is_some());
    }

    #[test]
    fn test_rising_staircase_rebases() {
        let mut arr = Array4::new(4);
        for i in 0..15u32 {
            arr.update(pack_coupon(i, i as u8 + 1));
        }
        assert_eq!(arr.cur_min(), 0);
        assert_eq!(arr.num_at_cur_min(), 1);
        // slot 14 holds 15 which does not fit next to cur_min 0
        assert_eq!(arr.aux_map().map(|aux| aux.count()), Some(1));

        arr.update(pack_coupon(15, 16));

        assert_eq!(arr.cur_min(), 1);
        assert_eq!(arr.num_at_cur_min(), 1);
        assert_eq!(arr.get(0), 1);
        assert_eq!(arr.get(14), 15);
        assert_eq!(arr.get_raw(14), 14);
        let aux = arr.aux_map().unwrap();
        assert_eq!(aux.count(), 1);
        assert_eq!(aux.find(15), Some(16));
        assert_eq!(arr.get_raw(15), AUX_TOKEN);
        for i in 0..15u32 {
            assert_eq!(arr.get(i), i as u8 + 1);
        }
        assert_aux_consistent(&arr);
    }

    #[test]
    fn test_single_slot_climbs_into_exception() {
        let mut arr = Array4::new(6);
        for value in 1..=20u8 {
            arr.update(pack_coupon(9, value));
            assert_eq!(arr.get(9), value);
            match arr.aux_map() {
                Some(aux) => {
                    assert!(value >= 15);
                    assert_eq!(aux.count(), 1);
                    assert_eq!(aux.find(9), Some(value));
                }
                None => assert!(value < 15),
            }
        }
        assert_eq!(arr.cur_min(), 0);
        assert_eq!(arr.num_at_cur_min(), 63);
    }

    #[test]
    fn test_rebase_keeps_values() {
        let mut arr = Array4::new(4);
        // every slot at 2 except slot 0 which will climb last
        for slot in 1..16u32 {
            arr.update(pack_coupon(slot, 2 + (slot % 5) as u8 * 4));
        }
        let before: Vec<u8> = (0..16).map(|slot| arr.get(slot)).collect();

        arr.update(pack_coupon(0, 2));

        assert_eq!(arr.cur_min(), 2);
        assert_eq!(arr.num_at_cur_min(), true_count_at_cur_min(&arr));
        for slot in 1..16u32 {
            assert_eq!(arr.get(slot), before[slot as usize]);
        }
        assert_aux_consistent(&arr);
    }

    #[test]
    fn test_multi_step_rebase() {
        let mut arr = Array4::new(4);
        for slot in 1..16u32 {
            arr.update(pack_coupon(slot, 30));
        }
        // slots at 30 are all exceptions against cur_min 0
        assert_eq!(arr.aux_map().map(|aux| aux.count()), Some(15));

        // lifting the last slot to 30 drives cur_min up to 30 in one update
        arr.update(pack_coupon(0, 30));
        assert_eq!(arr.cur_min(), 30);
        assert_eq!(arr.num_at_cur_min(), 16);
        assert!(arr.aux_map().is_none());
        assert!((0..16).all(|slot| arr.get(slot) == 30));
    }

    #[test]
    #[should_panic(expected = "while num_at_cur_min is 0")]
    fn test_rebase_rejects_register_at_cur_min() {
        let mut arr = Array4::new(4);
        arr.shift_to_bigger_cur_min();
    }

    #[test]
    #[should_panic(expected = "but no aux map")]
    fn test_dangling_aux_token() {
        let mut arr = Array4::new(4);
        arr.put_raw(3, AUX_TOKEN);
        arr.get(3);
    }

    #[test]
    fn test_convert_from_array8() {
        let mut src = Array8::new(5);
        for slot in 0..32u32 {
            src.update(pack_coupon(slot, 3 + (slot % 20) as u8));
        }
        src.update(pack_coupon(7, 40));

        let arr = Array4::convert_from(&src);
        assert_eq!(arr.cur_min(), 3);
        assert_eq!(arr.num_at_cur_min(), 2);
        for slot in 0..32u32 {
            assert_eq!(arr.get(slot), src.get(slot));
        }
        // 40 - 3 and 22 - 3 overflow the nibble
        let aux = arr.aux_map().unwrap();
        assert_eq!(aux.find(7), Some(40));
        assert_eq!(aux.find(19), Some(22));
        assert_aux_consistent(&arr);
        assert_eq!(arr.estimator().hip_accum(), src.estimator().hip_accum());
    }

    #[test]
    fn test_convert_from_self_preserves_state() {
        let mut arr = Array4::new(6);
        for i in 0..2000u32 {
            let slot = i.wrapping_mul(2_654_435_761) >> 26;
            let value = 1 + (i.wrapping_mul(40503) % 24) as u8;
            arr.update(pack_coupon(slot, value));
        }
        let copy = Array4::convert_from(&arr);
        assert_eq!(copy.cur_min(), arr.cur_min());
        assert_eq!(copy.num_at_cur_min(), arr.num_at_cur_min());
        assert_eq!(copy.estimator().hip_accum(), arr.estimator().hip_accum());
        for slot in 0..64u32 {
            assert_eq!(copy.get(slot), arr.get(slot));
        }
        let kxq = arr.estimator().kxq0() + arr.estimator().kxq1();
        let copy_kxq = copy.estimator().kxq0() + copy.estimator().kxq1();
        assert!((kxq - copy_kxq).abs() < 1e-9);
    }
}
