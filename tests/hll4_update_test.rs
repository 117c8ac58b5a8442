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

mod common;

use common::CouponStream;
use datasketches_hll::common::NumStdDev;
use datasketches_hll::hll::Array4;
use datasketches_hll::hll::IterMode;
use datasketches_hll::hll::RegisterArray;
use datasketches_hll::hll::get_slot;
use datasketches_hll::hll::get_value;
use datasketches_hll::hll::pack_coupon;
use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;

fn assert_exceptions_match_sentinels(array: &Array4) {
    let aux_slots: Vec<u32> = match array.aux_map() {
        Some(aux) => {
            assert!(!aux.is_empty(), "present aux map must not be empty");
            let mut slots: Vec<u32> = aux.iter().map(|p| p.slot()).collect();
            slots.sort_unstable();
            slots
        }
        None => vec![],
    };
    let cur_min = array.cur_min();
    let overflowing: Vec<u32> = array
        .iter(IterMode::All)
        .filter(|p| p.value() >= cur_min + 15)
        .map(|p| p.slot())
        .collect();
    assert_eq!(aux_slots, overflowing);
}

fn count_at(array: &Array4, value: u8) -> u32 {
    array.iter(IterMode::All).filter(|p| p.value() == value).count() as u32
}

#[test]
fn test_staircase_then_overflow() {
    let mut array = Array4::new(4);
    for i in 0..15 {
        array.update(pack_coupon(i, i as u8 + 1));
    }
    array.update(pack_coupon(15, 16));

    assert_eq!(array.cur_min(), 1);
    assert_eq!(array.num_at_cur_min(), 1);
    assert_eq!(array.get(0), 1);
    assert_eq!(array.get(14), 15);
    assert_eq!(array.get(15), 16);

    let aux = array.aux_map().unwrap();
    assert_eq!(aux.count(), 1);
    assert_eq!(aux.find(15), Some(16));
    assert_exceptions_match_sentinels(&array);
}

#[test]
fn test_single_slot_climb() {
    let mut array = Array4::new(8);
    for value in 1..=20u8 {
        array.update(pack_coupon(42, value));
        assert_eq!(array.get(42), value);
        match array.aux_map() {
            Some(aux) => {
                assert!(value >= 15);
                assert_eq!(aux.count(), 1);
                assert_eq!(aux.find(42), Some(value));
            }
            None => assert!(value < 15),
        }
    }
    assert_eq!(array.cur_min(), 0);
}

#[test]
fn test_updates_are_monotone() {
    const LG_K: u8 = 6;
    let mut array = Array4::new(LG_K);
    let mut expected = vec![0u8; 1 << LG_K];

    for coupon in CouponStream::new(LG_K, 7).take(5000) {
        let before = array.get(get_slot(coupon));
        array.update(coupon);

        let slot = get_slot(coupon) as usize;
        expected[slot] = expected[slot].max(get_value(coupon));
        assert!(array.get(get_slot(coupon)) >= before);
    }

    let actual: Vec<u8> = array.iter(IterMode::All).map(|p| p.value()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_duplicate_and_smaller_values_are_ignored() {
    let mut array = Array4::new(10);
    array.update(pack_coupon(5, 9));
    let snapshot = array.clone();

    array.update(pack_coupon(5, 9));
    array.update(pack_coupon(5, 3));
    array.update(pack_coupon(5, 0));
    assert_eq!(array, snapshot);
}

#[test]
fn test_invariants_hold_along_random_stream() {
    const LG_K: u8 = 5;
    let mut array = Array4::new(LG_K);
    let mut last_cur_min = 0;

    // skewed values force the array through many rebases and exceptions
    let stream = CouponStream::new(LG_K, 11)
        .enumerate()
        .map(|(i, c)| pack_coupon(get_slot(c), (get_value(c) + (i / 64) as u8).min(63)))
        .take(3000);

    for coupon in stream {
        array.update(coupon);

        let cur_min = array.cur_min();
        assert!(cur_min >= last_cur_min);
        last_cur_min = cur_min;

        assert!(array.num_at_cur_min() > 0);
        assert_eq!(array.num_at_cur_min(), count_at(&array, cur_min));
        assert!(array.iter(IterMode::All).all(|p| p.value() >= cur_min));
        assert_exceptions_match_sentinels(&array);
    }
    assert!(last_cur_min > 0);
}

#[test]
fn test_hip_estimate_accuracy() {
    const LG_K: u8 = 12;
    const N: usize = 20000;
    const N_F64: f64 = N as f64;

    let mut array = Array4::new(LG_K);
    for coupon in CouponStream::new(LG_K, 1).take(N) {
        array.update(coupon);
    }

    assert_that!(array.estimate(), near(N_F64, 0.1 * N_F64));
    assert_that!(array.composite_estimate(), near(N_F64, 0.15 * N_F64));
    assert_that!(array.estimate(), ge(array.lower_bound(NumStdDev::Two)));
    assert_that!(array.estimate(), le(array.upper_bound(NumStdDev::Two)));
    assert_that!(
        array.lower_bound(NumStdDev::Three),
        le(array.lower_bound(NumStdDev::One))
    );
}

#[test]
fn test_large_lg_k_bounds() {
    const LG_K: u8 = 14;

    let mut array = Array4::new(LG_K);
    for coupon in CouponStream::new(LG_K, 3).take(1000) {
        array.update(coupon);
    }

    let hit = (1u32 << LG_K) - array.num_at_cur_min();
    assert_that!(array.lower_bound(NumStdDev::One), ge(hit as f64));
    assert_that!(array.upper_bound(NumStdDev::One), ge(array.estimate()));
    assert_that!(
        array.upper_bound(NumStdDev::Three),
        ge(array.upper_bound(NumStdDev::One))
    );
}

#[test]
fn test_empty() {
    let array = Array4::new(11);
    assert!(array.is_empty());
    assert_eq!(array.estimate(), 0.0);
    assert_eq!(array.composite_estimate(), 0.0);
    assert_eq!(array.lower_bound(NumStdDev::One), 0.0);
    assert_eq!(array.upper_bound(NumStdDev::One), 0.0);
}

#[test]
fn test_out_of_order_switches_to_composite() {
    let mut array = Array4::new(10);
    for coupon in CouponStream::new(10, 5).take(3000) {
        array.update(coupon);
    }
    let hip = array.estimate();

    array.set_out_of_order(true);
    assert_eq!(array.estimate(), array.composite_estimate());
    assert_eq!(array.estimator().hip_accum(), hip);

    array.set_out_of_order(false);
    assert_eq!(array.estimate(), hip);
}

#[test]
fn test_hip_accumulates_while_out_of_order() {
    let mut array = Array4::new(4);
    array.set_out_of_order(true);
    array.update(pack_coupon(3, 5));
    assert_eq!(array.estimator().hip_accum(), 1.0);
    assert_eq!(array.estimate(), array.composite_estimate());

    array.set_out_of_order(false);
    assert_eq!(array.estimate(), 1.0);
}

#[test]
fn test_out_of_order_flag_does_not_change_hip() {
    let mut in_order = Array4::new(9);
    let mut flagged = Array4::new(9);
    flagged.set_out_of_order(true);
    for coupon in CouponStream::new(9, 17).take(4000) {
        in_order.update(coupon);
        flagged.update(coupon);
    }
    assert_eq!(
        flagged.estimator().hip_accum().to_bits(),
        in_order.estimator().hip_accum().to_bits()
    );
    assert_that!(flagged.estimator().hip_accum(), near(4000.0, 600.0));
}

#[test]
#[should_panic(expected = "lg_config_k must be in [4, 21]")]
fn test_lg_config_k_too_large() {
    Array4::new(22);
}
