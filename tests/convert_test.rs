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
use datasketches_hll::hll::Array4;
use datasketches_hll::hll::Array6;
use datasketches_hll::hll::Array8;
use datasketches_hll::hll::DenseArray;
use datasketches_hll::hll::HllType;
use datasketches_hll::hll::IterMode;
use datasketches_hll::hll::RegisterArray;
use datasketches_hll::hll::pack_coupon;

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

fn values(array: &DenseArray) -> Vec<u8> {
    array.iter(IterMode::All).map(|p| p.value()).collect()
}

#[test]
fn test_convert_every_pair_of_types() {
    for src_type in ALL_TYPES {
        let mut src = DenseArray::new(10, src_type);
        for coupon in CouponStream::new(10, 21).take(8000) {
            src.update(coupon);
        }
        let expected = values(&src);

        for dst_type in ALL_TYPES {
            let dst = src.convert(dst_type);
            assert_eq!(dst.hll_type(), dst_type);
            assert_eq!(values(&dst), expected, "{src_type:?} -> {dst_type:?}");
            assert_eq!(
                dst.as_array().estimator().hip_accum(),
                src.as_array().estimator().hip_accum()
            );
            assert_eq!(dst.estimate(), src.estimate());
        }
    }
}

#[test]
fn test_convert_to_self_keeps_kxq() {
    let mut src = Array4::new(8);
    for coupon in CouponStream::new(8, 4).take(3000) {
        src.update(coupon);
    }
    let copy = Array4::convert_from(&src);
    assert_eq!(copy.cur_min(), src.cur_min());
    assert_eq!(copy.num_at_cur_min(), src.num_at_cur_min());
    assert_eq!(copy.estimator().kxq0(), src.estimator().kxq0());
    assert_eq!(copy.estimator().kxq1(), src.estimator().kxq1());
    assert_eq!(copy.aux_map(), src.aux_map());
}

#[test]
fn test_convert_rebuilds_exceptions() {
    let mut src = Array8::new(5);
    for slot in 0..32 {
        src.update(pack_coupon(slot, 5 + (slot % 3) as u8));
    }
    src.update(pack_coupon(7, 25));
    src.update(pack_coupon(8, 19));

    let dst = Array4::convert_from(&src);
    assert_eq!(dst.cur_min(), 5);
    assert_eq!(dst.num_at_cur_min(), 11);

    // 19 sits at offset 14, 25 overflows
    let aux = dst.aux_map().unwrap();
    assert_eq!(aux.count(), 1);
    assert_eq!(aux.find(7), Some(25));
    assert_eq!(dst.get(8), 19);

    let back = Array8::convert_from(&dst);
    assert_eq!(back.register_bytes(), src.register_bytes());
}

#[test]
fn test_convert_keeps_out_of_order() {
    let mut src = Array6::new(7);
    for coupon in CouponStream::new(7, 13).take(500) {
        src.update(coupon);
    }
    src.set_out_of_order(true);

    for dst_type in ALL_TYPES {
        let dst = DenseArray::from(src.clone()).convert(dst_type);
        assert!(dst.is_out_of_order());
        assert_eq!(dst.estimate(), dst.composite_estimate());
    }
}

#[test]
fn test_convert_empty() {
    for src_type in ALL_TYPES {
        for dst_type in ALL_TYPES {
            let dst = DenseArray::new(9, src_type).convert(dst_type);
            assert!(dst.is_empty());
            assert_eq!(dst.estimate(), 0.0);
        }
    }
}
