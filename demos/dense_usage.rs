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

use datasketches_hll::common::NumStdDev;
use datasketches_hll::hll::DenseArray;
use datasketches_hll::hll::HllType;
use datasketches_hll::hll::RegisterArray;
use datasketches_hll::hll::pack_coupon;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn main() {
    const LG_K: u8 = 12;

    let mut rng = StdRng::seed_from_u64(2024);
    let mut coupons = || {
        let slot = rng.next_u32() & ((1 << LG_K) - 1);
        let value = rng.next_u64().leading_zeros().min(62) as u8 + 1;
        pack_coupon(slot, value)
    };

    let mut array = DenseArray::new(LG_K, HllType::Hll4);
    println!("Adding 100,000 distinct coupons to a 4-bit array...");
    for _ in 0..100_000 {
        array.update(coupons());
    }

    let estimate = array.estimate();
    let actual = 100_000;
    let error = ((estimate - actual as f64) / actual as f64 * 100.0).abs();
    println!("Actual unique values: {}", actual);
    println!("Estimated unique values: {:.2}", estimate);
    println!("Relative error: {:.2}%", error);
    println!(
        "95% interval: [{:.2}, {:.2}]",
        array.lower_bound(NumStdDev::Two),
        array.upper_bound(NumStdDev::Two)
    );

    let inner = array.as_array();
    println!(
        "cur_min: {}, at cur_min: {}, exceptions: {}",
        inner.cur_min(),
        inner.num_at_cur_min(),
        inner.aux_map().map_or(0, |aux| aux.count())
    );

    println!("\nSerializing...");
    let compact = array.serialize_compact();
    let updatable = array.serialize_updatable();
    println!("Compact size: {} bytes", compact.len());
    println!("Updatable size: {} bytes", updatable.len());

    let restored = DenseArray::deserialize(&compact).unwrap();
    println!("Estimate after deserialization: {:.2}", restored.estimate());

    println!("\nConverting to 8-bit registers...");
    let wide = restored.convert(HllType::Hll8);
    println!("Estimate after conversion: {:.2}", wide.estimate());
    println!("Serialized size: {} bytes", wide.serialize_compact().len());
}
