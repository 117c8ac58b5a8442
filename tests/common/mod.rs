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

use datasketches_hll::hll::pack_coupon;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Deterministic stream of coupons as a hashed input would produce them.
///
/// The slot is uniform over the `2^lg_config_k` registers and the value is the
/// number of leading zeros of a uniform 64-bit word plus one, capped at 63.
pub struct CouponStream {
    rng: StdRng,
    slot_mask: u32,
}

impl CouponStream {
    pub fn new(lg_config_k: u8, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            slot_mask: (1 << lg_config_k) - 1,
        }
    }
}

impl Iterator for CouponStream {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let slot = self.rng.next_u32() & self.slot_mask;
        let value = self.rng.next_u64().leading_zeros().min(62) as u8 + 1;
        Some(pack_coupon(slot, value))
    }
}
