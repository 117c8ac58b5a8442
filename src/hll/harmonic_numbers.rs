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

//! Harmonic numbers and the bitmap (linear counting) estimator built on them.

const NUM_EXACT: u32 = 25;
const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// `H(n) = 1 + 1/2 + ... + 1/n`.
///
/// Small `n` is summed directly; larger `n` uses the asymptotic expansion
/// `ln(n) + gamma + 1/(2n) - 1/(12n^2) + 1/(120n^4) - 1/(252n^6) + 1/(240n^8)`.
fn harmonic_number(n: u32) -> f64 {
    if n < NUM_EXACT {
        return (1..=n).map(|i| 1.0 / i as f64).sum();
    }

    let x = n as f64;
    let inv_sq = 1.0 / (x * x);
    let mut sum = x.ln() + EULER_MASCHERONI + 1.0 / (2.0 * x);
    let mut pow = inv_sq;
    sum -= pow / 12.0;
    pow *= inv_sq;
    sum += pow / 120.0;
    pow *= inv_sq;
    sum -= pow / 252.0;
    pow *= inv_sq;
    sum += pow / 240.0;
    sum
}

/// Coupon-collector estimate for a bit vector of `bit_vector_length` bits with
/// `num_bits_set` of them set: `k * (H(k) - H(k - set))`.
pub(crate) fn bitmap_estimate(bit_vector_length: u32, num_bits_set: u32) -> f64 {
    debug_assert!(num_bits_set <= bit_vector_length);
    let k = bit_vector_length;
    let h_k = harmonic_number(k);
    let h_unset = harmonic_number(k - num_bits_set);
    k as f64 * (h_k - h_unset)
}
