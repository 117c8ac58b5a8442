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

//! Dense HyperLogLog register arrays.
//!
//! Three packings of the same `2^lg_config_k` registers are supported,
//! trading memory for simplicity:
//!
//! - [`HllType::Hll4`]: 4 bits per register relative to a running minimum,
//!   with an exception map ([`AuxMap`]) for registers that overflow the nibble
//! - [`HllType::Hll6`]: 6 bits per register
//! - [`HllType::Hll8`]: 8 bits per register
//!
//! All three implement [`RegisterArray`], share the [`HipEstimator`] and the
//! same serialized layout, and can be converted into one another through
//! [`DenseArray::convert`].
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a value (6 bits).
//! The slot identifies which register to update, and the value is the number of
//! leading zeros in the item's hash plus one. Hashing is the caller's concern;
//! see [`pack_coupon`].

mod array;
mod array4;
mod array6;
mod array8;
mod aux_map;
mod composite_interpolation;
mod cubic_interpolation;
mod dense;
mod estimator;
mod harmonic_numbers;
mod pair;
mod relative_error;
mod serialization;

pub use self::array::RegisterArray;
pub use self::array4::Array4;
pub use self::array6::Array6;
pub use self::array8::Array8;
pub use self::aux_map::AuxMap;
pub use self::aux_map::AuxMapViolation;
pub use self::dense::DenseArray;
pub use self::estimator::HipEstimator;
pub use self::pair::IterMode;
pub use self::pair::Pair;
pub use self::pair::PairIter;

/// Smallest supported `lg_config_k`.
pub const MIN_LG_K: u8 = 4;
/// Largest supported `lg_config_k`.
pub const MAX_LG_K: u8 = 21;

/// Register packing of a dense array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HllType {
    /// 4 bits per register plus an exception map.
    Hll4 = 0,
    /// 6 bits per register.
    Hll6 = 1,
    /// 8 bits per register.
    Hll8 = 2,
}

impl HllType {
    pub(crate) fn from_tag(tag: u8) -> Option<HllType> {
        match tag {
            0 => Some(HllType::Hll4),
            1 => Some(HllType::Hll6),
            2 => Some(HllType::Hll8),
            _ => None,
        }
    }
}

/// Nibble value marking a register whose true value lives in the [`AuxMap`].
pub const AUX_TOKEN: u8 = 15;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

// grow the exception map at 3/4 = 75% load factor
const RESIZE_NUMER: u32 = 3;
const RESIZE_DENOM: u32 = 4;

/// Initial log2 size of the exception map, indexed by `lg_config_k`.
const LG_AUX_ARR_INTS: [u8; 27] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, // 0-9
    4, 4, 5, 5, 6, 7, 8, 9, 10, 11, // 10-19
    12, 13, 14, 15, 16, 17, 18, // 20-26
];

/// Extract slot number (low 26 bits) from coupon
#[inline]
pub fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
pub fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
pub fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

#[track_caller]
fn check_lg_config_k(lg_config_k: u8) {
    assert!(
        (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
        "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
    );
}
