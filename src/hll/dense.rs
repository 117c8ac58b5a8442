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

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::Array4;
use crate::hll::Array6;
use crate::hll::Array8;
use crate::hll::HllType;
use crate::hll::IterMode;
use crate::hll::PairIter;
use crate::hll::RegisterArray;
use crate::hll::serialization;

/// A dense register array of any packing.
///
/// This is the owned handle most callers work with: it dispatches to the
/// concrete [`Array4`], [`Array6`] or [`Array8`] and carries the
/// serialization entry points.
///
/// # Examples
///
/// ```
/// # use datasketches_hll::hll::{DenseArray, HllType, RegisterArray, pack_coupon};
/// let mut array = DenseArray::new(12, HllType::Hll8);
/// array.update(pack_coupon(7, 3));
/// let array = array.convert(HllType::Hll4);
/// assert_eq!(array.hll_type(), HllType::Hll4);
/// assert_eq!(array.as_array().get(7), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DenseArray {
    Array4(Array4),
    Array6(Array6),
    Array8(Array8),
}

impl DenseArray {
    /// Creates an empty array of `2^lg_config_k` registers.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in `[4, 21]`.
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        match hll_type {
            HllType::Hll4 => DenseArray::Array4(Array4::new(lg_config_k)),
            HllType::Hll6 => DenseArray::Array6(Array6::new(lg_config_k)),
            HllType::Hll8 => DenseArray::Array8(Array8::new(lg_config_k)),
        }
    }

    pub fn hll_type(&self) -> HllType {
        self.as_array().hll_type()
    }

    pub fn lg_config_k(&self) -> u8 {
        self.as_array().lg_config_k()
    }

    pub fn as_array(&self) -> &dyn RegisterArray {
        match self {
            DenseArray::Array4(a) => a,
            DenseArray::Array6(a) => a,
            DenseArray::Array8(a) => a,
        }
    }

    pub fn as_array_mut(&mut self) -> &mut dyn RegisterArray {
        match self {
            DenseArray::Array4(a) => a,
            DenseArray::Array6(a) => a,
            DenseArray::Array8(a) => a,
        }
    }

    /// Raises the register addressed by `coupon` to its value, if larger.
    pub fn update(&mut self, coupon: u32) {
        self.as_array_mut().update(coupon);
    }

    pub fn is_empty(&self) -> bool {
        self.as_array().is_empty()
    }

    pub fn is_out_of_order(&self) -> bool {
        self.as_array().is_out_of_order()
    }

    /// Marks the HIP accumulator as no longer valid, for example after a merge.
    pub fn set_out_of_order(&mut self, out_of_order: bool) {
        self.as_array_mut().set_out_of_order(out_of_order);
    }

    pub fn estimate(&self) -> f64 {
        self.as_array().estimate()
    }

    pub fn composite_estimate(&self) -> f64 {
        self.as_array().composite_estimate()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.as_array().lower_bound(num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.as_array().upper_bound(num_std_dev)
    }

    /// Walks the registers in slot order.
    pub fn iter(&self, mode: IterMode) -> PairIter<'_> {
        PairIter::new(self.as_array(), mode)
    }

    /// Serializes with exceptions written one coupon each.
    pub fn serialize_compact(&self) -> Vec<u8> {
        serialization::serialize(self.as_array(), true)
    }

    /// Serializes with the exception table written as stored.
    pub fn serialize_updatable(&self) -> Vec<u8> {
        serialization::serialize(self.as_array(), false)
    }

    /// Reads either serialized form.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if the bytes are truncated or do not describe a consistent dense array.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        serialization::deserialize(bytes)
    }

    /// Re-encodes the registers with another packing.
    ///
    /// The HIP accumulator and out-of-order flag carry over. Converting to the
    /// current packing returns a copy.
    pub fn convert(&self, hll_type: HllType) -> Self {
        if hll_type == self.hll_type() {
            return self.clone();
        }
        let src = self.as_array();
        match hll_type {
            HllType::Hll4 => DenseArray::Array4(Array4::convert_from(src)),
            HllType::Hll6 => DenseArray::Array6(Array6::convert_from(src)),
            HllType::Hll8 => DenseArray::Array8(Array8::convert_from(src)),
        }
    }
}

impl From<Array4> for DenseArray {
    fn from(array: Array4) -> Self {
        DenseArray::Array4(array)
    }
}

impl From<Array6> for DenseArray {
    fn from(array: Array6) -> Self {
        DenseArray::Array6(array)
    }
}

impl From<Array8> for DenseArray {
    fn from(array: Array8) -> Self {
        DenseArray::Array8(array)
    }
}
