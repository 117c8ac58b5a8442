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

//! `(slot, value)` pairs and the iterator that walks a register array.

use crate::hll::RegisterArray;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;

/// One register: its slot index and decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    slot: u32,
    value: u8,
}

impl Pair {
    pub fn new(slot: u32, value: u8) -> Self {
        Self { slot, value }
    }

    /// Unpacks a coupon.
    pub fn from_coupon(coupon: u32) -> Self {
        Self {
            slot: get_slot(coupon),
            value: get_value(coupon),
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// The pair packed as a coupon, `value << 26 | slot`.
    pub fn coupon(&self) -> u32 {
        pack_coupon(self.slot, self.value)
    }
}

/// Which registers a [`PairIter`] yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterMode {
    /// Every register in slot order, including zero-valued ones.
    All,
    /// Only registers with a non-zero value, in slot order.
    Valid,
}

/// Lazy, restartable walk over the registers of any [`RegisterArray`].
///
/// # Examples
///
/// ```
/// # use datasketches_hll::hll::{Array8, IterMode, PairIter, RegisterArray, pack_coupon};
/// let mut array = Array8::new(4);
/// array.update(pack_coupon(3, 7));
/// array.update(pack_coupon(9, 2));
///
/// let valid: Vec<_> = PairIter::new(&array, IterMode::Valid)
///     .map(|p| (p.slot(), p.value()))
///     .collect();
/// assert_eq!(valid, vec![(3, 7), (9, 2)]);
/// assert_eq!(PairIter::new(&array, IterMode::All).count(), 16);
/// ```
pub struct PairIter<'a> {
    array: &'a dyn RegisterArray,
    mode: IterMode,
    next_slot: u32,
    num_slots: u32,
}

impl<'a> PairIter<'a> {
    pub fn new(array: &'a dyn RegisterArray, mode: IterMode) -> Self {
        Self {
            array,
            mode,
            next_slot: 0,
            num_slots: array.num_registers(),
        }
    }

    /// Restarts the walk from slot 0.
    pub fn rewind(&mut self) {
        self.next_slot = 0;
    }
}

impl Iterator for PairIter<'_> {
    type Item = Pair;

    fn next(&mut self) -> Option<Pair> {
        while self.next_slot < self.num_slots {
            let slot = self.next_slot;
            self.next_slot += 1;
            let value = self.array.get(slot);
            if self.mode == IterMode::All || value != 0 {
                return Some(Pair::new(slot, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.num_slots - self.next_slot) as usize;
        match self.mode {
            IterMode::All => (left, Some(left)),
            IterMode::Valid => (0, Some(left)),
        }
    }
}
