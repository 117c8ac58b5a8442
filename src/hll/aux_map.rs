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

//! Exception map for the 4-bit array.
//!
//! Stores the true value of every register whose nibble holds
//! [`AUX_TOKEN`](crate::hll::AUX_TOKEN). Entries are coupons kept in an
//! open-addressing table probed with an odd stride derived from the slot, so
//! the probe sequence visits every bucket of the power-of-two table.

use std::fmt;

use crate::hll::LG_AUX_ARR_INTS;
use crate::hll::Pair;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;

const ENTRY_EMPTY: u32 = 0;

/// A broken precondition of an [`AuxMap`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxMapViolation {
    /// The slot is already present.
    DuplicateSlot { slot: u32 },
    /// The slot is not present.
    MissingSlot { slot: u32 },
    /// The slot does not address a register of this sketch size.
    SlotOutOfRange { slot: u32, lg_config_k: u8 },
    /// Values must be non-zero to be distinguishable from empty entries.
    ZeroValue { slot: u32 },
    /// A raw table does not have a power-of-two length.
    InvalidTableLength { len: usize },
}

impl fmt::Display for AuxMapViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxMapViolation::DuplicateSlot { slot } => {
                write!(f, "slot {slot} already exists in aux map")
            }
            AuxMapViolation::MissingSlot { slot } => {
                write!(f, "slot {slot} not found in aux map")
            }
            AuxMapViolation::SlotOutOfRange { slot, lg_config_k } => {
                write!(f, "slot {slot} out of range for lg_config_k {lg_config_k}")
            }
            AuxMapViolation::ZeroValue { slot } => {
                write!(f, "slot {slot} has zero value")
            }
            AuxMapViolation::InvalidTableLength { len } => {
                write!(f, "aux table length {len} is not a power of two")
            }
        }
    }
}

impl std::error::Error for AuxMapViolation {}

/// Turns a violated precondition into a panic at the caller.
#[track_caller]
fn must<T>(result: Result<T, AuxMapViolation>) -> T {
    match result {
        Ok(v) => v,
        Err(violation) => panic!("{violation}"),
    }
}

/// Open-addressing hash table from slot to register value.
///
/// Each entry is a coupon `value << 26 | slot`; empty entries are 0. The table
/// doubles whenever it becomes more than 3/4 full.
#[derive(Debug, Clone)]
pub struct AuxMap {
    lg_size: u8,
    lg_config_k: u8,
    entries: Box<[u32]>,
    count: u32,
}

impl PartialEq for AuxMap {
    fn eq(&self, other: &Self) -> bool {
        // Same key/value set; table size and probe layout may differ.
        if self.lg_config_k != other.lg_config_k || self.count != other.count {
            return false;
        }
        let mut lhs: Vec<u32> = self.occupied().collect();
        let mut rhs: Vec<u32> = other.occupied().collect();
        lhs.sort_unstable();
        rhs.sort_unstable();
        lhs == rhs
    }
}

impl Eq for AuxMap {}

enum FindResult {
    Found(usize),
    Empty(usize),
}

impl AuxMap {
    /// Creates an empty map sized for `lg_config_k`.
    pub fn new(lg_config_k: u8) -> Self {
        Self::with_lg_size(LG_AUX_ARR_INTS[lg_config_k as usize], lg_config_k)
    }

    fn with_lg_size(lg_size: u8, lg_config_k: u8) -> Self {
        Self {
            lg_size,
            lg_config_k,
            entries: vec![ENTRY_EMPTY; 1 << lg_size].into_boxed_slice(),
            count: 0,
        }
    }

    /// Rebuilds a map from packed coupons, as written by the compact form.
    pub fn from_compact_pairs(coupons: &[u32], lg_config_k: u8) -> Result<Self, AuxMapViolation> {
        let mut map = Self::with_lg_size(compact_lg_size(coupons.len(), lg_config_k), lg_config_k);
        for &coupon in coupons {
            map.try_add(get_slot(coupon), get_value(coupon))?;
        }
        Ok(map)
    }

    /// Rebuilds a map from a raw table, as written by the updatable form.
    ///
    /// Entries are re-inserted rather than trusted at their stored positions.
    pub fn from_updatable_table(table: &[u32], lg_config_k: u8) -> Result<Self, AuxMapViolation> {
        if !table.len().is_power_of_two() {
            return Err(AuxMapViolation::InvalidTableLength { len: table.len() });
        }
        let lg_size = table.len().trailing_zeros() as u8;
        let mut map = Self::with_lg_size(lg_size, lg_config_k);
        for &coupon in table.iter().filter(|&&e| e != ENTRY_EMPTY) {
            map.try_add(get_slot(coupon), get_value(coupon))?;
        }
        Ok(map)
    }

    /// Inserts a slot that must not be present yet.
    pub fn try_add(&mut self, slot: u32, value: u8) -> Result<(), AuxMapViolation> {
        self.check_slot(slot)?;
        if value == 0 {
            return Err(AuxMapViolation::ZeroValue { slot });
        }
        match self.find_index(slot) {
            FindResult::Found(_) => Err(AuxMapViolation::DuplicateSlot { slot }),
            FindResult::Empty(idx) => {
                self.entries[idx] = pack_coupon(slot, value);
                self.count += 1;
                self.check_grow();
                Ok(())
            }
        }
    }

    /// Overwrites the value of a slot that must be present.
    pub fn try_replace(&mut self, slot: u32, value: u8) -> Result<(), AuxMapViolation> {
        self.check_slot(slot)?;
        if value == 0 {
            return Err(AuxMapViolation::ZeroValue { slot });
        }
        match self.find_index(slot) {
            FindResult::Found(idx) => {
                self.entries[idx] = pack_coupon(slot, value);
                Ok(())
            }
            FindResult::Empty(_) => Err(AuxMapViolation::MissingSlot { slot }),
        }
    }

    /// Value stored for `slot`, if any.
    pub fn find(&self, slot: u32) -> Option<u8> {
        if slot >> self.lg_config_k != 0 {
            return None;
        }
        match self.find_index(slot) {
            FindResult::Found(idx) => Some(get_value(self.entries[idx])),
            FindResult::Empty(_) => None,
        }
    }

    /// Like [`try_add`](Self::try_add), panicking on violation.
    #[track_caller]
    pub fn must_add(&mut self, slot: u32, value: u8) {
        must(self.try_add(slot, value))
    }

    /// Like [`try_replace`](Self::try_replace), panicking on violation.
    #[track_caller]
    pub fn must_replace(&mut self, slot: u32, value: u8) {
        must(self.try_replace(slot, value))
    }

    /// Like [`find`](Self::find), panicking when the slot is absent.
    #[track_caller]
    pub fn must_find(&self, slot: u32) -> u8 {
        must(self.find(slot).ok_or(AuxMapViolation::MissingSlot { slot }))
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Log2 of the table capacity.
    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    /// Bytes needed to write the entries one coupon each.
    pub fn compact_size_bytes(&self) -> usize {
        self.count as usize * 4
    }

    /// Bytes needed to write the whole table.
    pub fn updatable_size_bytes(&self) -> usize {
        4 << self.lg_size
    }

    /// The table as stored, empty entries included.
    pub fn raw_entries(&self) -> &[u32] {
        &self.entries
    }

    /// Entries as pairs, in table order.
    pub fn iter(&self) -> impl Iterator<Item = Pair> + '_ {
        self.occupied().map(Pair::from_coupon)
    }

    fn occupied(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().copied().filter(|&e| e != ENTRY_EMPTY)
    }

    fn check_slot(&self, slot: u32) -> Result<(), AuxMapViolation> {
        if slot >> self.lg_config_k != 0 {
            return Err(AuxMapViolation::SlotOutOfRange {
                slot,
                lg_config_k: self.lg_config_k,
            });
        }
        Ok(())
    }

    fn find_index(&self, slot: u32) -> FindResult {
        let mask = (1u32 << self.lg_size) - 1;
        let stride = (slot >> self.lg_size) | 1;
        let start = slot & mask;
        let mut probe = start;
        loop {
            let entry = self.entries[probe as usize];
            if entry == ENTRY_EMPTY {
                return FindResult::Empty(probe as usize);
            }
            if get_slot(entry) == slot {
                return FindResult::Found(probe as usize);
            }
            probe = (probe + stride) & mask;
            // check_grow keeps at least one bucket empty
            assert_ne!(probe, start, "aux map full; no empty slots");
        }
    }

    fn check_grow(&mut self) {
        let size = 1u32 << self.lg_size;
        if RESIZE_DENOM * self.count > RESIZE_NUMER * size {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let old = std::mem::take(&mut self.entries);
        self.lg_size += 1;
        self.entries = vec![ENTRY_EMPTY; 1 << self.lg_size].into_boxed_slice();
        for entry in old.iter().copied().filter(|&e| e != ENTRY_EMPTY) {
            match self.find_index(get_slot(entry)) {
                FindResult::Empty(idx) => self.entries[idx] = entry,
                FindResult::Found(_) => unreachable!("duplicate slot while growing aux map"),
            }
        }
    }
}

/// Initial table size for `count` entries read back from the compact form.
fn compact_lg_size(count: usize, lg_config_k: u8) -> u8 {
    let mut ceil_pow2 = count.max(1).next_power_of_two();
    if RESIZE_DENOM as usize * count > RESIZE_NUMER as usize * ceil_pow2 {
        ceil_pow2 <<= 1;
    }
    LG_AUX_ARR_INTS[lg_config_k as usize].max(ceil_pow2.trailing_zeros() as u8)
}
