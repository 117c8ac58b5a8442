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
//! This crate implements the dense ("HLL mode") representations of the
//! Apache DataSketches HyperLogLog sketch:
//!
//! - [`hll::Array4`]: 4 bits per register plus an exception map for registers
//!   that overflow the nibble relative to the current minimum
//! - [`hll::Array6`]: 6 bits per register
//! - [`hll::Array8`]: 8 bits per register
//!
//! together with the HIP and composite estimators, cross-variant conversion
//! and the byte-exact binary layout shared with the Java and C++ libraries.
//! The composite estimator interpolates over a model-derived table rather
//! than their empirical one, so its estimates match theirs only approximately.
//!
//! Input values are pre-hashed *coupons*; see [`hll::pack_coupon`].
//!
//! ```rust
//! # use datasketches_hll::common::NumStdDev;
//! # use datasketches_hll::hll::{DenseArray, HllType, pack_coupon};
//! let mut array = DenseArray::new(10, HllType::Hll4);
//! for slot in 0..512 {
//!     array.update(pack_coupon(slot, 1 + (slot % 3) as u8));
//! }
//! let bytes = array.serialize_compact();
//! let restored = DenseArray::deserialize(&bytes).unwrap();
//! assert_eq!(restored.estimate(), array.estimate());
//! assert!(restored.upper_bound(NumStdDev::Two) >= restored.estimate());
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod common;
pub mod error;
pub mod hll;

mod codec;
