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

//! Standard deviation enums for confidence bounds
//!
//! This module provides the type used to pick the confidence level of
//! [`lower_bound`](crate::hll::RegisterArray::lower_bound) and
//! [`upper_bound`](crate::hll::RegisterArray::upper_bound).

use crate::error::Error;

/// Number of standard deviations for confidence bounds
///
/// Higher values provide wider confidence intervals with greater certainty
/// that the true cardinality falls within the bounds.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    /// One standard deviation (\~68% confidence interval)
    One = 1,
    /// Two standard deviations (\~95% confidence interval)
    Two = 2,
    /// Three standard deviations (\~99.7% confidence interval)
    Three = 3,
}

impl NumStdDev {
    /// Returns the number of standard deviations as an `u8`.
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for NumStdDev {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NumStdDev::One),
            2 => Ok(NumStdDev::Two),
            3 => Ok(NumStdDev::Three),
            _ => Err(
                Error::invalid_argument("num_std_dev must be 1, 2 or 3")
                    .with_context("num_std_dev", value),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_try_from_valid() {
        for n in 1..=3u8 {
            let sd = NumStdDev::try_from(n).unwrap();
            assert_eq!(sd.as_u8(), n);
        }
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        for n in [0u8, 4, 255] {
            let err = NumStdDev::try_from(n).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        let err = NumStdDev::try_from(4).unwrap_err();
        assert_snapshot!(err, @"InvalidArgument, context: { num_std_dev: 4 } => num_std_dev must be 1, 2 or 3");
    }
}
