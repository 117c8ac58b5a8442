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

use crate::error::Error;

/// Defines the family byte written into every serialized image.
///
/// Only the HLL family is produced or accepted by this crate.
pub(crate) struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
    /// The preamble size for this family in ints (4-bytes integer).
    pub pre_ints: u8,
}

impl Family {
    /// The HLL family of sketches.
    pub const HLL: Family = Family {
        id: 7,
        name: "HLL",
        pre_ints: 10,
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }

    pub fn validate_pre_ints(&self, pre_ints: u8) -> Result<(), Error> {
        if pre_ints != self.pre_ints {
            Err(Error::invalid_preamble_ints(self.pre_ints, pre_ints))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_family() {
        assert!(Family::HLL.validate_id(7).is_ok());
        let err = Family::HLL.validate_id(16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert_eq!(err.message(), "invalid family: expected 7 (HLL), got 16");

        assert!(Family::HLL.validate_pre_ints(10).is_ok());
        assert!(Family::HLL.validate_pre_ints(2).is_err());
    }
}
