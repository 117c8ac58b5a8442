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

//! Binary layout of a dense register array.
//!
//! ```text
//! offset  size  field
//!      0     1  preamble ints (10)
//!      1     1  serial version (1)
//!      2     1  family id (7, HLL)
//!      3     1  lg_config_k
//!      4     1  lg_arr: log2 of the exception table, updatable Array4 only
//!      5     1  flags: empty (4) | compact (8) | out of order (16)
//!      6     1  cur_min
//!      7     1  mode: cur mode (HLL = 2) in bits 0-1, HllType in bits 2-3
//!      8     8  hip_accum
//!     16     8  kxq0
//!     24     8  kxq1
//!     32     4  num_at_cur_min
//!     36     4  exception count
//!     40     n  packed registers
//!   40+n     .  exceptions: one coupon each (compact) or the whole table (updatable)
//! ```
//!
//! All multi-byte fields are little-endian.

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::AUX_TOKEN;
use crate::hll::Array4;
use crate::hll::Array6;
use crate::hll::Array8;
use crate::hll::AuxMap;
use crate::hll::DenseArray;
use crate::hll::HipEstimator;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::RegisterArray;
use crate::hll::array4;
use crate::hll::array6;

/// Current serialization version
pub(crate) const SERIAL_VERSION: u8 = 1;

/// Flag indicating the array is empty
pub(crate) const EMPTY_FLAG_MASK: u8 = 4;
/// Flag indicating exceptions are written one coupon each
pub(crate) const COMPACT_FLAG_MASK: u8 = 8;
/// Flag indicating out-of-order mode (HIP estimator invalid)
pub(crate) const OUT_OF_ORDER_FLAG_MASK: u8 = 16;

/// Total size of the HLL preamble in bytes
pub(crate) const HLL_PREAMBLE_SIZE: usize = 40;

pub(crate) const CUR_MODE_LIST: u8 = 0;
pub(crate) const CUR_MODE_SET: u8 = 1;
pub(crate) const CUR_MODE_HLL: u8 = 2;

const COUPON_SIZE_BYTES: usize = 4;

/// Encode mode byte from current mode and target type
#[inline]
fn encode_mode_byte(cur_mode: u8, tgt_type: u8) -> u8 {
    (cur_mode & 0x3) | ((tgt_type & 0x3) << 2)
}

/// Extract current mode from mode byte (low 2 bits)
#[inline]
fn extract_cur_mode(mode_byte: u8) -> u8 {
    mode_byte & 0x3
}

/// Extract target HLL type from mode byte (bits 2-3)
#[inline]
fn extract_tgt_hll_type(mode_byte: u8) -> u8 {
    (mode_byte >> 2) & 0x3
}

/// Number of packed register bytes for a packing.
fn register_bytes_len(hll_type: HllType, lg_config_k: u8) -> usize {
    match hll_type {
        HllType::Hll4 => array4::num_bytes(lg_config_k),
        HllType::Hll6 => array6::num_bytes(lg_config_k),
        HllType::Hll8 => 1 << lg_config_k,
    }
}

/// Writes `array` in the compact or the updatable form.
pub(crate) fn serialize(array: &dyn RegisterArray, compact: bool) -> Vec<u8> {
    let aux_map = array.aux_map().filter(|aux| !aux.is_empty());
    let register_bytes = array.register_bytes();

    let (lg_arr, aux_bytes) = match aux_map {
        None => (0, 0),
        Some(aux) if compact => (0, aux.compact_size_bytes()),
        Some(aux) => (aux.lg_size(), aux.updatable_size_bytes()),
    };

    let mut flags = 0u8;
    if array.is_empty() {
        flags |= EMPTY_FLAG_MASK;
    }
    if compact {
        flags |= COMPACT_FLAG_MASK;
    }
    if array.is_out_of_order() {
        flags |= OUT_OF_ORDER_FLAG_MASK;
    }

    let estimator = array.estimator();
    let total_size = HLL_PREAMBLE_SIZE + register_bytes.len() + aux_bytes;
    let mut bytes = SketchBytes::with_capacity(total_size);

    bytes.write_u8(Family::HLL.pre_ints);
    bytes.write_u8(SERIAL_VERSION);
    bytes.write_u8(Family::HLL.id);
    bytes.write_u8(array.lg_config_k());
    bytes.write_u8(lg_arr);
    bytes.write_u8(flags);
    bytes.write_u8(array.cur_min());
    bytes.write_u8(encode_mode_byte(CUR_MODE_HLL, array.hll_type() as u8));
    bytes.write_f64_le(estimator.hip_accum());
    bytes.write_f64_le(estimator.kxq0());
    bytes.write_f64_le(estimator.kxq1());
    bytes.write_u32_le(array.num_at_cur_min());
    bytes.write_u32_le(aux_map.map_or(0, |aux| aux.count()));
    debug_assert_eq!(bytes.len(), HLL_PREAMBLE_SIZE);

    bytes.write(register_bytes);

    if let Some(aux) = aux_map {
        if compact {
            for pair in aux.iter() {
                bytes.write_u32_le(pair.coupon());
            }
        } else {
            for &entry in aux.raw_entries() {
                bytes.write_u32_le(entry);
            }
        }
    }

    debug_assert_eq!(bytes.len(), total_size);
    bytes.into_bytes()
}

/// Reads an array written by [`serialize`], validating every field before
/// the array is assembled.
pub(crate) fn deserialize(bytes: &[u8]) -> Result<DenseArray, Error> {
    if bytes.len() < HLL_PREAMBLE_SIZE {
        return Err(Error::insufficient_data_of(
            "preamble",
            format!(
                "expected at least {HLL_PREAMBLE_SIZE} bytes, got {}",
                bytes.len()
            ),
        ));
    }

    let mut cursor = SketchSlice::new(bytes);
    let pre_ints = cursor.read_u8().map_err(make_error("pre_ints"))?;
    let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
    let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
    let lg_config_k = cursor.read_u8().map_err(make_error("lg_config_k"))?;
    let lg_arr = cursor.read_u8().map_err(make_error("lg_arr"))?;
    let flags = cursor.read_u8().map_err(make_error("flags"))?;
    let cur_min = cursor.read_u8().map_err(make_error("cur_min"))?;
    let mode_byte = cursor.read_u8().map_err(make_error("mode"))?;

    Family::HLL.validate_id(family_id)?;
    if serial_version != SERIAL_VERSION {
        return Err(Error::unsupported_serial_version(
            SERIAL_VERSION,
            serial_version,
        ));
    }
    Family::HLL.validate_pre_ints(pre_ints)?;
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        return Err(
            Error::deserial(format!(
                "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}]"
            ))
            .with_context("lg_config_k", lg_config_k),
        );
    }

    let cur_mode = extract_cur_mode(mode_byte);
    if cur_mode != CUR_MODE_HLL {
        let name = match cur_mode {
            CUR_MODE_LIST => "LIST",
            CUR_MODE_SET => "SET",
            _ => "unknown",
        };
        return Err(
            Error::deserial(format!("{name} mode is not a dense register array"))
                .with_context("mode", mode_byte),
        );
    }
    let hll_type = HllType::from_tag(extract_tgt_hll_type(mode_byte)).ok_or_else(|| {
        Error::deserial("invalid target HLL type").with_context("mode", mode_byte)
    })?;

    let compact = flags & COMPACT_FLAG_MASK != 0;
    let out_of_order = flags & OUT_OF_ORDER_FLAG_MASK != 0;

    let hip_accum = cursor.read_f64_le().map_err(make_error("hip_accum"))?;
    let kxq0 = cursor.read_f64_le().map_err(make_error("kxq0"))?;
    let kxq1 = cursor.read_f64_le().map_err(make_error("kxq1"))?;
    let num_at_cur_min = cursor.read_u32_le().map_err(make_error("num_at_cur_min"))?;
    let aux_count = cursor.read_u32_le().map_err(make_error("aux_count"))?;

    let k = 1u32 << lg_config_k;
    // a 4-bit array rebases as soon as no register is left at cur_min
    let min_at_cur_min = u32::from(hll_type == HllType::Hll4);
    if num_at_cur_min < min_at_cur_min || num_at_cur_min > k {
        return Err(Error::deserial("num_at_cur_min out of range")
            .with_context("num_at_cur_min", num_at_cur_min)
            .with_context("lg_config_k", lg_config_k));
    }
    if hll_type != HllType::Hll4 {
        if cur_min != 0 {
            return Err(Error::deserial("only 4-bit arrays have a non-zero cur_min")
                .with_context("cur_min", cur_min));
        }
        if aux_count != 0 {
            return Err(Error::deserial("only 4-bit arrays have exceptions")
                .with_context("aux_count", aux_count));
        }
    }

    let num_register_bytes = register_bytes_len(hll_type, lg_config_k);
    if cursor.remaining() < num_register_bytes {
        return Err(Error::insufficient_data_of(
            "registers",
            format!(
                "expected {num_register_bytes} bytes, got {}",
                cursor.remaining()
            ),
        ));
    }
    let mut registers = vec![0u8; num_register_bytes].into_boxed_slice();
    cursor
        .read_exact(&mut registers)
        .map_err(make_error("registers"))?;

    let estimator = HipEstimator::from_parts(hip_accum, kxq0, kxq1, out_of_order);

    match hll_type {
        HllType::Hll4 => {
            let aux_map = read_aux_map(&mut cursor, lg_config_k, lg_arr, aux_count, compact)?;
            validate_array4(&registers, cur_min, num_at_cur_min, aux_map.as_ref())?;
            Ok(DenseArray::Array4(Array4::from_parts(
                lg_config_k,
                registers,
                cur_min,
                num_at_cur_min,
                aux_map,
                estimator,
            )))
        }
        HllType::Hll6 => {
            let array = Array6::from_parts(lg_config_k, registers, num_at_cur_min, estimator);
            validate_num_zeros(&array, num_at_cur_min)?;
            Ok(DenseArray::Array6(array))
        }
        HllType::Hll8 => {
            if let Some(slot) = registers.iter().position(|&v| v > 63) {
                return Err(Error::deserial("register value exceeds 63")
                    .with_context("slot", slot)
                    .with_context("value", registers[slot]));
            }
            let array = Array8::from_parts(lg_config_k, registers, num_at_cur_min, estimator);
            validate_num_zeros(&array, num_at_cur_min)?;
            Ok(DenseArray::Array8(array))
        }
    }
}

fn read_aux_map(
    cursor: &mut SketchSlice<'_>,
    lg_config_k: u8,
    lg_arr: u8,
    aux_count: u32,
    compact: bool,
) -> Result<Option<AuxMap>, Error> {
    if aux_count == 0 {
        return Ok(None);
    }
    if aux_count > 1 << lg_config_k {
        return Err(Error::deserial("more exceptions than registers")
            .with_context("aux_count", aux_count));
    }

    let num_entries = if compact {
        aux_count as usize
    } else {
        // the table stays below 3/4 load, so it never exceeds 2k entries
        if lg_arr > lg_config_k + 1 || (1usize << lg_arr) < aux_count as usize {
            return Err(Error::deserial("exception table size out of range")
                .with_context("lg_arr", lg_arr)
                .with_context("aux_count", aux_count));
        }
        1usize << lg_arr
    };

    let needed = num_entries * COUPON_SIZE_BYTES;
    if cursor.remaining() < needed {
        return Err(Error::insufficient_data_of(
            "exceptions",
            format!("expected {needed} bytes, got {}", cursor.remaining()),
        ));
    }
    let mut entries = Vec::with_capacity(num_entries);
    for _ in 0..num_entries {
        entries.push(cursor.read_u32_le().map_err(make_error("exceptions"))?);
    }

    let aux = if compact {
        AuxMap::from_compact_pairs(&entries, lg_config_k)
    } else {
        AuxMap::from_updatable_table(&entries, lg_config_k)
    }
    .map_err(|violation| {
        Error::deserial("malformed exception section")
            .with_context("compact", compact)
            .set_source(violation)
    })?;

    if aux.count() != aux_count {
        return Err(Error::deserial("exception count does not match exception table")
            .with_context("aux_count", aux_count)
            .with_context("entries", aux.count()));
    }
    Ok(Some(aux))
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::insufficient_data_of(tag, "unexpected end of data").set_source(err)
}

/// Checks the sentinel nibbles against the exception map and the stored
/// `num_at_cur_min` against the registers.
fn validate_array4(
    registers: &[u8],
    cur_min: u8,
    num_at_cur_min: u32,
    aux_map: Option<&AuxMap>,
) -> Result<(), Error> {
    let nibbles = registers
        .iter()
        .flat_map(|&byte| [byte & 0x0F, byte >> 4])
        .enumerate();
    let mut num_tokens = 0u32;
    let mut num_zero = 0u32;
    for (slot, nibble) in nibbles {
        match nibble {
            0 => num_zero += 1,
            AUX_TOKEN => {
                num_tokens += 1;
                let value = aux_map.and_then(|aux| aux.find(slot as u32));
                match value {
                    Some(value) if value >= cur_min.saturating_add(AUX_TOKEN) => {}
                    Some(value) => {
                        return Err(Error::deserial("exception value fits in a nibble")
                            .with_context("slot", slot)
                            .with_context("value", value)
                            .with_context("cur_min", cur_min));
                    }
                    None => {
                        return Err(Error::deserial("sentinel nibble without exception")
                            .with_context("slot", slot));
                    }
                }
            }
            _ => {}
        }
        if nibble != AUX_TOKEN && cur_min as u32 + nibble as u32 > 63 {
            return Err(Error::deserial("register value exceeds 63")
                .with_context("slot", slot)
                .with_context("cur_min", cur_min));
        }
    }

    let aux_count = aux_map.map_or(0, |aux| aux.count());
    if num_tokens != aux_count {
        // some exception has no sentinel nibble
        let orphan = aux_map
            .into_iter()
            .flat_map(|aux| aux.iter())
            .map(|pair| pair.slot())
            .find(|&slot| nibble_at(registers, slot) != AUX_TOKEN);
        return Err(Error::deserial("exception without sentinel nibble")
            .with_context("aux_count", aux_count)
            .with_context("sentinels", num_tokens)
            .with_context("slot", orphan.map_or(-1, i64::from)));
    }
    if num_zero != num_at_cur_min {
        return Err(Error::deserial("num_at_cur_min does not match registers")
            .with_context("num_at_cur_min", num_at_cur_min)
            .with_context("registers_at_cur_min", num_zero));
    }
    Ok(())
}

fn nibble_at(registers: &[u8], slot: u32) -> u8 {
    let byte = registers[(slot >> 1) as usize];
    if slot & 1 == 0 { byte & 0x0F } else { byte >> 4 }
}

fn validate_num_zeros(array: &dyn RegisterArray, num_at_cur_min: u32) -> Result<(), Error> {
    let num_zeros = (0..array.num_registers())
        .filter(|&slot| array.get(slot) == 0)
        .count() as u32;
    if num_zeros != num_at_cur_min {
        return Err(Error::deserial("num_at_cur_min does not match registers")
            .with_context("num_at_cur_min", num_at_cur_min)
            .with_context("registers_at_cur_min", num_zeros));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_mode_byte() {
        for tgt_type in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let mode = encode_mode_byte(CUR_MODE_HLL, tgt_type as u8);
            assert_eq!(extract_cur_mode(mode), CUR_MODE_HLL);
            assert_eq!(extract_tgt_hll_type(mode), tgt_type as u8);
        }
        assert_eq!(encode_mode_byte(CUR_MODE_HLL, HllType::Hll8 as u8), 10);
    }

    #[test]
    fn test_register_bytes_len() {
        assert_eq!(register_bytes_len(HllType::Hll4, 4), 8);
        assert_eq!(register_bytes_len(HllType::Hll6, 4), 13);
        assert_eq!(register_bytes_len(HllType::Hll8, 4), 16);
        assert_eq!(register_bytes_len(HllType::Hll6, 21), 1_572_865);
    }

    #[test]
    fn test_validate_array4() {
        // slot 0 at cur_min 2, slot 1 overflowing, slots 2..16 at offset 1
        let mut registers = [0x11u8; 8];
        registers[0] = 0xF0;
        let mut aux = AuxMap::new(4);
        aux.must_add(1, 20);

        assert!(validate_array4(&registers, 2, 1, Some(&aux)).is_ok());

        let err = validate_array4(&registers, 2, 2, Some(&aux)).unwrap_err();
        assert_eq!(err.message(), "num_at_cur_min does not match registers");

        let err = validate_array4(&registers, 2, 1, None).unwrap_err();
        assert_eq!(err.message(), "sentinel nibble without exception");

        // 20 fits in a nibble once cur_min is 6
        let err = validate_array4(&registers, 6, 1, Some(&aux)).unwrap_err();
        assert_eq!(err.message(), "exception value fits in a nibble");

        let err = validate_array4(&[0x11u8; 8], 63, 0, None).unwrap_err();
        assert_eq!(err.message(), "register value exceeds 63");

        aux.must_add(5, 30);
        let err = validate_array4(&registers, 2, 1, Some(&aux)).unwrap_err();
        assert_eq!(err.message(), "exception without sentinel nibble");
    }

    #[test]
    fn test_exception_table_size_checked() {
        let mut array = Array4::new(4);
        for slot in 0..16 {
            array.update(pack_coupon(slot, 1));
        }
        array.update(pack_coupon(9, 40));
        let mut bytes = serialize(&array, false);
        assert_eq!(bytes[4], 2);

        bytes[4] = 9;
        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.message(), "exception table size out of range");
    }
}
