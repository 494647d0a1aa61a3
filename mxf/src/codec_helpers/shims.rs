// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named delivery-profile conformance configuration (§4.11, §8 scenario S5): the tolerance and
//! requirement values a codec-specific writer helper checks an incoming bitstream against. A
//! named profile (e.g. `as10_high_hd_2014`) is a fixed instance of [`ShimConfig`]; callers may
//! also build a custom one for a profile this engine doesn't ship a constructor for.
//!
//! `loose_checks` governs what a violation does: with it set, a helper reports a `Warn`
//! diagnostic and keeps writing; without it, the first violation is a fatal
//! [`MxfError::ShimViolation`] (§7).

/// A single conformance requirement: either a fixed value every frame must match, or "any",
/// meaning the shim imposes no constraint on this field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShimValue<T> {
    Required(T),
    Any,
}

impl<T: PartialEq + Copy> ShimValue<T> {
    pub fn matches(&self, value: T) -> bool {
        match self {
            ShimValue::Required(expected) => *expected == value,
            ShimValue::Any => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShimProfile {
    As10HighHd2014,
    As10CnnHd2012,
    As10NrkHd2012,
    As10Jvc35VbrHd2012,
    As10Jvc25CbrHd2012,
    Custom,
}

/// A named conformance profile plus the per-field values a codec helper's `check_conformance`
/// validates frames against (§4.11).
#[derive(Clone, Debug)]
pub struct ShimConfig {
    pub profile: ShimProfile,
    /// When true, a violation is logged as a warning and writing continues; when false, the
    /// first violation is returned as `MxfError::ShimViolation` (§7, §8 S5).
    pub loose_checks: bool,
    pub single_sequence: ShimValue<bool>,
    pub aspect_ratio: ShimValue<(i32, i32)>,
    pub frame_rate: ShimValue<(i32, i32)>,
    /// Target bit rate in bits/second.
    pub bit_rate: u32,
    /// Allowed absolute deviation from `bit_rate`, also in bits/second (§8 S5).
    pub bit_rate_delta: u32,
    pub const_bit_rate: bool,
    pub is_progressive: ShimValue<bool>,
    /// True if the horizontal/vertical size this profile requires must be the only size observed
    /// across the whole essence (no mid-stream resolution change).
    pub unique_shim_hv_size: bool,
    pub horizontal_size: u32,
    pub vertical_size: u32,
    /// `0` = 4:2:0, `1` = 4:2:2, `2` = 4:4:4 (MPEG-2 `chroma_format` field encoding).
    pub chroma_format: ShimValue<u8>,
    pub low_delay: ShimValue<bool>,
    pub closed_gop: ShimValue<bool>,
    /// "Constant GOP structure" requirement: every GOP has the same sequence of frame types.
    pub identical_gop: ShimValue<bool>,
    pub max_gop: u16,
    pub max_b_picture_count: ShimValue<u8>,
    pub constant_b_frames: ShimValue<bool>,
    /// Cap on how many violations of the same field are logged before going quiet, so a
    /// systematically-violating stream doesn't flood the diagnostic sink (mirrors bmx's per-field
    /// `nlogged`/`max_logged_violations` counters).
    pub max_logged_violations: u32,
}

impl ShimConfig {
    /// AS-10 "High HD" 2014 shim: 1080i/1080p MPEG-2 422P@HL, 50 Mbit/s CBR, closed GOPs only,
    /// single sequence, 16:9.
    pub fn as10_high_hd_2014() -> Self {
        ShimConfig {
            profile: ShimProfile::As10HighHd2014,
            loose_checks: false,
            single_sequence: ShimValue::Required(true),
            aspect_ratio: ShimValue::Required((16, 9)),
            frame_rate: ShimValue::Any,
            bit_rate: 50_000_000,
            bit_rate_delta: 3_000_000,
            const_bit_rate: true,
            is_progressive: ShimValue::Any,
            unique_shim_hv_size: true,
            horizontal_size: 1920,
            vertical_size: 1080,
            chroma_format: ShimValue::Required(1),
            low_delay: ShimValue::Required(false),
            closed_gop: ShimValue::Required(true),
            identical_gop: ShimValue::Any,
            max_gop: 1,
            max_b_picture_count: ShimValue::Any,
            constant_b_frames: ShimValue::Any,
            max_logged_violations: 10,
        }
    }

    /// AS-10 "CNN HD" 2012 shim: lower bit rate than `high_hd_2014`, GOP up to 15, open GOPs
    /// permitted.
    pub fn as10_cnn_hd_2012() -> Self {
        ShimConfig {
            profile: ShimProfile::As10CnnHd2012,
            loose_checks: false,
            single_sequence: ShimValue::Required(true),
            aspect_ratio: ShimValue::Required((16, 9)),
            frame_rate: ShimValue::Any,
            bit_rate: 30_000_000,
            bit_rate_delta: 3_000_000,
            const_bit_rate: false,
            is_progressive: ShimValue::Any,
            unique_shim_hv_size: true,
            horizontal_size: 1920,
            vertical_size: 1080,
            chroma_format: ShimValue::Required(1),
            low_delay: ShimValue::Any,
            closed_gop: ShimValue::Any,
            identical_gop: ShimValue::Any,
            max_gop: 15,
            max_b_picture_count: ShimValue::Any,
            constant_b_frames: ShimValue::Any,
            max_logged_violations: 10,
        }
    }

    /// AS-10 "NRK HD" 2012 shim: 50 Mbit/s, closed GOPs, max GOP 12.
    pub fn as10_nrk_hd_2012() -> Self {
        ShimConfig {
            profile: ShimProfile::As10NrkHd2012,
            loose_checks: false,
            single_sequence: ShimValue::Required(true),
            aspect_ratio: ShimValue::Required((16, 9)),
            frame_rate: ShimValue::Any,
            bit_rate: 50_000_000,
            bit_rate_delta: 5_000_000,
            const_bit_rate: false,
            is_progressive: ShimValue::Any,
            unique_shim_hv_size: true,
            horizontal_size: 1920,
            vertical_size: 1080,
            chroma_format: ShimValue::Required(1),
            low_delay: ShimValue::Any,
            closed_gop: ShimValue::Required(true),
            identical_gop: ShimValue::Any,
            max_gop: 12,
            max_b_picture_count: ShimValue::Any,
            constant_b_frames: ShimValue::Any,
            max_logged_violations: 10,
        }
    }

    /// AS-10 "JVC HD" 2012 shim, 35 Mbit/s VBR variant.
    pub fn as10_jvc_hd_35_vbr_2012() -> Self {
        ShimConfig {
            profile: ShimProfile::As10Jvc35VbrHd2012,
            loose_checks: false,
            single_sequence: ShimValue::Required(true),
            aspect_ratio: ShimValue::Required((16, 9)),
            frame_rate: ShimValue::Any,
            bit_rate: 35_000_000,
            bit_rate_delta: 5_000_000,
            const_bit_rate: false,
            is_progressive: ShimValue::Any,
            unique_shim_hv_size: true,
            horizontal_size: 1440,
            vertical_size: 1080,
            chroma_format: ShimValue::Required(1),
            low_delay: ShimValue::Any,
            closed_gop: ShimValue::Any,
            identical_gop: ShimValue::Any,
            max_gop: 15,
            max_b_picture_count: ShimValue::Any,
            constant_b_frames: ShimValue::Any,
            max_logged_violations: 10,
        }
    }

    /// AS-10 "JVC HD" 2012 shim, 25 Mbit/s CBR variant.
    pub fn as10_jvc_hd_25_cbr_2012() -> Self {
        ShimConfig {
            profile: ShimProfile::As10Jvc25CbrHd2012,
            loose_checks: false,
            single_sequence: ShimValue::Required(true),
            aspect_ratio: ShimValue::Required((16, 9)),
            frame_rate: ShimValue::Any,
            bit_rate: 25_000_000,
            bit_rate_delta: 2_000_000,
            const_bit_rate: true,
            is_progressive: ShimValue::Any,
            unique_shim_hv_size: true,
            horizontal_size: 1440,
            vertical_size: 1080,
            chroma_format: ShimValue::Required(1),
            low_delay: ShimValue::Any,
            closed_gop: ShimValue::Required(true),
            identical_gop: ShimValue::Any,
            max_gop: 15,
            max_b_picture_count: ShimValue::Any,
            constant_b_frames: ShimValue::Any,
            max_logged_violations: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_shim_value_any_matches_everything() {
        let v: ShimValue<u32> = ShimValue::Any;
        assert!(v.matches(0));
        assert!(v.matches(u32::MAX));
    }

    #[test]
    fn verify_shim_value_required_matches_only_expected() {
        let v = ShimValue::Required(42u32);
        assert!(v.matches(42));
        assert!(!v.matches(43));
    }

    #[test]
    fn verify_named_profiles_have_distinct_bit_rates() {
        assert_eq!(ShimConfig::as10_high_hd_2014().bit_rate, 50_000_000);
        assert_eq!(ShimConfig::as10_cnn_hd_2012().bit_rate, 30_000_000);
        assert_ne!(ShimConfig::as10_jvc_hd_35_vbr_2012().bit_rate, ShimConfig::as10_jvc_hd_25_cbr_2012().bit_rate);
    }
}
