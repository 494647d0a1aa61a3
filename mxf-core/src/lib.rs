// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! `mxf-core` provides the primitives shared by every layer of the MXF read/write engine: KLV
//! keys and BER lengths (§4.1), the label registry (§4.2), byte- and bit-level IO over a seekable
//! source or sink, the structured diagnostic/error taxonomy (§7), and the rational-number time
//! units used to express edit rates and edit-unit positions (§3.2, §3.3).
//!
//! Everything in this crate is either pure data (the label registry) or operates purely on bytes
//! already in memory or on a byte stream; no type here understands what a partition, a header
//! metadata set, or a content package is. Those live in the `mxf` crate, built on top of this one.

pub mod errors;
pub mod io;
pub mod key;
pub mod klv;
pub mod label;
pub mod units;
pub mod util;
