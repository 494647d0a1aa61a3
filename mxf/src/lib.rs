// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A pure Rust engine for reading and writing MXF (SMPTE ST 377) files.
//!
//! The crate is organised bottom-up, each module depending only on the ones above it in this
//! list:
//!
//! * [`metadata`] — the header-metadata data model, local-tag primer, and class/item definitions
//!   (§3.4, §4.3).
//! * [`descriptor`] — essence-type classification and file-descriptor construction (§4.4).
//! * [`index`] — CBE/VBE index-table segments and the temporal-offset window (§3.3, §4.5).
//! * [`partition`] — partition-pack layout, KAG alignment, and the Random Index Pack (§3.2, §4.6).
//! * [`content_package`] — frame- and clip-wrapped content package framing (§3.5, §4.7).
//! * [`essence_chunk`] — logical-offset-to-file-position bookkeeping for a split essence stream
//!   (§4.8).
//! * [`reader`] — the essence reader: partition/content-package walking, seeking, and recovery
//!   (§4.9).
//! * [`sequence_reader`] — joins several readers that share a Material Package UID into one
//!   ordered sequence (§4.10).
//! * [`codec_helpers`] — per-essence-family writer helpers (GOP structure, temporal offsets,
//!   conformance shims) (§4.11).
//! * [`writer`] — the top-level `FileWriter`, driving the three-pass partition write (§4.6).
//! * [`aaf_bridge`] — Avid AAF composition-to-MXF-locator resolution (§6).
//! * [`avid`] — the Avid embedded meta-dictionary, behind the `avid-metadictionary` feature
//!   (§4.12).
//!
//! Every reader and writer operation returns [`mxf_core::errors::Result`]; see that module's
//! documentation for the propagation policy distinguishing recoverable read errors from writer
//! errors, which always surface to the caller.

pub mod aaf_bridge;
pub mod codec_helpers;
pub mod content_package;
pub mod descriptor;
pub mod essence_chunk;
pub mod index;
pub mod metadata;
pub mod partition;
pub mod reader;
pub mod sequence_reader;
pub mod writer;

#[cfg(feature = "avid-metadictionary")]
pub mod avid;

pub use mxf_core as core;
