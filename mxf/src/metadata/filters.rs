// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read filters (§4.3): hooks into the header-metadata loader. `before_set_read` may tell the
//! loader to skip an entire set without decoding its items at all; `after_set_read` lets a filter
//! inspect or rewrite a set once it has been parsed.

use mxf_core::key::Ul;

use super::set::Set;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterAction {
    Keep,
    Skip,
}

pub trait ReadFilter {
    fn before_set_read(&mut self, _key: &Ul) -> FilterAction {
        FilterAction::Keep
    }

    fn after_set_read(&mut self, _set: &mut Set) {}
}

/// Accepts every set unmodified; the default when no filtering is requested.
pub struct NullReadFilter;

impl ReadFilter for NullReadFilter {}

/// The Avid embedded meta-dictionary (C12) describes classes the consumer already knows about
/// from the baseline data model; dropping it on read avoids forcing every caller to understand
/// Avid's private class/type definitions just to get at the header metadata it introduces.
pub struct DropAvidMetaDictionaryFilter {
    pub meta_dictionary_class: Ul,
}

impl ReadFilter for DropAvidMetaDictionaryFilter {
    fn before_set_read(&mut self, key: &Ul) -> FilterAction {
        if key.matches_ignoring_version(&self.meta_dictionary_class) {
            FilterAction::Skip
        }
        else {
            FilterAction::Keep
        }
    }
}
