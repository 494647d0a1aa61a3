// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Avid embedded meta-dictionary writer (§4.12, component C12), behind the
//! `avid-metadictionary` feature. Avid's own MXF files carry a private AAF-style catalogue of
//! every class and type the header metadata references, embedded as ordinary header-metadata
//! sets (`MetaDictionary`, `ClassDefinition`, `PropertyDefinition`, and a handful of
//! `TypeDefinition*` subclasses).
//!
//! The catalogue is built in two passes, mirroring
//! `mxf_avid_create_classdef`/`mxf_avid_create_propertydef`/`mxf_avid_finalise_metadictionary` in
//! `examples/original_source/deps/libMXF/mxf/mxf_avid_metadictionary.c`: every `ParentClass` and
//! `Type` reference is recorded against the *identification* of its target (not an instance UID,
//! which doesn't exist yet) while the catalogue is built, then
//! [`MetaDictionaryBuilder::finalize`] walks the recorded references and overwrites each one with
//! the instance UID the target ended up with. This sidesteps forward references without needing
//! two passes over the caller's data.
//!
//! [`DropAvidMetaDictionaryFilter`](crate::metadata::filters::DropAvidMetaDictionaryFilter)
//! is the read-side counterpart: a generic consumer has no use for this catalogue (§4.3) and can
//! filter it out with [`META_DICTIONARY_CLASS`].

use std::collections::{HashMap, HashSet};

use mxf_core::errors::Result;
use mxf_core::key::Ul;
use uuid::Uuid;

use crate::metadata::datamodel::{DataModel, ItemType, INSTANCE_UID_ITEM};
use crate::metadata::primer::Primer;
use crate::metadata::set::Set;
use crate::metadata::HeaderMetadata;

/// Avid's embedded meta-dictionary classes live under a private `0d01040101` registry branch,
/// distinct from the `0d01010101` branch the rest of this crate's baseline data model uses
/// (`metadata/datamodel.rs`). The filtered source tree doesn't carry the header that defines the
/// literal octet values (only `mxf_avid_metadictionary.c` survived retrieval, see
/// `examples/original_source/_INDEX.md`), so the values below are this crate's own synthetic
/// allocation within that branch rather than a value copied from a registry document.
macro_rules! metadict_set_key {
    ($byte:expr) => {
        Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, 0x04, 0x01, 0x01, $byte, 0x00, 0x00])
    };
}

macro_rules! metadict_item_key {
    ($b0:expr, $b1:expr) => {
        Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x0d, 0x01, 0x04, $b0, $b1, 0x00, 0x00, 0x00])
    };
}

/// `MetaDictionary` (§4.12): the single top-level set, carrying `ClassDefinitions` and
/// `TypeDefinitions` strong-reference arrays.
pub const META_DICTIONARY_CLASS: Ul = metadict_set_key!(0x01);
const CLASS_DEFINITION: Ul = metadict_set_key!(0x02);
const PROPERTY_DEFINITION: Ul = metadict_set_key!(0x03);
const TYPE_DEFINITION_INTEGER: Ul = metadict_set_key!(0x04);
const TYPE_DEFINITION_CHARACTER: Ul = metadict_set_key!(0x05);
const TYPE_DEFINITION_STRING: Ul = metadict_set_key!(0x06);
const TYPE_DEFINITION_FIXED_ARRAY: Ul = metadict_set_key!(0x07);
const TYPE_DEFINITION_VARIABLE_ARRAY: Ul = metadict_set_key!(0x08);
const TYPE_DEFINITION_STRONG_OBJECT_REFERENCE: Ul = metadict_set_key!(0x09);
const TYPE_DEFINITION_WEAK_OBJECT_REFERENCE: Ul = metadict_set_key!(0x0a);
const TYPE_DEFINITION_RECORD: Ul = metadict_set_key!(0x0b);
const TYPE_DEFINITION_OPAQUE: Ul = metadict_set_key!(0x0c);

const MD_IDENTIFICATION: Ul = metadict_item_key!(0x01, 0x01);
const MD_NAME: Ul = metadict_item_key!(0x01, 0x02);
const MD_DESCRIPTION: Ul = metadict_item_key!(0x01, 0x03);
const MD_CLASS_DEFINITIONS: Ul = metadict_item_key!(0x02, 0x01);
const MD_TYPE_DEFINITIONS: Ul = metadict_item_key!(0x02, 0x02);
const MD_PARENT_CLASS: Ul = metadict_item_key!(0x03, 0x01);
const MD_PROPERTIES: Ul = metadict_item_key!(0x03, 0x02);
const MD_IS_CONCRETE: Ul = metadict_item_key!(0x03, 0x03);
const MD_PROPERTY_TYPE: Ul = metadict_item_key!(0x04, 0x01);
const MD_IS_OPTIONAL: Ul = metadict_item_key!(0x04, 0x02);
const MD_LOCAL_IDENTIFICATION: Ul = metadict_item_key!(0x04, 0x03);
const MD_IS_UNIQUE_IDENTIFIER: Ul = metadict_item_key!(0x04, 0x04);
const MD_INTEGER_SIZE: Ul = metadict_item_key!(0x05, 0x01);
const MD_INTEGER_IS_SIGNED: Ul = metadict_item_key!(0x05, 0x02);
const MD_STRING_ELEMENT_TYPE: Ul = metadict_item_key!(0x06, 0x01);
const MD_ARRAY_ELEMENT_TYPE: Ul = metadict_item_key!(0x07, 0x01);
const MD_ARRAY_ELEMENT_COUNT: Ul = metadict_item_key!(0x07, 0x02);
const MD_REFERENCED_TYPE: Ul = metadict_item_key!(0x09, 0x01);

/// A `(owning set index, item key, target identification)` triplet recorded while the catalogue
/// is under construction; resolved to the target's actual instance UID in
/// [`MetaDictionaryBuilder::finalize`].
struct PendingWeakRef {
    set_index: usize,
    item_key: Ul,
    target_identification: Ul,
}

/// Builds the `MetaDictionary` set graph incrementally, then emits it into a [`HeaderMetadata`]
/// arena in one shot. Every `add_*` method takes a synthetic `identification` (§4.12: "a table of
/// class definitions and property definitions") rather than a real AAF-registered AUID, since
/// Avid's catalogue only needs internal consistency between a `ParentClass`/`Type` reference and
/// the definition it points at, not external interchange with a real AAF application.
pub struct MetaDictionaryBuilder {
    sets: Vec<Set>,
    meta_dict_index: usize,
    class_uids: Vec<Uuid>,
    type_uids: Vec<Uuid>,
    identification_to_instance: HashMap<Ul, Uuid>,
    pending_weak_refs: Vec<PendingWeakRef>,
}

impl MetaDictionaryBuilder {
    pub fn new() -> Self {
        let meta_dict = Set::new(META_DICTIONARY_CLASS, Uuid::new_v4());
        MetaDictionaryBuilder {
            sets: vec![meta_dict],
            meta_dict_index: 0,
            class_uids: Vec::new(),
            type_uids: Vec::new(),
            identification_to_instance: HashMap::new(),
            pending_weak_refs: Vec::new(),
        }
    }

    fn push_set(&mut self, set: Set) -> usize {
        let idx = self.sets.len();
        self.sets.push(set);
        idx
    }

    fn record_weak_ref(&mut self, set_index: usize, item_key: Ul, target_identification: Ul) {
        self.pending_weak_refs.push(PendingWeakRef { set_index, item_key, target_identification });
    }

    fn append_strong_ref(&mut self, owner_index: usize, item_key: Ul, target: Uuid) {
        let mut refs = self.sets[owner_index].uuid_array(&item_key).unwrap_or_default();
        refs.push(target);
        self.sets[owner_index].set_uuid_array(item_key, &refs);
    }

    /// `ClassDefinition` (§4.12): `parent` is `None` only for the single synthetic root this
    /// module always adds first (see `add_root_class`); every other class's `ParentClass` weak
    /// reference is resolved against `parent`'s identification at [`finalize`](Self::finalize).
    pub fn add_class(&mut self, identification: Ul, name: &str, parent: Option<Ul>, is_concrete: bool) -> usize {
        let mut set = Set::new(CLASS_DEFINITION, Uuid::new_v4());
        set.set_raw(MD_IDENTIFICATION, identification.as_bytes().to_vec());
        set.set_string_utf16be(MD_NAME, name);
        set.set_raw(MD_IS_CONCRETE, vec![u8::from(is_concrete)]);
        set.set_raw(MD_PARENT_CLASS, [0u8; 16].to_vec());

        let instance_uid = set.instance_uid;
        self.identification_to_instance.insert(identification, instance_uid);
        self.class_uids.push(instance_uid);

        let idx = self.push_set(set);
        if let Some(parent_id) = parent {
            self.record_weak_ref(idx, MD_PARENT_CLASS, parent_id);
        }
        idx
    }

    /// `PropertyDefinition` (§4.12): owned by `class_index`'s `Properties` strong-reference array;
    /// `local_tag` is the primer tag this property's item actually carries elsewhere in the file
    /// (§4.3's "dynamic tags" — pre-allocating it here through the same [`Primer`] the rest of the
    /// header metadata is written through keeps the two in lockstep).
    pub fn add_property(
        &mut self,
        primer: &mut Primer,
        class_index: usize,
        identification: Ul,
        name: &str,
        item_key: Ul,
        fixed_tag: Option<u16>,
        type_identification: Ul,
        is_optional: bool,
        is_unique_identifier: bool,
    ) {
        let local_tag = primer.tag_for(item_key, fixed_tag);

        let mut set = Set::new(PROPERTY_DEFINITION, Uuid::new_v4());
        set.set_raw(MD_IDENTIFICATION, identification.as_bytes().to_vec());
        set.set_string_utf16be(MD_NAME, name);
        set.set_raw(MD_PROPERTY_TYPE, [0u8; 16].to_vec());
        set.set_raw(MD_IS_OPTIONAL, vec![u8::from(is_optional)]);
        set.set_raw(MD_LOCAL_IDENTIFICATION, local_tag.to_be_bytes().to_vec());
        if is_unique_identifier {
            set.set_raw(MD_IS_UNIQUE_IDENTIFIER, vec![1]);
        }

        let instance_uid = set.instance_uid;
        let idx = self.push_set(set);
        self.record_weak_ref(idx, MD_PROPERTY_TYPE, type_identification);
        self.append_strong_ref(class_index, MD_PROPERTIES, instance_uid);
    }

    fn add_typedef(&mut self, set_key: Ul, identification: Ul, name: &str) -> usize {
        let mut set = Set::new(set_key, Uuid::new_v4());
        set.set_raw(MD_IDENTIFICATION, identification.as_bytes().to_vec());
        set.set_string_utf16be(MD_NAME, name);

        let instance_uid = set.instance_uid;
        self.identification_to_instance.insert(identification, instance_uid);
        self.type_uids.push(instance_uid);
        self.push_set(set)
    }

    /// `TypeDefinitionInteger`: a fixed-width `size`-byte integer, signed or not.
    pub fn add_typedef_integer(&mut self, identification: Ul, name: &str, size: u8, is_signed: bool) {
        let idx = self.add_typedef(TYPE_DEFINITION_INTEGER, identification, name);
        self.sets[idx].set_raw(MD_INTEGER_SIZE, vec![size]);
        self.sets[idx].set_raw(MD_INTEGER_IS_SIGNED, vec![u8::from(is_signed)]);
    }

    /// `TypeDefinitionCharacter`: a single UTF-16 code unit, the element type of
    /// [`add_typedef_string`](Self::add_typedef_string).
    pub fn add_typedef_character(&mut self, identification: Ul, name: &str) {
        self.add_typedef(TYPE_DEFINITION_CHARACTER, identification, name);
    }

    /// `TypeDefinitionString`: a variable-length string of `element_type` characters.
    pub fn add_typedef_string(&mut self, identification: Ul, name: &str, element_type: Ul) {
        let idx = self.add_typedef(TYPE_DEFINITION_STRING, identification, name);
        self.sets[idx].set_raw(MD_STRING_ELEMENT_TYPE, [0u8; 16].to_vec());
        self.record_weak_ref(idx, MD_STRING_ELEMENT_TYPE, element_type);
    }

    /// `TypeDefinitionFixedArray`: a fixed-`count` array of `element_type`, e.g. the 16 octets of
    /// a UUID modelled as a fixed array of `UInt8`.
    pub fn add_typedef_fixed_array(&mut self, identification: Ul, name: &str, element_type: Ul, count: u32) {
        let idx = self.add_typedef(TYPE_DEFINITION_FIXED_ARRAY, identification, name);
        self.sets[idx].set_raw(MD_ARRAY_ELEMENT_TYPE, [0u8; 16].to_vec());
        self.sets[idx].set_raw(MD_ARRAY_ELEMENT_COUNT, count.to_be_bytes().to_vec());
        self.record_weak_ref(idx, MD_ARRAY_ELEMENT_TYPE, element_type);
    }

    /// `TypeDefinitionVariableArray`: a `StrongRefArray`/`WeakRefArray`-shaped batch of
    /// `element_type`.
    pub fn add_typedef_variable_array(&mut self, identification: Ul, name: &str, element_type: Ul) {
        let idx = self.add_typedef(TYPE_DEFINITION_VARIABLE_ARRAY, identification, name);
        self.sets[idx].set_raw(MD_ARRAY_ELEMENT_TYPE, [0u8; 16].to_vec());
        self.record_weak_ref(idx, MD_ARRAY_ELEMENT_TYPE, element_type);
    }

    /// `TypeDefinitionStrongObjectReference`/`TypeDefinitionWeakObjectReference`: an object
    /// reference restricted to instances of `referenced_class` (or its subclasses).
    pub fn add_typedef_object_reference(&mut self, identification: Ul, name: &str, referenced_class: Ul, strong: bool) {
        let set_key = if strong { TYPE_DEFINITION_STRONG_OBJECT_REFERENCE } else { TYPE_DEFINITION_WEAK_OBJECT_REFERENCE };
        let idx = self.add_typedef(set_key, identification, name);
        self.sets[idx].set_raw(MD_REFERENCED_TYPE, [0u8; 16].to_vec());
        self.record_weak_ref(idx, MD_REFERENCED_TYPE, referenced_class);
    }

    /// `TypeDefinitionRecord`/`TypeDefinitionOpaque`: a named type with no further structure this
    /// catalogue models (§9's Open Question decision below on how far this goes).
    pub fn add_typedef_opaque(&mut self, identification: Ul, name: &str, is_record: bool) {
        let set_key = if is_record { TYPE_DEFINITION_RECORD } else { TYPE_DEFINITION_OPAQUE };
        self.add_typedef(set_key, identification, name);
    }

    /// Resolves every recorded `ParentClass`/`Type`/element-type weak reference against the
    /// identification it was recorded under, fills in the `MetaDictionary`'s own
    /// `ClassDefinitions`/`TypeDefinitions` arrays, and inserts every set built so far into
    /// `header_metadata` in construction order. Returns the `MetaDictionary` set's instance UID.
    pub fn finalize(mut self, header_metadata: &mut HeaderMetadata) -> Result<Uuid> {
        for pending in &self.pending_weak_refs {
            let target = self
                .identification_to_instance
                .get(&pending.target_identification)
                .copied()
                .unwrap_or_else(Uuid::nil);
            self.sets[pending.set_index].set_raw(pending.item_key, target.as_bytes().to_vec());
        }

        self.sets[self.meta_dict_index].set_uuid_array(MD_CLASS_DEFINITIONS, &self.class_uids);
        self.sets[self.meta_dict_index].set_uuid_array(MD_TYPE_DEFINITIONS, &self.type_uids);

        let meta_dict_uid = self.sets[self.meta_dict_index].instance_uid;
        for set in self.sets {
            header_metadata.insert(set);
        }
        Ok(meta_dict_uid)
    }
}

impl Default for MetaDictionaryBuilder {
    fn default() -> Self {
        MetaDictionaryBuilder::new()
    }
}

/// Synthetic identification for the universal base class every other class derives from when the
/// baseline data model (`metadata/datamodel.rs`) doesn't itself record a parent (its `ClassDef`
/// table is flattened rather than modelling the full AAF abstract hierarchy, see that module's own
/// doc comment). Mirrors AAF's `InterchangeObject`.
const INTERCHANGE_OBJECT_ID: Ul = metadict_item_key!(0xff, 0x01);

const TYPE_U8_ID: Ul = metadict_item_key!(0xf0, 0x01);
const TYPE_U16_ID: Ul = metadict_item_key!(0xf0, 0x02);
const TYPE_U32_ID: Ul = metadict_item_key!(0xf0, 0x03);
const TYPE_U64_ID: Ul = metadict_item_key!(0xf0, 0x04);
const TYPE_I32_ID: Ul = metadict_item_key!(0xf0, 0x05);
const TYPE_I64_ID: Ul = metadict_item_key!(0xf0, 0x06);
const TYPE_RATIONAL_ID: Ul = metadict_item_key!(0xf0, 0x07);
const TYPE_CHARACTER_ID: Ul = metadict_item_key!(0xf0, 0x08);
const TYPE_UTF16STRING_ID: Ul = metadict_item_key!(0xf0, 0x09);
const TYPE_UUID_ID: Ul = metadict_item_key!(0xf0, 0x0a);
const TYPE_STRONG_REF_ID: Ul = metadict_item_key!(0xf0, 0x0b);
const TYPE_WEAK_REF_ID: Ul = metadict_item_key!(0xf0, 0x0c);
const TYPE_STRONG_REF_ARRAY_ID: Ul = metadict_item_key!(0xf0, 0x0d);
const TYPE_WEAK_REF_ARRAY_ID: Ul = metadict_item_key!(0xf0, 0x0e);
const TYPE_RAW_ID: Ul = metadict_item_key!(0xf0, 0x0f);

/// Builds the primitive type catalogue every property definition references (§4.12): one
/// `TypeDefinition*` per [`ItemType`] variant this engine's `Set` accessors understand, plus
/// `StrongReference`/`WeakReference` batch variants for the array item types. Built once per
/// catalogue since every property of every class shares the same handful of primitive shapes.
fn add_primitive_types(builder: &mut MetaDictionaryBuilder) {
    builder.add_typedef_integer(TYPE_U8_ID, "UInt8", 1, false);
    builder.add_typedef_integer(TYPE_U16_ID, "UInt16", 2, false);
    builder.add_typedef_integer(TYPE_U32_ID, "UInt32", 4, false);
    builder.add_typedef_integer(TYPE_U64_ID, "UInt64", 8, false);
    builder.add_typedef_integer(TYPE_I32_ID, "Int32", 4, true);
    builder.add_typedef_integer(TYPE_I64_ID, "Int64", 8, true);
    builder.add_typedef_opaque(TYPE_RATIONAL_ID, "Rational", true);
    builder.add_typedef_character(TYPE_CHARACTER_ID, "Character");
    builder.add_typedef_string(TYPE_UTF16STRING_ID, "UTF16String", TYPE_CHARACTER_ID);
    builder.add_typedef_fixed_array(TYPE_UUID_ID, "UUID", TYPE_U8_ID, 16);
    builder.add_typedef_object_reference(TYPE_STRONG_REF_ID, "StrongReference", INTERCHANGE_OBJECT_ID, true);
    builder.add_typedef_object_reference(TYPE_WEAK_REF_ID, "WeakReference", INTERCHANGE_OBJECT_ID, false);
    builder.add_typedef_variable_array(TYPE_STRONG_REF_ARRAY_ID, "StrongReferenceArray", TYPE_STRONG_REF_ID);
    builder.add_typedef_variable_array(TYPE_WEAK_REF_ARRAY_ID, "WeakReferenceArray", TYPE_WEAK_REF_ID);
    builder.add_typedef_opaque(TYPE_RAW_ID, "Opaque", false);
}

fn type_identification_for(item_type: ItemType) -> Ul {
    match item_type {
        ItemType::U8 => TYPE_U8_ID,
        ItemType::U16 => TYPE_U16_ID,
        ItemType::U32 => TYPE_U32_ID,
        ItemType::U64 => TYPE_U64_ID,
        ItemType::I32 => TYPE_I32_ID,
        ItemType::I64 => TYPE_I64_ID,
        ItemType::Rational => TYPE_RATIONAL_ID,
        ItemType::Utf16String => TYPE_UTF16STRING_ID,
        ItemType::Uuid => TYPE_UUID_ID,
        ItemType::StrongRef => TYPE_STRONG_REF_ID,
        ItemType::WeakRef => TYPE_WEAK_REF_ID,
        ItemType::StrongRefArray => TYPE_STRONG_REF_ARRAY_ID,
        ItemType::WeakRefArray => TYPE_WEAK_REF_ARRAY_ID,
        ItemType::Raw => TYPE_RAW_ID,
    }
}

/// Walks `class.parent` (by name, through `data_model`) from every class already in `needed`,
/// adding every ancestor so [`add_classes`] never builds a `ClassDefinition` whose `ParentClass`
/// can't resolve.
fn collect_needed_classes(data_model: &DataModel, seed: impl Iterator<Item = Ul>, needed: &mut Vec<Ul>, seen: &mut HashSet<Ul>) {
    let mut frontier: Vec<Ul> = seed.filter(|key| seen.insert(*key)).collect();
    needed.extend(frontier.iter().copied());

    while let Some(key) = frontier.pop() {
        let Some(class) = data_model.find_class(&key) else { continue };
        let Some(parent_name) = class.parent else { continue };
        let Some(parent) = data_model.find_class_by_name(parent_name) else { continue };
        if seen.insert(parent.key) {
            needed.push(parent.key);
            frontier.push(parent.key);
        }
    }
}

fn add_classes(builder: &mut MetaDictionaryBuilder, data_model: &DataModel, needed: &[Ul]) -> HashMap<Ul, usize> {
    builder.add_class(INTERCHANGE_OBJECT_ID, "InterchangeObject", None, false);

    let mut indices = HashMap::with_capacity(needed.len());
    for key in needed {
        let Some(class) = data_model.find_class(key) else { continue };
        let parent_id = match class.parent.and_then(|name| data_model.find_class_by_name(name)) {
            Some(parent) => parent.key,
            None => INTERCHANGE_OBJECT_ID,
        };
        let idx = builder.add_class(class.key, class.name, Some(parent_id), true);
        indices.insert(class.key, idx);
    }
    indices
}

/// Builds and inserts the default meta-dictionary (§4.12): every class actually present in
/// `header_metadata` (plus its ancestors, so every `ParentClass` reference resolves), and every
/// distinct item key actually used on an instance of each class, typed through
/// [`add_primitive_types`]. Returns the `MetaDictionary` set's instance UID.
///
/// Call this after every other set has been inserted into `header_metadata` (so the scan sees the
/// complete file) but before [`HeaderMetadata::write_all`] runs (so the property definitions'
/// `LocalIdentification` values are pre-allocated through the same `primer` the rest of the header
/// metadata is written through, and therefore agree with it).
pub fn embed_default_metadictionary(data_model: &DataModel, header_metadata: &mut HeaderMetadata, primer: &mut Primer) -> Result<Uuid> {
    let mut used_classes = Vec::new();
    let mut seen_classes = HashSet::new();
    collect_needed_classes(data_model, header_metadata.iter().map(|set| set.key), &mut used_classes, &mut seen_classes);

    let mut items_by_class: HashMap<Ul, Vec<Ul>> = HashMap::new();
    let mut seen_items: HashMap<Ul, HashSet<Ul>> = HashMap::new();
    for set in header_metadata.iter() {
        let seen = seen_items.entry(set.key).or_default();
        for (item_key, _) in set.items() {
            if item_key.matches_ignoring_version(&INSTANCE_UID_ITEM) {
                continue;
            }
            if seen.insert(*item_key) {
                items_by_class.entry(set.key).or_default().push(*item_key);
            }
        }
    }

    let mut builder = MetaDictionaryBuilder::new();
    add_primitive_types(&mut builder);
    let class_indices = add_classes(&mut builder, data_model, &used_classes);

    for key in &used_classes {
        let Some(&class_index) = class_indices.get(key) else { continue };
        let Some(item_keys) = items_by_class.get(key) else { continue };
        for item_key in item_keys {
            let Some(item_def) = data_model.find_item(item_key) else { continue };
            let type_id = type_identification_for(item_def.item_type);
            builder.add_property(
                primer,
                class_index,
                item_def.key,
                item_def.name,
                *item_key,
                item_def.local_tag,
                type_id,
                !item_def.required,
                false,
            );
        }
    }

    builder.finalize(header_metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_weak_ref_resolves_to_target_instance_uid() {
        let mut builder = MetaDictionaryBuilder::new();
        let parent_id = metadict_item_key!(0x01, 0x01);
        let child_id = metadict_item_key!(0x01, 0x02);

        builder.add_class(parent_id, "Parent", None, false);
        builder.add_class(child_id, "Child", Some(parent_id), true);

        let mut header_metadata = HeaderMetadata::new();
        let meta_dict_uid = builder.finalize(&mut header_metadata).unwrap();

        let meta_dict = header_metadata.by_uid(&meta_dict_uid).unwrap();
        let class_uids = meta_dict.uuid_array(&MD_CLASS_DEFINITIONS).unwrap();
        assert_eq!(class_uids.len(), 2);

        let parent_set = header_metadata.by_uid(&class_uids[0]).unwrap();
        let child_set = header_metadata.by_uid(&class_uids[1]).unwrap();

        assert_eq!(child_set.uuid(&MD_PARENT_CLASS), Some(parent_set.instance_uid));
        assert_eq!(parent_set.raw(&MD_PARENT_CLASS), Some(&[0u8; 16][..]));
    }

    #[test]
    fn verify_default_metadictionary_embeds_used_classes_and_properties() {
        let data_model = DataModel::standard();
        let mut header_metadata = HeaderMetadata::new();
        let mut primer = Primer::new();

        let mut preface = Set::new(data_model.find_class_by_name("Preface").unwrap().key, Uuid::new_v4());
        preface.set_raw(metadict_item_key!(0x99, 0x99), vec![]);
        header_metadata.insert(preface);

        let before = header_metadata.len();
        let meta_dict_uid = embed_default_metadictionary(&data_model, &mut header_metadata, &mut primer).unwrap();

        assert!(header_metadata.len() > before);
        let meta_dict = header_metadata.by_uid(&meta_dict_uid).unwrap();
        assert_eq!(meta_dict.key, META_DICTIONARY_CLASS);

        let class_uids = meta_dict.uuid_array(&MD_CLASS_DEFINITIONS).unwrap();
        let has_preface = class_uids.iter().any(|uid| {
            let set = header_metadata.by_uid(uid).unwrap();
            set.string_utf16be(&MD_NAME).as_deref() == Some("Preface")
        });
        assert!(has_preface, "expected a ClassDefinition named Preface");

        // InterchangeObject is the synthetic root every class ultimately derives from and is
        // always present, even though no header-metadata set literally carries its key.
        let has_root = class_uids.iter().any(|uid| {
            let set = header_metadata.by_uid(uid).unwrap();
            set.string_utf16be(&MD_NAME).as_deref() == Some("InterchangeObject")
        });
        assert!(has_root);
    }
}
