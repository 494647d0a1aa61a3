// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The header-metadata data model (§4.3): a class hierarchy with item definitions, each carrying
//! `{name, UL, type, required}`. Loaded once per reader/writer; classifying a set or an item is a
//! linear scan over these small tables rather than a generated lookup, since the baseline model
//! is a few dozen entries and the tables are rebuilt so rarely that a hash map buys nothing.

use mxf_core::key::Ul;

/// The decoded shape of an item's value, used by [`super::set::Set`]'s typed accessors and by the
/// primer/writer to decide whether a reference is strong (owned, serialised inline in the arena)
/// or weak (identity lookup, §3.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemType {
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
    Rational,
    Utf16String,
    Uuid,
    StrongRef,
    WeakRef,
    StrongRefArray,
    WeakRefArray,
    Raw,
}

#[derive(Copy, Clone, Debug)]
pub struct ItemDef {
    pub name: &'static str,
    pub key: Ul,
    /// `None` for items with no standard fixed tag; the primer allocates a dynamic tag instead.
    pub local_tag: Option<u16>,
    pub item_type: ItemType,
    pub required: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct ClassDef {
    pub name: &'static str,
    pub key: Ul,
    pub parent: Option<&'static str>,
}

pub struct DataModel {
    classes: Vec<ClassDef>,
    items: Vec<ItemDef>,
}

/// The `InstanceUID` item key (local tag `3C0A`), needed before a `DataModel` lookup is possible
/// since it identifies the set itself (§4.3 point 4).
pub const INSTANCE_UID_ITEM: Ul =
    Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x06, 0x01, 0x01, 0x01, 0x02, 0x00, 0x00, 0x00]);

macro_rules! cls {
    ($name:expr, $byte:expr, $parent:expr) => {
        ClassDef {
            name: $name,
            key: Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, 0x01, 0x01, 0x01, $byte, 0x00, 0x00]),
            parent: $parent,
        }
    };
}

macro_rules! item {
    ($name:expr, $b0:expr, $b1:expr, $tag:expr, $ty:expr, $req:expr) => {
        ItemDef {
            name: $name,
            key: Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x06, 0x01, 0x01, $b0, $b1, 0x00, 0x00, 0x00]),
            local_tag: $tag,
            item_type: $ty,
            required: $req,
        }
    };
}

impl DataModel {
    /// The class and item set this engine understands out of the box (§3.4, §4.3): Preface,
    /// Identification, ContentStorage, EssenceContainerData, the package hierarchy, Track,
    /// Sequence, the component kinds, and the descriptor family used by C4.
    pub fn standard() -> Self {
        let classes = vec![
            cls!("Preface", 0x2a, None),
            cls!("Identification", 0x30, None),
            cls!("ContentStorage", 0x18, None),
            cls!("EssenceContainerData", 0x23, None),
            cls!("MaterialPackage", 0x36, Some("GenericPackage")),
            cls!("SourcePackage", 0x37, Some("GenericPackage")),
            cls!("GenericPackage", 0x34, None),
            cls!("Track", 0x3b, None),
            cls!("Sequence", 0x0f, Some("StructuralComponent")),
            cls!("StructuralComponent", 0x01, None),
            cls!("SourceClip", 0x11, Some("StructuralComponent")),
            cls!("TimecodeComponent", 0x14, Some("StructuralComponent")),
            cls!("Filler", 0x09, Some("StructuralComponent")),
            cls!("DMSegment", 0x41, Some("StructuralComponent")),
            cls!("NestedScope", 0x0d, Some("StructuralComponent")),
            cls!("GenericDescriptor", 0x24, None),
            cls!("FileDescriptor", 0x25, Some("GenericDescriptor")),
            cls!("GenericPictureEssenceDescriptor", 0x27, Some("FileDescriptor")),
            cls!("CDCIEssenceDescriptor", 0x28, Some("GenericPictureEssenceDescriptor")),
            cls!("RGBAEssenceDescriptor", 0x29, Some("GenericPictureEssenceDescriptor")),
            cls!("GenericSoundEssenceDescriptor", 0x42, Some("FileDescriptor")),
            cls!("WaveAudioDescriptor", 0x48, Some("GenericSoundEssenceDescriptor")),
            cls!("MultipleDescriptor", 0x44, Some("FileDescriptor")),
            cls!("GenericDataEssenceDescriptor", 0x43, Some("FileDescriptor")),
            cls!("NetworkLocator", 0x32, None),
            cls!("MCALabelSubDescriptor", 0x70, None),
        ];

        let items = vec![
            item!("InstanceUID", 0x01, 0x02, Some(0x3c0a), ItemType::Uuid, true),
            item!("GenerationUID", 0x01, 0x02, Some(0x0102), ItemType::Uuid, false),
            item!("ContentStorage", 0x06, 0x01, Some(0x3b03), ItemType::StrongRef, true),
            item!("IdentificationList", 0x06, 0x02, Some(0x3b06), ItemType::StrongRefArray, true),
            item!("Packages", 0x06, 0x03, Some(0x3b04), ItemType::StrongRefArray, true),
            item!("EssenceContainerDataList", 0x06, 0x04, Some(0x3b05), ItemType::StrongRefArray, false),
            item!("PackageUID", 0x06, 0x05, Some(0x4401), ItemType::Uuid, true),
            item!("PackageTracks", 0x06, 0x06, Some(0x4403), ItemType::StrongRefArray, true),
            item!("EssenceDescriptor", 0x06, 0x07, Some(0x4701), ItemType::StrongRef, false),
            item!("TrackID", 0x06, 0x08, Some(0x4801), ItemType::U32, true),
            item!("TrackNumber", 0x06, 0x09, Some(0x4804), ItemType::U32, false),
            item!("TrackSegment", 0x06, 0x0a, Some(0x4803), ItemType::StrongRef, true),
            item!("EditRateNum", 0x06, 0x0b, Some(0x4b01), ItemType::Rational, true),
            item!("ComponentDataDefinition", 0x06, 0x0c, Some(0x0201), ItemType::Raw, true),
            item!("ComponentDuration", 0x06, 0x0d, Some(0x0202), ItemType::I64, false),
            item!("SequenceComponents", 0x06, 0x0e, Some(0x1001), ItemType::StrongRefArray, true),
            item!("SourcePackageID", 0x06, 0x0f, Some(0x1101), ItemType::Uuid, true),
            item!("SourceTrackID", 0x06, 0x10, Some(0x1102), ItemType::U32, true),
            item!("StartPosition", 0x06, 0x11, Some(0x1201), ItemType::I64, true),
            item!("RoundedTimecodeBase", 0x06, 0x12, Some(0x1502), ItemType::U16, true),
            item!("StartTimecode", 0x06, 0x13, Some(0x1501), ItemType::I64, true),
            item!("DropFrame", 0x06, 0x14, Some(0x1503), ItemType::U8, true),
            item!("SampleRate", 0x06, 0x15, Some(0x3001), ItemType::Rational, true),
            item!("ContainerDuration", 0x06, 0x16, Some(0x3002), ItemType::I64, false),
            item!("EssenceContainerUL", 0x06, 0x17, Some(0x3004), ItemType::Raw, true),
            item!("LinkedTrackID", 0x06, 0x18, Some(0x3006), ItemType::U32, false),
            item!("StoredWidth", 0x06, 0x19, Some(0x3203), ItemType::U32, true),
            item!("StoredHeight", 0x06, 0x1a, Some(0x3202), ItemType::U32, true),
            item!("AspectRatio", 0x06, 0x1b, Some(0x320e), ItemType::Rational, true),
            item!("FrameLayout", 0x06, 0x1c, Some(0x3201), ItemType::U8, true),
            item!("PictureEssenceCoding", 0x06, 0x1d, Some(0x3201 + 1), ItemType::Raw, false),
            item!("ComponentDepth", 0x06, 0x1e, Some(0x3301), ItemType::U32, false),
            item!("HorizontalSubsampling", 0x06, 0x1f, Some(0x3302), ItemType::U32, false),
            item!("VerticalSubsampling", 0x06, 0x20, Some(0x3308), ItemType::U32, false),
            item!("ImageAlignmentOffset", 0x06, 0x21, Some(0x3311), ItemType::U32, false),
            item!("ImageStartOffset", 0x06, 0x22, Some(0x3307), ItemType::U32, false),
            item!("ImageEndOffset", 0x06, 0x23, Some(0x3309), ItemType::U32, false),
            item!("QuantizationBits", 0x06, 0x24, Some(0x3d01), ItemType::U32, false),
            item!("ChannelCount", 0x06, 0x25, Some(0x3d07), ItemType::U32, false),
            item!("AudioSamplingRate", 0x06, 0x26, Some(0x3d03), ItemType::Rational, false),
            item!("BlockAlign", 0x06, 0x27, Some(0x3d0a), ItemType::U16, false),
            item!("AvgBps", 0x06, 0x28, Some(0x3d09), ItemType::U32, false),
            item!("SubDescriptorUIDs", 0x06, 0x29, Some(0x3f01), ItemType::StrongRefArray, false),
            item!("FileDescriptors", 0x06, 0x2a, Some(0x3f01 + 1), ItemType::StrongRefArray, false),
            item!("URLString", 0x06, 0x2b, Some(0x4101), ItemType::Utf16String, true),
            item!("PackageName", 0x06, 0x2c, Some(0x4402), ItemType::Utf16String, false),
            item!("MCAChannelID", 0x06, 0x2d, Some(0x4601), ItemType::U32, false),
            item!("MCALabelDictionaryID", 0x06, 0x2e, Some(0x4602), ItemType::Uuid, false),
            item!("MCATagSymbol", 0x06, 0x2f, Some(0x4603), ItemType::Utf16String, false),
        ];

        DataModel { classes, items }
    }

    pub fn find_class(&self, key: &Ul) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.key.matches_ignoring_version(key))
    }

    pub fn find_class_by_name(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn find_item(&self, key: &Ul) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.key.matches_ignoring_version(key))
    }

    pub fn find_item_by_name(&self, name: &str) -> Option<&ItemDef> {
        self.items.iter().find(|i| i.name == name)
    }

    /// True if `child`'s class is `ancestor` or derives from it, walking the `parent` chain.
    pub fn is_a(&self, child: &str, ancestor: &str) -> bool {
        let mut current = child;
        loop {
            if current == ancestor {
                return true;
            }
            match self.find_class_by_name(current).and_then(|c| c.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_class_hierarchy_walk() {
        let dm = DataModel::standard();
        assert!(dm.is_a("SourcePackage", "GenericPackage"));
        assert!(dm.is_a("CDCIEssenceDescriptor", "FileDescriptor"));
        assert!(!dm.is_a("Track", "GenericPackage"));
    }

    #[test]
    fn verify_item_lookup_by_key_ignores_version() {
        let dm = DataModel::standard();
        let instance_uid = dm.find_item_by_name("InstanceUID").unwrap();
        let mut key_bytes = *instance_uid.key.as_bytes();
        key_bytes[7] = 0x0d;
        let found = dm.find_item(&Ul::new(key_bytes)).unwrap();
        assert_eq!(found.name, "InstanceUID");
    }
}
