// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed views over the generic [`Set`] graph (§3.4): `Preface`, `MaterialPackage`/`SourcePackage`,
//! `Track`, `Sequence`, and the component kinds. Each view borrows a `Set` plus the owning
//! `HeaderMetadata` and exposes named accessors instead of raw item ULs; polymorphic operations
//! (e.g. "what kind of component is this") become a match over the set's class UL (§9).

use mxf_core::key::Ul;

use super::datamodel::DataModel;
use super::set::Set;
use super::HeaderMetadata;

macro_rules! item_key {
    ($b0:expr, $b1:expr) => {
        Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x06, 0x01, 0x01, $b0, $b1, 0x00, 0x00, 0x00])
    };
}

const CONTENT_STORAGE: Ul = item_key!(0x06, 0x01);
const PACKAGES: Ul = item_key!(0x06, 0x03);
const PACKAGE_UID: Ul = item_key!(0x06, 0x05);
const PACKAGE_TRACKS: Ul = item_key!(0x06, 0x06);
const ESSENCE_DESCRIPTOR: Ul = item_key!(0x06, 0x07);
const TRACK_ID: Ul = item_key!(0x06, 0x08);
const TRACK_SEGMENT: Ul = item_key!(0x06, 0x0a);
const EDIT_RATE: Ul = item_key!(0x06, 0x0b);
const COMPONENT_DATA_DEFINITION: Ul = item_key!(0x06, 0x0c);
const COMPONENT_DURATION: Ul = item_key!(0x06, 0x0d);
const SEQUENCE_COMPONENTS: Ul = item_key!(0x06, 0x0e);
const SOURCE_PACKAGE_ID: Ul = item_key!(0x06, 0x0f);
const SOURCE_TRACK_ID: Ul = item_key!(0x06, 0x10);
const START_POSITION: Ul = item_key!(0x06, 0x11);
const START_TIMECODE: Ul = item_key!(0x06, 0x13);
const ROUNDED_TIMECODE_BASE: Ul = item_key!(0x06, 0x12);
const DROP_FRAME: Ul = item_key!(0x06, 0x14);
const PACKAGE_NAME: Ul = item_key!(0x06, 0x2c);

pub struct Preface<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> Preface<'a> {
    pub fn content_storage(&self) -> Option<ContentStorage<'a>> {
        self.md.resolve_ref(self.set, &CONTENT_STORAGE).map(|set| ContentStorage { set, md: self.md })
    }
}

pub struct ContentStorage<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> ContentStorage<'a> {
    pub fn packages(&self) -> Vec<GenericPackage<'a>> {
        self.md.resolve_ref_array(self.set, &PACKAGES).into_iter().map(|set| GenericPackage { set, md: self.md }).collect()
    }
}

/// Either a `MaterialPackage` or a `SourcePackage`; both share the `PackageUID`/`Tracks` shape
/// (§3.4), so one view suffices and callers narrow with [`GenericPackage::descriptor`] being
/// `None` for a material package.
pub struct GenericPackage<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> GenericPackage<'a> {
    pub fn package_uid(&self) -> Option<uuid::Uuid> {
        self.set.uuid(&PACKAGE_UID)
    }

    pub fn name(&self) -> Option<String> {
        self.set.string_utf16be(&PACKAGE_NAME)
    }

    pub fn tracks(&self) -> Vec<Track<'a>> {
        self.md.resolve_ref_array(self.set, &PACKAGE_TRACKS).into_iter().map(|set| Track { set, md: self.md }).collect()
    }

    /// `Some` for a `SourcePackage` with a file/tape/import descriptor; `None` for a
    /// `MaterialPackage` or an `EssenceData` stub with no descriptor attached.
    pub fn descriptor(&self) -> Option<&'a Set> {
        self.md.resolve_ref(self.set, &ESSENCE_DESCRIPTOR)
    }

    pub fn is_source_package(&self, data_model: &DataModel) -> bool {
        data_model.find_class(&self.set.key).map(|c| c.name == "SourcePackage").unwrap_or(false)
    }
}

pub struct Track<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> Track<'a> {
    pub fn track_id(&self) -> Option<u32> {
        self.set.u32(&TRACK_ID)
    }

    pub fn edit_rate(&self) -> Option<(i32, i32)> {
        self.set.rational(&EDIT_RATE)
    }

    pub fn sequence(&self) -> Option<Sequence<'a>> {
        self.md.resolve_ref(self.set, &TRACK_SEGMENT).map(|set| Sequence { set, md: self.md })
    }
}

pub struct Sequence<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> Sequence<'a> {
    pub fn data_definition(&self) -> Option<&[u8]> {
        self.set.raw(&COMPONENT_DATA_DEFINITION)
    }

    pub fn duration(&self) -> Option<i64> {
        self.set.i64(&COMPONENT_DURATION)
    }

    pub fn components(&self, data_model: &DataModel) -> Vec<Component<'a>> {
        self.md
            .resolve_ref_array(self.set, &SEQUENCE_COMPONENTS)
            .into_iter()
            .map(|set| Component::classify(set, self.md, data_model))
            .collect()
    }
}

pub struct SourceClip<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> SourceClip<'a> {
    pub fn source_package_id(&self) -> Option<uuid::Uuid> {
        self.set.uuid(&SOURCE_PACKAGE_ID)
    }

    pub fn source_track_id(&self) -> Option<u32> {
        self.set.u32(&SOURCE_TRACK_ID)
    }

    pub fn start_position(&self) -> Option<i64> {
        self.set.i64(&START_POSITION)
    }
}

pub struct TimecodeComponent<'a> {
    pub set: &'a Set,
}

impl<'a> TimecodeComponent<'a> {
    pub fn start_timecode(&self) -> Option<i64> {
        self.set.i64(&START_TIMECODE)
    }

    pub fn rounded_timecode_base(&self) -> Option<u16> {
        self.set.u16(&ROUNDED_TIMECODE_BASE)
    }

    pub fn drop_frame(&self) -> bool {
        self.set.u8(&DROP_FRAME).unwrap_or(0) != 0
    }
}

pub struct FillerComponent<'a> {
    pub set: &'a Set,
}

pub struct DMSegmentComponent<'a> {
    pub set: &'a Set,
}

pub struct NestedScopeComponent<'a> {
    pub set: &'a Set,
    pub md: &'a HeaderMetadata,
}

impl<'a> NestedScopeComponent<'a> {
    pub fn choices(&self, data_model: &DataModel) -> Vec<Component<'a>> {
        self.md
            .resolve_ref_array(self.set, &SEQUENCE_COMPONENTS)
            .into_iter()
            .map(|set| Component::classify(set, self.md, data_model))
            .collect()
    }
}

/// A structural component, classified by its set's class name (§3.4: SourceClip,
/// TimecodeComponent, Filler, DMSegment, NestedScope).
pub enum Component<'a> {
    SourceClip(SourceClip<'a>),
    Timecode(TimecodeComponent<'a>),
    Filler(FillerComponent<'a>),
    DMSegment(DMSegmentComponent<'a>),
    NestedScope(NestedScopeComponent<'a>),
    Unknown(&'a Set),
}

impl<'a> Component<'a> {
    fn classify(set: &'a Set, md: &'a HeaderMetadata, data_model: &DataModel) -> Component<'a> {
        let Some(class) = data_model.find_class(&set.key) else {
            return Component::Unknown(set);
        };

        match class.name {
            "SourceClip" => Component::SourceClip(SourceClip { set, md }),
            "TimecodeComponent" => Component::Timecode(TimecodeComponent { set }),
            "Filler" => Component::Filler(FillerComponent { set }),
            "DMSegment" => Component::DMSegment(DMSegmentComponent { set }),
            "NestedScope" => Component::NestedScope(NestedScopeComponent { set, md }),
            _ => Component::Unknown(set),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{datamodel::DataModel, HeaderMetadata};
    use uuid::Uuid;

    fn class_key(name: &str, dm: &DataModel) -> Ul {
        dm.find_class_by_name(name).unwrap().key
    }

    #[test]
    fn verify_package_track_sequence_walk() {
        let dm = DataModel::standard();
        let mut md = HeaderMetadata::new();

        let mut sequence = Set::new(class_key("Sequence", &dm), Uuid::from_bytes([3; 16]));
        sequence.set_raw(COMPONENT_DURATION, 10i64.to_be_bytes().to_vec());
        let sequence_idx = md.insert(sequence);

        let mut track = Set::new(class_key("Track", &dm), Uuid::from_bytes([2; 16]));
        track.set_raw(TRACK_ID, 1u32.to_be_bytes().to_vec());
        track.set_raw(TRACK_SEGMENT, md.get(sequence_idx).instance_uid.as_bytes().to_vec());
        let track_idx = md.insert(track);

        let mut package = Set::new(class_key("MaterialPackage", &dm), Uuid::from_bytes([1; 16]));
        package.set_uuid_array(PACKAGE_TRACKS, std::slice::from_ref(&md.get(track_idx).instance_uid));
        md.insert(package);

        let package_set = md.by_uid(&Uuid::from_bytes([1; 16])).unwrap();
        let view = GenericPackage { set: package_set, md: &md };
        let tracks = view.tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id(), Some(1));

        let seq = tracks[0].sequence().unwrap();
        assert_eq!(seq.duration(), Some(10));
    }
}
