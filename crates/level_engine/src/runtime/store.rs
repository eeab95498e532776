use std::collections::{BTreeSet, HashMap};

use crate::level::{GroupId, ObjectId, ObjectKind, ObjectRecord, Vec2};

/// A placement object owned by a running level.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub type_id: u32,
    pub kind: ObjectKind,
    pub position: Vec2,
    pub rotation: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub scale: f32,
    pub groups: BTreeSet<GroupId>,
    pub section: usize,
}

impl PlacedObject {
    pub fn from_record(id: ObjectId, record: ObjectRecord, section: usize) -> Self {
        Self {
            id,
            type_id: record.type_id,
            kind: record.kind,
            position: record.position,
            rotation: record.rotation,
            flip_x: record.flip_x,
            flip_y: record.flip_y,
            scale: record.scale,
            groups: record.groups,
            section,
        }
    }
}

/// Arena of placed objects; an [`ObjectId`] is the object's slot index.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    objects: Vec<PlacedObject>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> ObjectId {
        ObjectId(self.objects.len())
    }

    pub(crate) fn push(&mut self, object: PlacedObject) -> ObjectId {
        let id = object.id;
        debug_assert_eq!(id, self.next_id());
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&PlacedObject> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut PlacedObject> {
        self.objects.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Group membership, kept in object insertion order.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    members: HashMap<GroupId, Vec<ObjectId>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, group: GroupId, id: ObjectId) {
        let members = self.members.entry(group).or_default();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    pub fn members(&self, group: GroupId) -> &[ObjectId] {
        self.members.get(&group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.members.len()
    }
}
