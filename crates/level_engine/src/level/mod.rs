mod export;
mod fields;
mod objects;
mod plist;
mod resolver;
mod storage;

pub use export::{write_level_file, ExportError};
pub use fields::{looks_like_field_record, parse_fields, FieldValue, LevelDocument, LevelField};
pub use objects::{
    parse_body, parse_header, parse_objects, GroupId, LevelHeader, MoveTrigger, ObjectId,
    ObjectKind, ObjectRecord, ObjectRecords, ParseIssue, ParsedBody, Vec2, MOVE_TRIGGER_TYPE_ID,
};
pub use plist::{looks_like_plist, parse_plist_level, PlistError, PlistLevel};
pub use resolver::{LevelSource, LevelSourceResolver};
pub use storage::{FsStorage, LevelStorage, MemoryStorage};
