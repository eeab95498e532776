use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, AddAssign, Mul, Sub};

use thiserror::Error;
use tracing::debug;

use super::fields::{parse_float_lenient, parse_int_lenient};

pub(crate) const RECORD_DELIMITER: char = ';';
pub(crate) const PAIR_DELIMITER: char = ',';
const GROUP_DELIMITER: char = '.';

pub const MOVE_TRIGGER_TYPE_ID: u32 = 901;

const KEY_TYPE_ID: u32 = 1;
const KEY_X: u32 = 2;
const KEY_Y: u32 = 3;
const KEY_FLIP_X: u32 = 4;
const KEY_FLIP_Y: u32 = 5;
const KEY_ROTATION: u32 = 6;
const KEY_DURATION: u32 = 10;
const KEY_OFFSET_X: u32 = 28;
const KEY_OFFSET_Y: u32 = 29;
const KEY_EASING: u32 = 30;
const KEY_SCALE: u32 = 32;
const KEY_TARGET_GROUP: u32 = 51;
const KEY_GROUPS: u32 = 57;
const KEY_EASING_RATE: u32 = 85;

/// Trigger object ids other than the move trigger. They are placed and
/// bucketed like any object but carry no runtime behavior here.
const TRIGGER_TYPE_IDS: &[u32] = &[
    22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 55, 56, 57, 58, 59, 104, 105, 221, 717,
    718, 743, 744, 899, 900, 915, 1006, 1007, 1049, 1268, 1346, 1347, 1520, 1585, 1595, 1611,
    1612, 1613, 1615, 1616, 1811, 1812, 1814, 1815, 1817, 1818, 1819,
];

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct MoveTrigger {
    pub duration_secs: f32,
    pub offset: Vec2,
    pub easing_id: u32,
    pub easing_rate: f32,
    pub target_group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Static,
    Trigger,
    MoveTrigger(MoveTrigger),
}

/// One placement record as read from a level body, before it is given an id
/// and a section by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub type_id: u32,
    pub kind: ObjectKind,
    pub position: Vec2,
    pub rotation: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub scale: f32,
    pub groups: BTreeSet<GroupId>,
}

impl ObjectRecord {
    fn at(type_id: u32, position: Vec2) -> Self {
        Self {
            type_id,
            kind: ObjectKind::Static,
            position,
            rotation: 0.0,
            flip_x: false,
            flip_y: false,
            scale: 1.0,
            groups: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIssue {
    #[error("malformed placement record {record_index}: {reason}")]
    MalformedRecord { record_index: usize, reason: String },
}

/// Lazy iterator over the placement records of a level body.
///
/// Header records and empty records are skipped silently; malformed records
/// are logged at debug level and skipped.
#[derive(Debug, Clone)]
pub struct ObjectRecords<'a> {
    records: std::iter::Enumerate<std::str::Split<'a, char>>,
}

impl<'a> ObjectRecords<'a> {
    /// Next record, surfacing malformed ones instead of skipping them.
    pub fn next_entry(&mut self) -> Option<Result<ObjectRecord, ParseIssue>> {
        loop {
            let (record_index, record) = self.records.next()?;
            let record = record.trim();
            if record.is_empty() || is_header_record(record) {
                continue;
            }
            return Some(parse_record(record_index, record));
        }
    }
}

impl Iterator for ObjectRecords<'_> {
    type Item = ObjectRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_entry()? {
                Ok(object) => return Some(object),
                Err(issue) => debug!(issue = %issue, "placement_record_skipped"),
            }
        }
    }
}

pub fn parse_objects(body: &str) -> ObjectRecords<'_> {
    ObjectRecords {
        records: body.split(RECORD_DELIMITER).enumerate(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody {
    pub header: LevelHeader,
    pub objects: Vec<ObjectRecord>,
    pub issues: Vec<ParseIssue>,
}

/// Eagerly parses a whole body, keeping the skipped record issues.
pub fn parse_body(body: &str) -> ParsedBody {
    let mut records = parse_objects(body);
    let mut objects = Vec::new();
    let mut issues = Vec::new();
    while let Some(entry) = records.next_entry() {
        match entry {
            Ok(object) => objects.push(object),
            Err(issue) => {
                debug!(issue = %issue, "placement_record_skipped");
                issues.push(issue);
            }
        }
    }

    ParsedBody {
        header: parse_header(body),
        objects,
        issues,
    }
}

/// Level-wide settings from the `kXX` header record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelHeader {
    settings: BTreeMap<String, String>,
}

impl LevelHeader {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn game_mode(&self) -> i64 {
        self.get("kA2").map(parse_int_lenient).unwrap_or(0)
    }

    pub fn speed(&self) -> i64 {
        self.get("kA4").map(parse_int_lenient).unwrap_or(0)
    }
}

pub fn parse_header(body: &str) -> LevelHeader {
    let mut header = LevelHeader::default();
    let Some(record) = body
        .split(RECORD_DELIMITER)
        .map(str::trim)
        .find(|record| !record.is_empty())
    else {
        return header;
    };
    if !is_header_record(record) {
        return header;
    }

    let mut tokens = record.split(PAIR_DELIMITER);
    while let (Some(key), Some(value)) = (tokens.next(), tokens.next()) {
        header
            .settings
            .insert(key.trim().to_string(), value.to_string());
    }
    header
}

fn is_header_record(record: &str) -> bool {
    let mut bytes = record.bytes();
    matches!(
        (bytes.next(), bytes.next()),
        (Some(b'k'), Some(second)) if second.is_ascii_alphabetic()
    )
}

fn parse_record(record_index: usize, record: &str) -> Result<ObjectRecord, ParseIssue> {
    let tokens = record.split(PAIR_DELIMITER).collect::<Vec<_>>();
    match parse_keyed(&tokens) {
        Ok(object) => Ok(object),
        Err(_) if tokens.len() == 4 => parse_compact(&tokens).ok_or_else(|| {
            ParseIssue::MalformedRecord {
                record_index,
                reason: "compact record has non-numeric values".to_string(),
            }
        }),
        Err(reason) => Err(ParseIssue::MalformedRecord {
            record_index,
            reason,
        }),
    }
}

fn parse_keyed(tokens: &[&str]) -> Result<ObjectRecord, String> {
    if tokens.len() % 2 != 0 {
        return Err(format!("dangling key after {} values", tokens.len() / 2));
    }

    let mut values = BTreeMap::<u32, &str>::new();
    for pair in tokens.chunks_exact(2) {
        let key = pair[0]
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("non-numeric key {:?}", pair[0]))?;
        values.insert(key, pair[1]);
    }

    let type_id = values
        .get(&KEY_TYPE_ID)
        .ok_or_else(|| "missing object type id".to_string())?
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid object type id".to_string())?;
    let x = required_coordinate(&values, KEY_X, "x")?;
    let y = required_coordinate(&values, KEY_Y, "y")?;

    let mut object = ObjectRecord::at(type_id, Vec2::new(x, y));
    object.flip_x = flag(&values, KEY_FLIP_X);
    object.flip_y = flag(&values, KEY_FLIP_Y);
    object.rotation = float_or(&values, KEY_ROTATION, 0.0);
    object.scale = float_or(&values, KEY_SCALE, 1.0);
    if let Some(groups) = values.get(&KEY_GROUPS) {
        object.groups = parse_groups(groups);
    }
    object.kind = kind_for(type_id, &values);
    Ok(object)
}

fn parse_compact(tokens: &[&str]) -> Option<ObjectRecord> {
    let type_id = tokens[0].trim().parse::<u32>().ok()?;
    let x = finite(tokens[1])?;
    let y = finite(tokens[2])?;
    let rotation = finite(tokens[3])?;

    let mut object = ObjectRecord::at(type_id, Vec2::new(x, y));
    object.rotation = rotation;
    if type_id == MOVE_TRIGGER_TYPE_ID {
        object.kind = kind_for(type_id, &BTreeMap::new());
    } else if TRIGGER_TYPE_IDS.contains(&type_id) {
        object.kind = ObjectKind::Trigger;
    }
    Some(object)
}

fn kind_for(type_id: u32, values: &BTreeMap<u32, &str>) -> ObjectKind {
    if type_id == MOVE_TRIGGER_TYPE_ID {
        let target = values
            .get(&KEY_TARGET_GROUP)
            .map(|value| parse_int_lenient(value))
            .filter(|group| *group > 0)
            .and_then(|group| u32::try_from(group).ok())
            .map(GroupId);
        return ObjectKind::MoveTrigger(MoveTrigger {
            duration_secs: float_or(values, KEY_DURATION, 0.0),
            offset: Vec2::new(
                float_or(values, KEY_OFFSET_X, 0.0),
                float_or(values, KEY_OFFSET_Y, 0.0),
            ),
            easing_id: values
                .get(&KEY_EASING)
                .map(|value| parse_int_lenient(value))
                .and_then(|id| u32::try_from(id).ok())
                .unwrap_or(0),
            easing_rate: float_or(values, KEY_EASING_RATE, 2.0),
            target_group: target,
        });
    }
    if TRIGGER_TYPE_IDS.contains(&type_id) {
        return ObjectKind::Trigger;
    }
    ObjectKind::Static
}

fn parse_groups(value: &str) -> BTreeSet<GroupId> {
    value
        .split(GROUP_DELIMITER)
        .filter_map(|group| group.trim().parse::<u32>().ok())
        .filter(|group| *group > 0)
        .map(GroupId)
        .collect()
}

fn required_coordinate(
    values: &BTreeMap<u32, &str>,
    key: u32,
    label: &str,
) -> Result<f32, String> {
    let raw = values
        .get(&key)
        .ok_or_else(|| format!("missing {label} position"))?;
    finite(raw).ok_or_else(|| format!("invalid {label} position {raw:?}"))
}

fn finite(value: &str) -> Option<f32> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

fn float_or(values: &BTreeMap<u32, &str>, key: u32, default: f32) -> f32 {
    values
        .get(&key)
        .map(|value| parse_float_lenient(value) as f32)
        .unwrap_or(default)
}

fn flag(values: &BTreeMap<u32, &str>, key: u32) -> bool {
    values
        .get(&key)
        .is_some_and(|value| parse_int_lenient(value) == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_valid_and_one_truncated_record_yield_one_object() {
        let body = "1,1,2,15,3,45;1,8,2";
        let objects = parse_objects(body).collect::<Vec<_>>();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].type_id, 1);
        assert_eq!(objects[0].position, Vec2::new(15.0, 45.0));

        let parsed = parse_body(body);
        assert_eq!(parsed.objects.len(), 1);
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::MalformedRecord {
                record_index: 1,
                reason: "dangling key after 1 values".to_string(),
            }]
        );
    }

    #[test]
    fn compact_record_reads_type_then_position() {
        let objects = parse_objects("1,0,0,0;").collect::<Vec<_>>();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].type_id, 1);
        assert_eq!(objects[0].position, Vec2::ZERO);
        assert_eq!(objects[0].kind, ObjectKind::Static);
    }

    #[test]
    fn keyed_record_reads_transform_and_groups() {
        let objects = parse_objects("1,8,2,45.5,3,-15,4,1,6,90,32,0.5,57,3.1.3.x.0")
            .collect::<Vec<_>>();
        let object = &objects[0];
        assert_eq!(object.type_id, 8);
        assert_eq!(object.position, Vec2::new(45.5, -15.0));
        assert!(object.flip_x);
        assert!(!object.flip_y);
        assert_eq!(object.rotation, 90.0);
        assert_eq!(object.scale, 0.5);
        assert_eq!(
            object.groups.iter().copied().collect::<Vec<_>>(),
            vec![GroupId(1), GroupId(3)]
        );
    }

    #[test]
    fn move_trigger_carries_its_parameters() {
        let objects =
            parse_objects("1,901,2,300,3,15,10,1.5,28,250,29,-30,30,2,85,1.5,51,4")
                .collect::<Vec<_>>();
        let ObjectKind::MoveTrigger(trigger) = &objects[0].kind else {
            panic!("expected move trigger, got {:?}", objects[0].kind);
        };
        assert_eq!(trigger.duration_secs, 1.5);
        assert_eq!(trigger.offset, Vec2::new(250.0, -30.0));
        assert_eq!(trigger.easing_id, 2);
        assert_eq!(trigger.easing_rate, 1.5);
        assert_eq!(trigger.target_group, Some(GroupId(4)));
    }

    #[test]
    fn other_trigger_ids_are_plain_triggers() {
        let objects = parse_objects("1,1006,2,0,3,0").collect::<Vec<_>>();
        assert_eq!(objects[0].kind, ObjectKind::Trigger);
    }

    #[test]
    fn header_record_is_not_an_object() {
        let body = "kS38,1_40_2_125,kA2,1,kA4,3;1,1,2,15,3,15;";
        assert_eq!(parse_objects(body).count(), 1);

        let header = parse_header(body);
        assert_eq!(header.game_mode(), 1);
        assert_eq!(header.speed(), 3);
        assert_eq!(header.get("kS38"), Some("1_40_2_125"));
    }

    #[test]
    fn body_without_header_has_empty_header() {
        let header = parse_header("1,1,2,15,3,15;");
        assert!(header.is_empty());
        assert_eq!(header.game_mode(), 0);
    }

    #[test]
    fn missing_position_and_bad_type_are_malformed() {
        let parsed = parse_body("1,1,3,15,6,0;1,x,2,1,3,1;2,5,3,5,6,0;1,1,2,nan,3,1;1,2,2,1,3,1");
        assert_eq!(parsed.objects.len(), 1);
        assert_eq!(parsed.issues.len(), 4);
        assert!(parsed
            .issues
            .iter()
            .all(|issue| matches!(issue, ParseIssue::MalformedRecord { .. })));
    }

    #[test]
    fn iterator_is_restartable_by_clone() {
        let records = parse_objects("1,1,2,0,3,0;1,2,2,30,3,0;");
        let first_pass = records.clone().count();
        let second_pass = records.map(|object| object.type_id).collect::<Vec<_>>();
        assert_eq!(first_pass, 2);
        assert_eq!(second_pass, vec![1, 2]);
    }
}
