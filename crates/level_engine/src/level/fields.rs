use std::collections::BTreeMap;

use super::resolver::LevelSource;

pub(crate) const FIELD_DELIMITER: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelField {
    LevelId,
    Name,
    Description,
    LevelString,
    Creator,
    DifficultyDenominator,
    DifficultyNumerator,
    Downloads,
    OfficialSongId,
    GameVersion,
    Likes,
    Length,
    Demon,
    Stars,
    FeatureScore,
    Auto,
    Password,
    UploadDate,
    UpdateDate,
    VerifiedCoins,
    SongName,
    SongId,
    SongUrl,
    NormalPercent,
    PracticePercent,
    Dislikes,
    StarsRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Int,
    Float,
    Bool,
    Text,
}

/// Numeric record keys. Several keys share a field; the later one in a
/// record wins.
const FIELD_TABLE: &[(u32, LevelField, FieldKind)] = &[
    (1, LevelField::LevelId, FieldKind::Int),
    (2, LevelField::Name, FieldKind::Text),
    (3, LevelField::Description, FieldKind::Text),
    (4, LevelField::LevelString, FieldKind::Text),
    (5, LevelField::Creator, FieldKind::Text),
    (6, LevelField::DifficultyDenominator, FieldKind::Int),
    (7, LevelField::DifficultyNumerator, FieldKind::Int),
    (8, LevelField::Downloads, FieldKind::Int),
    (9, LevelField::OfficialSongId, FieldKind::Int),
    (10, LevelField::GameVersion, FieldKind::Int),
    (11, LevelField::Likes, FieldKind::Int),
    (12, LevelField::Length, FieldKind::Int),
    (13, LevelField::Demon, FieldKind::Bool),
    (14, LevelField::Stars, FieldKind::Int),
    (15, LevelField::FeatureScore, FieldKind::Int),
    (16, LevelField::Auto, FieldKind::Bool),
    (17, LevelField::Password, FieldKind::Text),
    (18, LevelField::UploadDate, FieldKind::Text),
    (19, LevelField::UpdateDate, FieldKind::Text),
    (27, LevelField::VerifiedCoins, FieldKind::Bool),
    (35, LevelField::SongName, FieldKind::Text),
    (36, LevelField::SongId, FieldKind::Int),
    (37, LevelField::SongUrl, FieldKind::Text),
    (38, LevelField::GameVersion, FieldKind::Int),
    (39, LevelField::GameVersion, FieldKind::Int),
    (41, LevelField::NormalPercent, FieldKind::Float),
    (42, LevelField::PracticePercent, FieldKind::Float),
    (43, LevelField::Likes, FieldKind::Int),
    (45, LevelField::Dislikes, FieldKind::Int),
    (46, LevelField::Stars, FieldKind::Int),
    (47, LevelField::StarsRequested, FieldKind::Bool),
];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// Scalar metadata of one level plus its lazily decoded body.
///
/// `body` is `Some` once the resolver has decoded it and is never replaced
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelDocument {
    fields: BTreeMap<LevelField, FieldValue>,
    body: Option<String>,
    source: Option<LevelSource>,
}

impl LevelDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_level_id(level_id: i64) -> Self {
        let mut document = Self::default();
        document.set(LevelField::LevelId, FieldValue::Int(level_id));
        document
    }

    pub fn get(&self, field: LevelField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: LevelField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn level_id(&self) -> Option<i64> {
        self.get(LevelField::LevelId).and_then(FieldValue::as_int)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(LevelField::Name).and_then(FieldValue::as_text)
    }

    pub fn creator(&self) -> Option<&str> {
        self.get(LevelField::Creator).and_then(FieldValue::as_text)
    }

    pub fn stars(&self) -> Option<i64> {
        self.get(LevelField::Stars).and_then(FieldValue::as_int)
    }

    /// Undecoded level string carried by a metadata record.
    pub fn level_string(&self) -> Option<&str> {
        self.get(LevelField::LevelString)
            .and_then(FieldValue::as_text)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|body| !body.is_empty())
    }

    pub fn source(&self) -> Option<LevelSource> {
        self.source
    }

    pub(crate) fn populate_body(&mut self, body: String, source: LevelSource) {
        if self.body.is_some() {
            return;
        }
        self.body = Some(body);
        self.source = Some(source);
    }

    /// Copies fields from `other` that this document does not already hold.
    pub(crate) fn merge_missing_fields(&mut self, other: &LevelDocument) {
        for (field, value) in &other.fields {
            self.fields
                .entry(*field)
                .or_insert_with(|| value.clone());
        }
    }
}

pub fn parse_fields(text: &str) -> LevelDocument {
    let mut document = LevelDocument::default();
    let mut tokens = text.split(FIELD_DELIMITER);

    while let Some(key) = tokens.next() {
        let Some(value) = tokens.next() else {
            break;
        };
        let Some((field, kind)) = lookup_field(key) else {
            continue;
        };
        document.set(field, coerce(value, kind));
    }

    document
}

/// True when `text` reads as a `key:value` metadata record rather than a
/// placement body.
pub fn looks_like_field_record(text: &str) -> bool {
    let trimmed = text.trim_start();
    let Some(colon) = trimmed.find(FIELD_DELIMITER) else {
        return false;
    };
    let key = &trimmed[..colon];
    !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit())
}

fn lookup_field(key: &str) -> Option<(LevelField, FieldKind)> {
    let key = key.trim().parse::<u32>().ok()?;
    FIELD_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == key)
        .map(|(_, field, kind)| (*field, *kind))
}

fn coerce(value: &str, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Int => FieldValue::Int(parse_int_lenient(value)),
        FieldKind::Float => FieldValue::Float(parse_float_lenient(value)),
        FieldKind::Bool => FieldValue::Bool(parse_int_lenient(value) == 1),
        FieldKind::Text => FieldValue::Text(value.to_string()),
    }
}

pub(crate) fn parse_int_lenient(value: &str) -> i64 {
    let trimmed = value.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .map(|parsed| parsed.trunc() as i64)
        })
        .unwrap_or(0)
}

pub(crate) fn parse_float_lenient(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .unwrap_or(0.0)
}
