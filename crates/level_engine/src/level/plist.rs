use roxmltree::{Document, Node};
use thiserror::Error;

const LEVEL_ID_KEY: &str = "k1";
const LEVEL_NAME_KEY: &str = "k2";
const LEVEL_STRING_KEY: &str = "k4";

#[derive(Debug, Error)]
pub enum PlistError {
    #[error("level export is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("level export has no <dict> element")]
    MissingDict,
}

/// The level entries of a plist-style level export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlistLevel {
    pub level_id: Option<i64>,
    pub name: Option<String>,
    pub level_string: Option<String>,
}

pub fn looks_like_plist(payload: &[u8]) -> bool {
    let trimmed = payload.trim_ascii_start();
    trimmed.starts_with(b"<?xml") || trimmed.starts_with(b"<plist") || trimmed.starts_with(b"<dict")
}

/// Reads the first `<dict>` of a plist export. Both the compact `<k>`/`<s>`/`<i>`
/// tags and the long `<key>`/`<string>`/`<integer>` tags are accepted.
pub fn parse_plist_level(text: &str) -> Result<PlistLevel, PlistError> {
    let document = Document::parse(text)?;
    let dict = document
        .descendants()
        .find(|node| node.has_tag_name("dict"))
        .ok_or(PlistError::MissingDict)?;

    let mut level = PlistLevel::default();
    let mut pending_key = None::<String>;
    for child in dict.children().filter(Node::is_element) {
        let tag = child.tag_name().name();
        if matches!(tag, "k" | "key") {
            pending_key = Some(node_text(child));
            continue;
        }
        let Some(key) = pending_key.take() else {
            continue;
        };
        let value = node_text(child);
        match key.as_str() {
            LEVEL_ID_KEY => level.level_id = value.trim().parse::<i64>().ok(),
            LEVEL_NAME_KEY => level.name = Some(value),
            LEVEL_STRING_KEY if !value.trim().is_empty() => level.level_string = Some(value),
            _ => {}
        }
    }

    Ok(level)
}

fn node_text(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_tags_yield_level_string() {
        let text = r#"<?xml version="1.0"?>
<plist version="1.0" gjver="2.0"><dict><k>kCEK</k><i>4</i><k>k1</k><i>42</i><k>k2</k><s>MyLevel</s><k>k4</k><s>H4sIAAAAAAAAA-abc</s></dict></plist>"#;

        let level = parse_plist_level(text).expect("parse");
        assert_eq!(level.level_id, Some(42));
        assert_eq!(level.name.as_deref(), Some("MyLevel"));
        assert_eq!(level.level_string.as_deref(), Some("H4sIAAAAAAAAA-abc"));
    }

    #[test]
    fn long_tags_are_accepted() {
        let text = "<plist><dict><key>k4</key><string>1,1,2,15,3,15;</string></dict></plist>";
        let level = parse_plist_level(text).expect("parse");
        assert_eq!(level.level_string.as_deref(), Some("1,1,2,15,3,15;"));
        assert_eq!(level.level_id, None);
    }

    #[test]
    fn empty_level_string_is_absent() {
        let level = parse_plist_level("<dict><k>k4</k><s></s></dict>").expect("parse");
        assert_eq!(level.level_string, None);
    }

    #[test]
    fn missing_dict_and_bad_xml_are_errors() {
        assert!(matches!(
            parse_plist_level("<plist></plist>"),
            Err(PlistError::MissingDict)
        ));
        assert!(matches!(
            parse_plist_level("<plist><dict>"),
            Err(PlistError::Xml(_))
        ));
    }

    #[test]
    fn plist_sniffing() {
        assert!(looks_like_plist(b"  <?xml version=\"1.0\"?><plist/>"));
        assert!(looks_like_plist(b"<dict></dict>"));
        assert!(!looks_like_plist(b"H4sIAAAA"));
    }
}
