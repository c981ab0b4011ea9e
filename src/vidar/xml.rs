//! Minimal extraction helpers for Vidar's XML answers.
//!
//! Vidar stores every datum in a `value` attribute of an otherwise empty
//! element (`<ID value="17"/>`), so the helpers work on element sections and
//! attributes instead of building a document tree.

use std::sync::LazyLock;

use regex::Regex;

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<row\b[^>]*>(.*?)</row>").expect("row pattern is valid"));

/// Bodies of every `<row>...</row>` element, in document order.
pub fn rows(xml: &str) -> Vec<&str> {
    ROW_RE
        .captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Body of the first `<tag ...>...</tag>` element.
pub fn section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = Regex::new(&format!(r"<{}\b[^>]*>", regex::escape(tag))).ok()?;
    let start = open.find(xml)?.end();
    let close = format!("</{}>", tag);
    let len = xml[start..].find(close.as_str())?;
    Some(&xml[start..start + len])
}

/// `value` attribute of the first `<tag>` element, entity-decoded.
///
/// Returns `None` when the element or the attribute is absent.
pub fn value_attr(xml: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"<{}\b[^>]*?\bvalue\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(tag)
    ))
    .ok()?;
    let caps = re.captures(xml)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(unescape(raw))
}

/// `value` attribute of `<child>` inside the first `<parent>` section.
pub fn nested_value_attr(xml: &str, parent: &str, child: &str) -> Option<String> {
    value_attr(section(xml, parent)?, child)
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = r#"<?xml version="1.0"?>
<result>
  <row><ID value="11"/><FRAMETIMEMS value="1704103200100"/><ZONE_NAME value="lane1"/></row>
  <row>
    <ID value="12"/>
    <FRAMETIMEMS value="1704103200300"/>
    <ZONE_NAME value="lane2"/>
  </row>
</result>"#;

    #[test]
    fn test_rows_in_document_order() {
        let rows = rows(QUERY);
        assert_eq!(rows.len(), 2);
        assert_eq!(value_attr(rows[0], "ID").as_deref(), Some("11"));
        assert_eq!(value_attr(rows[1], "ZONE_NAME").as_deref(), Some("lane2"));
    }

    #[test]
    fn test_no_rows() {
        assert!(rows("<result></result>").is_empty());
    }

    #[test]
    fn test_value_attr_ignores_longer_tag_names() {
        let xml = r#"<IDX value="wrong"/><ID value="right"/>"#;
        assert_eq!(value_attr(xml, "ID").as_deref(), Some("right"));
    }

    #[test]
    fn test_value_attr_with_other_attributes_and_quotes() {
        let xml = r#"<text type='lp' value='AB&amp;12'/>"#;
        assert_eq!(value_attr(xml, "text").as_deref(), Some("AB&12"));
    }

    #[test]
    fn test_empty_value_is_some() {
        assert_eq!(value_attr(r#"<ID value=""/>"#, "ID").as_deref(), Some(""));
        assert_eq!(value_attr(r#"<ID/>"#, "ID"), None);
    }

    #[test]
    fn test_nested_value() {
        let xml = r#"<data><ID value="9"/><anpr><text value="AA1234AA"/><country value="UA"/></anpr><capture><frametimems value="5"/></capture></data>"#;
        assert_eq!(
            nested_value_attr(xml, "anpr", "country").as_deref(),
            Some("UA")
        );
        assert_eq!(
            nested_value_attr(xml, "capture", "frametimems").as_deref(),
            Some("5")
        );
        assert_eq!(nested_value_attr(xml, "images", "lp_img"), None);
    }
}
