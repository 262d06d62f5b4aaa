//! Lookup from narrative `ID` attributes to their text.

use std::collections::HashMap;

use crate::document::Document;

/// Narrative text keyed by the `ID` attribute of the element that holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrativeReferences {
    texts: HashMap<String, String>,
}

impl NarrativeReferences {
    /// Scan the whole document once.
    pub fn build(document: &Document) -> Self {
        let texts = document
            .root()
            .descendants()
            .into_iter()
            .filter_map(|node| {
                let id = node.attribute("ID")?;
                Some((id.to_string(), node.text().trim().to_string()))
            })
            .collect();
        Self { texts }
    }

    /// `cda:reference/@value` is usually `#id`, sometimes the bare id.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        self.texts
            .get(reference)
            .or_else(|| {
                reference
                    .strip_prefix('#')
                    .and_then(|bare| self.texts.get(bare))
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_with_and_without_hash() {
        let document = Document::parse(
            r#"<section xmlns="urn:hl7-org:v3"><text><content ID="note1"> Fasting <b>sample</b> </content></text></section>"#,
        )
        .expect("doc");
        let references = NarrativeReferences::build(&document);
        assert_eq!(references.resolve("#note1"), Some("Fasting sample"));
        assert_eq!(references.resolve("note1"), Some("Fasting sample"));
        assert_eq!(references.resolve("#missing"), None);
        assert_eq!(references, NarrativeReferences::build(&document));
    }
}
