use indexmap::IndexMap;

/// Composite key (`extension***root`) to the record ids that share it,
/// in document order. Keys keep their first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    entries: IndexMap<String, Vec<String>>,
}

impl IdentifierMap {
    pub fn push(&mut self, key: impl Into<String>, record_id: impl Into<String>) {
        self.entries
            .entry(key.into())
            .or_default()
            .push(record_id.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, ids)| (key.as_str(), ids.as_slice()))
    }

    /// A key already present takes the list from `other`.
    pub fn merge(&mut self, other: IdentifierMap) {
        for (key, ids) in other.entries {
            self.entries.insert(key, ids);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order_and_replaces_on_merge() {
        let mut local = IdentifierMap::default();
        local.push("a***1", "r1");
        local.push("b***1", "r2");
        local.push("a***1", "r3");
        assert_eq!(local.get("a***1"), Some(&["r1".to_string(), "r3".to_string()][..]));
        assert_eq!(
            local.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            vec!["a***1", "b***1"]
        );

        let mut global = IdentifierMap::default();
        global.push("a***1", "old");
        global.merge(local);
        assert_eq!(global.len(), 2);
        assert_eq!(global.get("a***1").map(<[String]>::len), Some(2));
    }
}
