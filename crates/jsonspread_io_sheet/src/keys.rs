//! Column key resolution.
//!
//! Internal keys drive per-record lookup and are fixed once derived. Display
//! labels only feed the header row and can be overridden at any time before
//! materialization.

use crate::spec::SpecSpreadReport;
use crate::value::EnumValue;

/// Shape of the sample record the keys were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumKeySource {
    /// No sample record; zero columns.
    #[default]
    Empty,
    /// Sample was a map; keys are its field names.
    Map,
    /// Sample was a sequence; keys are positional indices.
    Sequence,
    /// Sample was a scalar; a single unnamed column holding the record itself.
    Scalar,
}

impl EnumKeySource {
    /// Classify a record.
    pub fn of(record: &EnumValue) -> Self {
        match record {
            EnumValue::Map(_) => Self::Map,
            EnumValue::Sequence(_) => Self::Sequence,
            _ => Self::Scalar,
        }
    }
}

/// Ordered column keys plus optional display override.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnKeys {
    source: EnumKeySource,
    keys_internal: Vec<String>,
    labels_custom: Option<Vec<String>>,
}

impl SpecColumnKeys {
    /// Derive keys from the first record (`None` for empty input).
    pub fn resolve(sample: Option<&EnumValue>) -> Self {
        let Some(sample) = sample else {
            return Self::default();
        };

        let source = EnumKeySource::of(sample);
        let keys_internal = match sample {
            EnumValue::Map(map) => map.keys().cloned().collect(),
            EnumValue::Sequence(seq) => (0..seq.len()).map(|idx| idx.to_string()).collect(),
            _ => vec![String::new()],
        };

        Self {
            source,
            keys_internal,
            labels_custom: None,
        }
    }

    /// Shape the keys were derived from.
    pub fn source(&self) -> EnumKeySource {
        self.source
    }

    /// Keys used for record lookup.
    pub fn internal(&self) -> &[String] {
        &self.keys_internal
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.keys_internal.len()
    }

    /// Whether there are no columns.
    pub fn is_empty(&self) -> bool {
        self.keys_internal.is_empty()
    }

    /// Caller-supplied labels, as given.
    pub fn custom_labels(&self) -> Option<&[String]> {
        self.labels_custom.as_deref()
    }

    /// Replace the header labels without touching lookup keys.
    pub fn override_labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels_custom = Some(labels.into_iter().map(Into::into).collect());
    }

    /// Replace the header labels from a value: map keys, or sequence items as text.
    pub fn override_labels_from_value(&mut self, value: &EnumValue) {
        let l_labels: Vec<String> = match value {
            EnumValue::Map(map) => map.keys().cloned().collect(),
            EnumValue::Sequence(seq) => seq.iter().map(EnumValue::to_label).collect(),
            EnumValue::Null => vec![],
            scalar => vec![scalar.to_label()],
        };
        self.override_labels(l_labels);
    }

    /// Drop the label override.
    pub fn clear_override(&mut self) {
        self.labels_custom = None;
    }

    /// Header labels, one per internal key.
    ///
    /// Missing custom labels fall back to the internal key; extra ones are ignored.
    pub fn display(&self) -> Vec<String> {
        let Some(l_custom) = &self.labels_custom else {
            return self.keys_internal.clone();
        };
        self.keys_internal
            .iter()
            .enumerate()
            .map(|(n_idx, c_key)| l_custom.get(n_idx).unwrap_or(c_key).clone())
            .collect()
    }

    /// Record a warning when the override length does not match the key count.
    pub fn check_override(&self, sheet_name: &str, report: &mut SpecSpreadReport) {
        let Some(l_custom) = &self.labels_custom else {
            return;
        };
        if l_custom.len() != self.keys_internal.len() {
            report.warn(format!(
                "Sheet {sheet_name:?}: {} custom label(s) for {} column(s); \
                 unmatched columns keep their key, extra labels are ignored.",
                l_custom.len(),
                self.keys_internal.len()
            ));
        }
    }

    /// Resolve one record field. `None` means a blank cell.
    pub fn lookup<'a>(&self, record: &'a EnumValue, n_idx_col: usize) -> Option<&'a EnumValue> {
        let c_key = self.keys_internal.get(n_idx_col)?;
        match self.source {
            EnumKeySource::Scalar => {
                if record.is_container() {
                    None
                } else {
                    Some(record)
                }
            }
            EnumKeySource::Map | EnumKeySource::Sequence => record.lookup(c_key),
            EnumKeySource::Empty => None,
        }
    }

    /// Whether a record has the shape the keys were derived from.
    pub fn accepts(&self, record: &EnumValue) -> bool {
        self.source == EnumKeySource::Empty || self.source == EnumKeySource::of(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> EnumValue {
        EnumValue::from_json_str(text).expect("decode")
    }

    #[test]
    fn test_resolve_from_map_keeps_order() {
        let keys = SpecColumnKeys::resolve(Some(&decode(r#"{"id":1,"name":"A","email":"x"}"#)));
        assert_eq!(keys.source(), EnumKeySource::Map);
        assert_eq!(keys.internal(), ["id", "name", "email"]);
        assert_eq!(keys.display(), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_resolve_from_sequence_uses_positions() {
        let keys = SpecColumnKeys::resolve(Some(&decode(r#"["a","b","c"]"#)));
        assert_eq!(keys.source(), EnumKeySource::Sequence);
        assert_eq!(keys.internal(), ["0", "1", "2"]);
    }

    #[test]
    fn test_resolve_from_scalar_is_single_unnamed_column() {
        let keys = SpecColumnKeys::resolve(Some(&decode("42")));
        assert_eq!(keys.source(), EnumKeySource::Scalar);
        assert_eq!(keys.internal(), [""]);
        assert_eq!(
            keys.lookup(&decode("7"), 0).map(EnumValue::to_label),
            Some("7".to_string())
        );
        assert!(keys.lookup(&decode(r#"{"a":1}"#), 0).is_none());
    }

    #[test]
    fn test_resolve_empty() {
        let keys = SpecColumnKeys::resolve(None);
        assert!(keys.is_empty());
        assert!(keys.display().is_empty());
    }

    #[test]
    fn test_override_changes_display_only() {
        let mut keys = SpecColumnKeys::resolve(Some(&decode(r#"{"id":1,"name":"A"}"#)));
        keys.override_labels(["# ID", "Name"]);
        assert_eq!(keys.display(), vec!["# ID", "Name"]);
        assert_eq!(keys.internal(), ["id", "name"]);

        let record = decode(r#"{"id":5,"name":"B"}"#);
        assert_eq!(
            keys.lookup(&record, 1).map(EnumValue::to_label),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_override_mismatch_pads_with_keys_and_drops_extras() {
        let mut keys = SpecColumnKeys::resolve(Some(&decode(r#"{"a":1,"b":2,"c":3}"#)));

        keys.override_labels(["A"]);
        assert_eq!(keys.display(), vec!["A", "b", "c"]);

        keys.override_labels(["A", "B", "C", "D"]);
        assert_eq!(keys.display(), vec!["A", "B", "C"]);

        let mut report = SpecSpreadReport::default();
        keys.check_override("Worksheet", &mut report);
        assert_eq!(report.warnings.len(), 1);

        keys.clear_override();
        assert_eq!(keys.display(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_override_from_value() {
        let mut keys = SpecColumnKeys::resolve(Some(&decode(r#"{"a":1,"b":2}"#)));

        keys.override_labels_from_value(&decode(r#"["First",2]"#));
        assert_eq!(keys.display(), vec!["First", "2"]);

        keys.override_labels_from_value(&decode(r#"{"X":0,"Y":0}"#));
        assert_eq!(keys.display(), vec!["X", "Y"]);
    }

    #[test]
    fn test_accepts_matching_shape_only() {
        let keys = SpecColumnKeys::resolve(Some(&decode(r#"{"a":1}"#)));
        assert!(keys.accepts(&decode(r#"{"b":1}"#)));
        assert!(!keys.accepts(&decode("[1]")));
        assert!(!keys.accepts(&decode("1")));
    }
}
