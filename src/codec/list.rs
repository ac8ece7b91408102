//! Serializers for multi-valued reference cells.

/// Joins already-serialized values into one grouped cell.
///
/// Each value is single-quoted with embedded `'` escaped as `\'`, and the
/// quoted values are comma-joined: `'a','it\'s'`. Backslashes are left
/// untouched so files exported by earlier releases read back identically.
#[must_use]
pub fn serialize_grouped<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| format!("'{}'", v.as_ref().replace('\'', "\\'")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Fixed-width layout for a spread reference column group.
///
/// The width is `record_count * field_count` cells, where `record_count` is
/// the largest related-record count seen during the walk-through pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadListSerializer {
    record_count: usize,
    field_count: usize,
}

impl SpreadListSerializer {
    /// Creates a serializer for `field_count` target fields and no records yet.
    #[must_use]
    pub const fn new(field_count: usize) -> Self {
        Self {
            record_count: 0,
            field_count,
        }
    }

    /// Records one row's related-record count during the walk-through pass.
    pub fn walk(&mut self, related_count: usize) {
        self.record_count = self.record_count.max(related_count);
    }

    /// Maximum related-record count across all walked rows.
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Number of target fields per related record.
    #[must_use]
    pub const fn field_count(&self) -> usize {
        self.field_count
    }

    /// Total number of cells this group occupies in every row.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.record_count * self.field_count
    }

    /// Lays out one row's related records, each a list of serialized target fields.
    ///
    /// Records beyond `record_count` and fields beyond `field_count` are
    /// dropped; missing cells are empty strings.
    #[must_use]
    pub fn serialize(&self, records: &[Vec<String>]) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.width());
        for index in 0..self.record_count {
            let record = records.get(index);
            for field in 0..self.field_count {
                let cell = record.and_then(|r| r.get(field)).cloned().unwrap_or_default();
                cells.push(cell);
            }
        }
        cells
    }

    /// Expands header labels for this group.
    ///
    /// `{index}` in a label is replaced by the zero-based related-record index.
    #[must_use]
    pub fn header<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        let mut header = Vec::with_capacity(self.width());
        for index in 0..self.record_count {
            for field in 0..self.field_count {
                let label = labels.get(field).map_or("", AsRef::as_ref);
                header.push(label.replace("{index}", &index.to_string()));
            }
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_grouped_quotes_and_escapes() {
        assert_eq!(serialize_grouped(["a", "b"]), "'a','b'");
        assert_eq!(serialize_grouped(["it's"]), r"'it\'s'");
        assert_eq!(serialize_grouped(Vec::<String>::new()), "");
        assert_eq!(serialize_grouped(["a,b"]), "'a,b'");
    }

    #[test]
    fn test_spread_width_follows_widest_row() {
        let mut spread = SpreadListSerializer::new(2);
        spread.walk(3);
        spread.walk(1);
        spread.walk(0);
        assert_eq!(spread.record_count(), 3);
        assert_eq!(spread.width(), 6);
    }

    #[test]
    fn test_spread_pads_short_rows() {
        let mut spread = SpreadListSerializer::new(2);
        spread.walk(3);
        let cells = spread.serialize(&[row(&["o1", "10"])]);
        assert_eq!(cells, row(&["o1", "10", "", "", "", ""]));
    }

    #[test]
    fn test_spread_truncates_long_rows() {
        let mut spread = SpreadListSerializer::new(1);
        spread.walk(1);
        let cells = spread.serialize(&[row(&["a", "extra"]), row(&["b"])]);
        assert_eq!(cells, row(&["a"]));
    }

    #[test]
    fn test_spread_header_index_template() {
        let mut spread = SpreadListSerializer::new(2);
        spread.walk(2);
        let header = spread.header(&["Order {index} id", "Amount"]);
        assert_eq!(
            header,
            row(&["Order 0 id", "Amount", "Order 1 id", "Amount"])
        );
    }

    #[test]
    fn test_spread_with_no_related_records_is_empty() {
        let spread = SpreadListSerializer::new(3);
        assert_eq!(spread.width(), 0);
        assert!(spread.serialize(&[]).is_empty());
        assert!(spread.header(&["a", "b", "c"]).is_empty());
    }
}
