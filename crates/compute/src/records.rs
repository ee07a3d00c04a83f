use formats::OccurrenceTable;
use serde::Serialize;

/// The leading rows of a table as plain text cells, geometry left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPage {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows in the table before truncation.
    pub total: usize,
}

pub fn record_page(occurrences: &OccurrenceTable, limit: usize) -> RecordPage {
    RecordPage {
        columns: occurrences.columns(),
        rows: occurrences
            .records()
            .iter()
            .take(limit)
            .map(OccurrenceTable::row_cells)
            .collect(),
        total: occurrences.len(),
    }
}
