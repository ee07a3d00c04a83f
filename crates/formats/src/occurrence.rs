use std::fs::{self, File};
use std::path::Path;

use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use foundation::Crs;
use geo::Point;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use tracing::{debug, info};

use crate::error::LoadError;

/// Display identifiers shared by every consumer of a cleaned table.
pub const SPECIES: &str = "Species";
pub const SCIENTIFIC_NAME: &str = "ScientificName";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

pub const DISPLAY_COLUMNS: [&str; 4] = [SPECIES, SCIENTIFIC_NAME, LATITUDE, LONGITUDE];

/// Accepted source names for the interpreted columns, tried in order.
///
/// The display identifiers are always accepted as well, so a table that has
/// already been cleaned and written back out resolves to the same fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub species: Vec<String>,
    pub scientific_name: Vec<String>,
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self::with_primary("species", "decimalLatitude", "decimalLongitude")
    }
}

impl ColumnNames {
    pub fn with_primary(species: &str, latitude: &str, longitude: &str) -> Self {
        Self {
            species: vec![species.to_string(), SPECIES.to_string()],
            scientific_name: vec!["scientificName".to_string(), SCIENTIFIC_NAME.to_string()],
            latitude: vec![latitude.to_string(), LATITUDE.to_string()],
            longitude: vec![longitude.to_string(), LONGITUDE.to_string()],
        }
    }

    /// Primary names of the required columns that `columns` cannot satisfy.
    pub fn missing_required(&self, columns: &[String]) -> Vec<String> {
        [&self.species, &self.latitude, &self.longitude]
            .into_iter()
            .filter(|names| resolve(columns, names).is_none())
            .filter_map(|names| names.first().cloned())
            .collect()
    }
}

/// Index of the first candidate present in `columns`.
pub fn resolve(columns: &[String], candidates: &[String]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| columns.iter().position(|c| c == name))
}

/// A flat text table exactly as read from the source.
///
/// Cells are `None` when absent from a short row or blank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// blake3 hex digest of the source bytes, when loaded from a file.
    pub fingerprint: Option<String>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            fingerprint: None,
        }
    }

    /// Appends a row, truncating excess cells and padding short rows.
    pub fn push_row(&mut self, mut cells: Vec<Option<String>>) {
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows where every listed column holds a value.
    pub fn count_present(&self, indices: &[usize]) -> usize {
        self.rows
            .iter()
            .filter(|row| indices.iter().all(|&i| row.get(i).is_some_and(Option::is_some)))
            .count()
    }
}

/// How to read an occurrence file. The delimiter and quoting settings only
/// apply to delimited text.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceSource {
    /// Field delimiter; inferred from the file extension when unset.
    pub delimiter: Option<u8>,
    /// Quote handling; defaults to off for tab-separated files.
    pub quoting: Option<bool>,
    /// Keep only the first `limit` data rows.
    pub limit: Option<usize>,
    pub columns: ColumnNames,
}

pub fn infer_delimiter(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => b',',
        _ => b'\t',
    }
}

pub fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

/// Reads an occurrence file into a `RawTable`, keeping every column.
///
/// `.parquet` files are read as columnar data; anything else is delimited
/// text. Both paths apply the same required-column check and row limit.
pub fn load_occurrences(
    path: impl AsRef<Path>,
    source: &OccurrenceSource,
) -> Result<RawTable, LoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut table = if is_parquet(path) {
        read_parquet(path, source)?
    } else {
        read_delimited(path, &bytes, source)?
    };
    table.fingerprint = Some(blake3::hash(&bytes).to_hex().to_string());

    info!(
        "loaded {} occurrence rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

fn require_columns(path: &Path, source: &OccurrenceSource, columns: &[String]) -> Result<(), LoadError> {
    let missing = source.columns.missing_required(columns);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}

fn read_delimited(path: &Path, bytes: &[u8], source: &OccurrenceSource) -> Result<RawTable, LoadError> {
    let csv_err = |e: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source: e,
    };
    let delimiter = source.delimiter.unwrap_or_else(|| infer_delimiter(path));
    let quoting = source.quoting.unwrap_or(delimiter != b'\t');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quoting(quoting)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    require_columns(path, source, &columns)?;

    let mut table = RawTable::new(columns);
    let mut ragged = 0usize;
    for record in reader.byte_records() {
        if source.limit.is_some_and(|limit| table.len() >= limit) {
            break;
        }
        let record = record.map_err(csv_err)?;
        if record.len() != table.columns.len() {
            ragged += 1;
        }
        table.push_row(record.iter().map(cell).collect());
    }
    if ragged > 0 {
        debug!("{ragged} ragged rows in {} were truncated or padded", path.display());
    }
    Ok(table)
}

/// Columnar source: every value is rendered to text so the cleaner sees the
/// same cells a delimited file would give it. Nulls become `None`.
fn read_parquet(path: &Path, source: &OccurrenceSource) -> Result<RawTable, LoadError> {
    let parquet_err = |e: ParquetError| LoadError::Parquet {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::open(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;

    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().trim().to_string())
        .collect();
    require_columns(path, source, &columns)?;

    if let Some(limit) = source.limit {
        builder = builder.with_limit(limit);
    }
    let reader = builder.build().map_err(parquet_err)?;

    let options = FormatOptions::default();
    let mut table = RawTable::new(columns);
    for batch in reader {
        let batch = batch.map_err(|e| parquet_err(e.into()))?;
        let formatters = batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| parquet_err(e.into()))?;
        for row in 0..batch.num_rows() {
            if source.limit.is_some_and(|limit| table.len() >= limit) {
                break;
            }
            let cells = batch
                .columns()
                .iter()
                .zip(&formatters)
                .map(|(col, fmt)| {
                    if col.is_null(row) {
                        None
                    } else {
                        cell(fmt.value(row).to_string().as_bytes())
                    }
                })
                .collect();
            table.push_row(cells);
        }
    }
    debug!("read {} parquet rows from {}", table.len(), path.display());
    Ok(table)
}

fn cell(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}

/// One cleaned occurrence. The point geometry is the single source of the
/// coordinates: x = longitude, y = latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceRecord {
    pub species: String,
    pub scientific_name: Option<String>,
    point: Point<f64>,
    /// Uninterpreted original cells, aligned with `OccurrenceTable::extra_columns`.
    pub extra: Vec<Option<String>>,
}

impl OccurrenceRecord {
    pub fn new(
        species: impl Into<String>,
        scientific_name: Option<String>,
        latitude: f64,
        longitude: f64,
        extra: Vec<Option<String>>,
    ) -> Self {
        Self {
            species: species.into(),
            scientific_name,
            point: Point::new(longitude, latitude),
            extra,
        }
    }

    pub fn point(&self) -> Point<f64> {
        self.point
    }

    pub fn latitude(&self) -> f64 {
        self.point.y()
    }

    pub fn longitude(&self) -> f64 {
        self.point.x()
    }
}

/// Cleaned occurrences tagged with their reference system (always WGS84).
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceTable {
    crs: Crs,
    extra_columns: Vec<String>,
    records: Vec<OccurrenceRecord>,
}

impl OccurrenceTable {
    pub fn new(extra_columns: Vec<String>, records: Vec<OccurrenceRecord>) -> Self {
        Self {
            crs: Crs::Wgs84,
            extra_columns,
            records,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Same schema and reference system, different rows.
    pub fn with_records(&self, records: Vec<OccurrenceRecord>) -> Self {
        Self {
            crs: self.crs.clone(),
            extra_columns: self.extra_columns.clone(),
            records,
        }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn records(&self) -> &[OccurrenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Display columns followed by the preserved original columns.
    pub fn columns(&self) -> Vec<String> {
        DISPLAY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    /// Text cells in `columns()` order, without geometry.
    pub fn row_cells(record: &OccurrenceRecord) -> Vec<Option<String>> {
        let mut cells = Vec::with_capacity(DISPLAY_COLUMNS.len() + record.extra.len());
        cells.push(Some(record.species.clone()));
        cells.push(record.scientific_name.clone());
        cells.push(Some(record.latitude().to_string()));
        cells.push(Some(record.longitude().to_string()));
        cells.extend(record.extra.iter().cloned());
        cells
    }

    /// Back to a display-named raw table; cleaning it again is a no-op.
    pub fn to_raw(&self) -> RawTable {
        let mut raw = RawTable::new(self.columns());
        for record in &self.records {
            raw.push_row(Self::row_cells(record));
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use pretty_assertions::assert_eq;

    use super::{
        ColumnNames, LATITUDE, OccurrenceRecord, OccurrenceSource, OccurrenceTable, RawTable,
        SPECIES, infer_delimiter, load_occurrences,
    };
    use crate::error::LoadError;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    fn write_parquet(columns: Vec<(&str, ArrayRef)>) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(".parquet")
            .tempfile()
            .expect("temp file");
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays).expect("batch");
        let mut writer =
            ArrowWriter::try_new(file.reopen().expect("reopen"), schema, None).expect("writer");
        writer.write(&batch).expect("write");
        writer.close().expect("close");
        file
    }

    fn gbif_parquet() -> tempfile::NamedTempFile {
        write_parquet(vec![
            (
                "species",
                Arc::new(StringArray::from(vec![
                    Some("Gavialis gangeticus"),
                    Some("Alligator sinensis"),
                    None,
                ])) as ArrayRef,
            ),
            (
                "decimalLatitude",
                Arc::new(Float64Array::from(vec![Some(26.5), None, Some(1.0)])),
            ),
            (
                "decimalLongitude",
                Arc::new(Float64Array::from(vec![Some(80.25), Some(120.0), Some(2.0)])),
            ),
            (
                "individualCount",
                Arc::new(Int64Array::from(vec![Some(3), Some(1), None])),
            ),
        ])
    }

    #[test]
    fn parquet_cells_are_read_as_text() {
        let file = gbif_parquet();
        let table = load_occurrences(file.path(), &OccurrenceSource::default()).expect("load");
        assert_eq!(
            table.columns,
            vec!["species", "decimalLatitude", "decimalLongitude", "individualCount"]
        );
        assert_eq!(table.len(), 3);
        let s = |v: &str| Some(v.to_string());
        assert_eq!(
            table.rows[0],
            vec![s("Gavialis gangeticus"), s("26.5"), s("80.25"), s("3")]
        );
        assert_eq!(table.rows[1][1], None);
        assert_eq!(table.rows[2][0], None);
        assert_eq!(table.rows[2][3], None);
        assert!(table.fingerprint.is_some());
    }

    #[test]
    fn parquet_honours_limit_and_required_columns() {
        let file = gbif_parquet();
        let source = OccurrenceSource {
            limit: Some(2),
            ..Default::default()
        };
        let table = load_occurrences(file.path(), &source).expect("load");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][0].as_deref(), Some("Alligator sinensis"));

        let file = write_parquet(vec![(
            "species",
            Arc::new(StringArray::from(vec!["A"])) as ArrayRef,
        )]);
        let err = load_occurrences(file.path(), &OccurrenceSource::default()).unwrap_err();
        match err {
            LoadError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["decimalLatitude", "decimalLongitude"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn corrupt_parquet_is_a_parquet_error() {
        let file = write_temp(".parquet", "species\tdecimalLatitude\n");
        let err = load_occurrences(file.path(), &OccurrenceSource::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parquet { .. }));
    }

    #[test]
    fn ragged_rows_are_truncated_and_padded() {
        let file = write_temp(
            ".tsv",
            "gbifID\tspecies\tdecimalLatitude\tdecimalLongitude\n\
             1\tCrocodylus niloticus\t-1.5\t30.2\textra\tmore\n\
             2\tCaiman crocodilus\t4.1\n",
        );
        let table = load_occurrences(file.path(), &OccurrenceSource::default()).expect("load");
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows[0],
            vec![
                Some("1".to_string()),
                Some("Crocodylus niloticus".to_string()),
                Some("-1.5".to_string()),
                Some("30.2".to_string()),
            ]
        );
        assert_eq!(table.rows[1][3], None);
        assert!(table.fingerprint.is_some());
    }

    #[test]
    fn tab_files_ignore_unbalanced_quotes() {
        let file = write_temp(
            ".tsv",
            "species\tdecimalLatitude\tdecimalLongitude\tlocality\n\
             Gavialis gangeticus\t26.5\t80.1\t\"Ganges bank\n\
             Alligator mississippiensis\t29.9\t-90.1\tbayou\n",
        );
        let table = load_occurrences(file.path(), &OccurrenceSource::default()).expect("load");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][3].as_deref(), Some("\"Ganges bank"));
    }

    #[test]
    fn csv_extension_switches_delimiter() {
        assert_eq!(infer_delimiter(std::path::Path::new("a/occ.CSV")), b',');
        assert_eq!(infer_delimiter(std::path::Path::new("a/occurrence.txt")), b'\t');

        let file = write_temp(
            ".csv",
            "species,decimalLatitude,decimalLongitude\n\"Crocodylus porosus\",-12.4,130.8\n",
        );
        let table = load_occurrences(file.path(), &OccurrenceSource::default()).expect("load");
        assert_eq!(table.rows[0][0].as_deref(), Some("Crocodylus porosus"));
    }

    #[test]
    fn blank_cells_become_none() {
        let file = write_temp(
            ".tsv",
            "species\tdecimalLatitude\tdecimalLongitude\n\t  \t12.0\n",
        );
        let table = load_occurrences(file.path(), &OccurrenceSource::default()).expect("load");
        assert_eq!(table.rows[0], vec![None, None, Some("12.0".to_string())]);
    }

    #[test]
    fn limit_keeps_leading_rows() {
        let file = write_temp(
            ".tsv",
            "species\tdecimalLatitude\tdecimalLongitude\nA\t1\t1\nB\t2\t2\nC\t3\t3\n",
        );
        let source = OccurrenceSource {
            limit: Some(2),
            ..Default::default()
        };
        let table = load_occurrences(file.path(), &source).expect("load");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][0].as_deref(), Some("B"));
    }

    #[test]
    fn missing_required_columns_fail_load() {
        let file = write_temp(".tsv", "species\tlat\tlon\nA\t1\t2\n");
        let err = load_occurrences(file.path(), &OccurrenceSource::default()).unwrap_err();
        match err {
            LoadError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["decimalLatitude", "decimalLongitude"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_occurrences("/nonexistent/occurrence.tsv", &OccurrenceSource::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn display_names_satisfy_required_columns() {
        let columns = vec![SPECIES.to_string(), LATITUDE.to_string(), "Longitude".to_string()];
        assert!(ColumnNames::default().missing_required(&columns).is_empty());
    }

    #[test]
    fn to_raw_uses_display_columns_and_keeps_extras() {
        let table = OccurrenceTable::new(
            vec!["country".to_string()],
            vec![OccurrenceRecord::new(
                "Caiman latirostris",
                None,
                -27.5,
                -58.9,
                vec![Some("AR".to_string())],
            )],
        );
        let raw: RawTable = table.to_raw();
        assert_eq!(
            raw.columns,
            vec!["Species", "ScientificName", "Latitude", "Longitude", "country"]
        );
        assert_eq!(
            raw.rows[0],
            vec![
                Some("Caiman latirostris".to_string()),
                None,
                Some("-27.5".to_string()),
                Some("-58.9".to_string()),
                Some("AR".to_string()),
            ]
        );
    }

    #[test]
    fn record_point_is_lon_lat() {
        let r = OccurrenceRecord::new("A", None, 10.0, 20.0, Vec::new());
        assert_eq!(r.point().x(), 20.0);
        assert_eq!(r.point().y(), 10.0);
    }
}
