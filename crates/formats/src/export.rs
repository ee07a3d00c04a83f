use std::io;

use geo::{LineString, MultiPolygon};
use serde_json::{Map, Value};

use crate::boundary::Country;
use crate::occurrence::OccurrenceTable;

/// Writes the table as delimited text: display columns, then the original extras.
pub fn write_csv<W: io::Write>(
    table: &OccurrenceTable,
    writer: W,
    delimiter: u8,
) -> Result<(), csv::Error> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    out.write_record(table.columns())?;
    for record in table.records() {
        let cells = OccurrenceTable::row_cells(record);
        out.write_record(cells.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    out.flush()?;
    Ok(())
}

/// One Point feature per record, every text column as a property.
pub fn occurrences_geojson(table: &OccurrenceTable) -> Value {
    let columns = table.columns();
    let mut features: Vec<Value> = Vec::with_capacity(table.len());
    for record in table.records() {
        let mut props = Map::new();
        for (name, cell) in columns.iter().zip(OccurrenceTable::row_cells(record)) {
            props.insert(name.clone(), cell.map(Value::String).unwrap_or(Value::Null));
        }

        let mut geometry = Map::new();
        geometry.insert("type".to_string(), Value::String("Point".to_string()));
        geometry.insert(
            "coordinates".to_string(),
            Value::Array(vec![
                Value::from(record.longitude()),
                Value::from(record.latitude()),
            ]),
        );

        features.push(feature(props, Value::Object(geometry)));
    }
    collection(features)
}

/// Country polygons carrying `name` and `num_species`, ready for a choropleth.
pub fn choropleth_geojson<'a, I>(rows: I) -> Value
where
    I: IntoIterator<Item = (&'a Country, usize)>,
{
    let features = rows
        .into_iter()
        .map(|(country, num_species)| {
            let mut props = Map::new();
            props.insert("name".to_string(), Value::String(country.name.clone()));
            props.insert("num_species".to_string(), Value::from(num_species));
            feature(props, multi_polygon_value(&country.geometry))
        })
        .collect();
    collection(features)
}

fn feature(properties: Map<String, Value>, geometry: Value) -> Value {
    let mut fobj = Map::new();
    fobj.insert("type".to_string(), Value::String("Feature".to_string()));
    fobj.insert("properties".to_string(), Value::Object(properties));
    fobj.insert("geometry".to_string(), geometry);
    Value::Object(fobj)
}

fn collection(features: Vec<Value>) -> Value {
    let mut root = Map::new();
    root.insert(
        "type".to_string(),
        Value::String("FeatureCollection".to_string()),
    );
    root.insert("features".to_string(), Value::Array(features));
    Value::Object(root)
}

fn multi_polygon_value(geom: &MultiPolygon<f64>) -> Value {
    let coords = geom
        .iter()
        .map(|poly| {
            let rings = std::iter::once(poly.exterior())
                .chain(poly.interiors())
                .map(ring_value)
                .collect();
            Value::Array(rings)
        })
        .collect();

    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String("MultiPolygon".to_string()),
    );
    obj.insert("coordinates".to_string(), Value::Array(coords));
    Value::Object(obj)
}

fn ring_value(ring: &LineString<f64>) -> Value {
    Value::Array(
        ring.coords()
            .map(|c| Value::Array(vec![Value::from(c.x), Value::from(c.y)]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use pretty_assertions::assert_eq;

    use super::{choropleth_geojson, occurrences_geojson, write_csv};
    use crate::boundary::Country;
    use crate::occurrence::{OccurrenceRecord, OccurrenceTable};

    fn table() -> OccurrenceTable {
        OccurrenceTable::new(
            vec!["basisOfRecord".to_string()],
            vec![
                OccurrenceRecord::new(
                    "Crocodylus acutus",
                    Some("Crocodylus acutus (Cuvier, 1807)".to_string()),
                    9.5,
                    -84.0,
                    vec![Some("HUMAN_OBSERVATION".to_string())],
                ),
                OccurrenceRecord::new("Caiman yacare", None, -16.0, -57.5, vec![None]),
            ],
        )
    }

    #[test]
    fn csv_export_has_display_header_and_blank_nulls() {
        let mut buf = Vec::new();
        write_csv(&table(), &mut buf, b',').unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Species,ScientificName,Latitude,Longitude,basisOfRecord",
                "Crocodylus acutus,\"Crocodylus acutus (Cuvier, 1807)\",9.5,-84,HUMAN_OBSERVATION",
                "Caiman yacare,,-16,-57.5,",
            ]
        );
    }

    #[test]
    fn point_features_are_lon_lat() {
        let fc = occurrences_geojson(&table());
        let first = &fc["features"][0];
        assert_eq!(first["geometry"]["coordinates"][0], -84.0);
        assert_eq!(first["geometry"]["coordinates"][1], 9.5);
        assert_eq!(first["properties"]["Species"], "Crocodylus acutus");
        assert!(fc["features"][1]["properties"]["ScientificName"].is_null());
    }

    #[test]
    fn choropleth_carries_counts() {
        let country = Country::new(
            "Xland",
            MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]]),
        );
        let fc = choropleth_geojson([(&country, 3usize)]);
        assert_eq!(fc["features"][0]["properties"]["num_species"], 3);
        assert_eq!(fc["features"][0]["geometry"]["type"], "MultiPolygon");
        assert_eq!(
            fc["features"][0]["geometry"]["coordinates"][0][0]
                .as_array()
                .unwrap()
                .len(),
            4
        );
    }
}
