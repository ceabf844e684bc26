#![allow(dead_code)]

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub enum Kind {
    Text,
    Double,
    Int,
}

#[derive(Clone, Copy, Debug)]
pub enum Cell {
    Text(&'static str),
    Double(f64),
    Int(i32),
    Null,
}

/// Write `rows` as a Parquet file with `rows_per_group` rows per row group.
///
/// Every column is OPTIONAL so `Cell::Null` can be written anywhere.
pub fn write_parquet(
    path: &Path,
    columns: &[(&str, Kind)],
    rows: &[Vec<Cell>],
    rows_per_group: usize,
) {
    let fields: String = columns
        .iter()
        .map(|(name, kind)| match kind {
            Kind::Text => format!("OPTIONAL BINARY {name} (UTF8);\n"),
            Kind::Double => format!("OPTIONAL DOUBLE {name};\n"),
            Kind::Int => format!("OPTIONAL INT32 {name};\n"),
        })
        .collect();
    let schema = Arc::new(
        parse_message_type(&format!("message test_schema {{\n{fields}}}"))
            .expect("fixture schema"),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).expect("create fixture file");
    let mut writer = SerializedFileWriter::new(file, schema, props).expect("fixture writer");

    for group in rows.chunks(rows_per_group.max(1)) {
        let mut row_group = writer.next_row_group().expect("next row group");
        for (idx, (_, kind)) in columns.iter().enumerate() {
            let mut col_writer = row_group
                .next_column()
                .expect("next column")
                .expect("column present");
            let def_levels: Vec<i16> = group
                .iter()
                .map(|row| if matches!(row[idx], Cell::Null) { 0 } else { 1 })
                .collect();
            match kind {
                Kind::Text => {
                    let values: Vec<ByteArray> = group
                        .iter()
                        .filter_map(|row| match row[idx] {
                            Cell::Text(value) => Some(ByteArray::from(value)),
                            Cell::Null => None,
                            other => panic!("expected text cell, got {other:?}"),
                        })
                        .collect();
                    col_writer
                        .typed::<ByteArrayType>()
                        .write_batch(&values, Some(&def_levels), None)
                        .expect("write text column");
                }
                Kind::Double => {
                    let values: Vec<f64> = group
                        .iter()
                        .filter_map(|row| match row[idx] {
                            Cell::Double(value) => Some(value),
                            Cell::Null => None,
                            other => panic!("expected double cell, got {other:?}"),
                        })
                        .collect();
                    col_writer
                        .typed::<DoubleType>()
                        .write_batch(&values, Some(&def_levels), None)
                        .expect("write double column");
                }
                Kind::Int => {
                    let values: Vec<i32> = group
                        .iter()
                        .filter_map(|row| match row[idx] {
                            Cell::Int(value) => Some(value),
                            Cell::Null => None,
                            other => panic!("expected int cell, got {other:?}"),
                        })
                        .collect();
                    col_writer
                        .typed::<Int32Type>()
                        .write_batch(&values, Some(&def_levels), None)
                        .expect("write int column");
                }
            }
            col_writer.close().expect("close column");
        }
        assert!(row_group.next_column().expect("no extra column").is_none());
        row_group.close().expect("close row group");
    }
    writer.close().expect("close fixture writer");
}

/// SIM-style file: municipality of occurrence as text plus an unrelated column.
pub fn write_sim_file(path: &Path, codes: &[Cell], rows_per_group: usize) {
    let rows: Vec<Vec<Cell>> = codes
        .iter()
        .map(|code| vec![*code, Cell::Text("01012022")])
        .collect();
    write_parquet(
        path,
        &[("CODMUNOCOR", Kind::Text), ("DTOBITO", Kind::Text)],
        &rows,
        rows_per_group,
    );
}
