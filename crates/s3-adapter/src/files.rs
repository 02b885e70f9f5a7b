//! Serializers producing the tree's file contents.
//!
//! Every format renders the same flat object record; non-JSON formats go
//! through a scratch file before upload, which keeps the parquet and avro
//! writers on the plain `File` path they are built for.

use crate::config::FileFormat;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::Rng;
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while rendering a file body.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("json rendering failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv rendering failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow conversion failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet rendering failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("avro rendering failed: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("{0}")]
    Schema(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectReview {
    pub user: String,
    pub comment: String,
}

/// The flat record written into tree files. Unlike the loader document this
/// has no nested size machinery; `extra` pads the JSON rendering up to the
/// configured file size.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRecord {
    pub address: String,
    pub avg_rating: f64,
    pub city: String,
    pub country: String,
    pub email: String,
    pub free_breakfast: bool,
    pub free_parking: bool,
    pub name: String,
    pub phone: String,
    pub price: f64,
    pub public_likes: Vec<String>,
    pub reviews: Vec<ObjectReview>,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub extra: String,
}

/// Generate one record, padding `extra` so the serialized JSON reaches
/// `size` bytes.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, size: usize) -> ObjectRecord {
    use self::docwords::*;
    let mut record = ObjectRecord {
        address: word(rng),
        avg_rating: round2(rng.random_range(1.0..5.0)),
        city: word(rng),
        country: word(rng),
        email: email(rng),
        free_breakfast: rng.random_bool(0.5),
        free_parking: rng.random_bool(0.5),
        name: word(rng),
        phone: phone(rng),
        price: round2(rng.random_range(100.0..1000.0)),
        public_likes: (0..5).map(|_| word(rng)).collect(),
        reviews: (0..2)
            .map(|_| ObjectReview {
                user: username(rng),
                comment: comment(rng),
            })
            .collect(),
        kind: word(rng),
        url: url(rng),
        extra: String::new(),
    };
    let current = serde_json::to_string(&record).map(|s| s.len()).unwrap_or(0);
    record.extra = letters(rng, size.saturating_sub(current));
    record
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a record in the requested format.
pub fn render(format: FileFormat, record: &ObjectRecord) -> Result<Vec<u8>, FileError> {
    match format {
        FileFormat::Json => Ok(serde_json::to_vec_pretty(record)?),
        FileFormat::Csv => render_delimited(record, b','),
        FileFormat::Tsv => render_delimited(record, b'\t'),
        FileFormat::Parquet => render_parquet(record),
        FileFormat::Avro => render_avro(record),
    }
}

const COLUMNS: [&str; 15] = [
    "address",
    "avg_rating",
    "city",
    "country",
    "email",
    "free_breakfast",
    "free_parking",
    "name",
    "phone",
    "price",
    "public_likes",
    "reviews",
    "type",
    "url",
    "extra",
];

fn text_row(record: &ObjectRecord) -> Result<Vec<String>, FileError> {
    Ok(vec![
        record.address.clone(),
        record.avg_rating.to_string(),
        record.city.clone(),
        record.country.clone(),
        record.email.clone(),
        record.free_breakfast.to_string(),
        record.free_parking.to_string(),
        record.name.clone(),
        record.phone.clone(),
        record.price.to_string(),
        serde_json::to_string(&record.public_likes)?,
        serde_json::to_string(&record.reviews)?,
        record.kind.clone(),
        record.url.clone(),
        record.extra.clone(),
    ])
}

fn read_back(mut file: std::fs::File) -> Result<Vec<u8>, FileError> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn render_delimited(record: &ObjectRecord, delimiter: u8) -> Result<Vec<u8>, FileError> {
    let file = tempfile::tempfile()?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);
    writer.write_record(COLUMNS)?;
    writer.write_record(text_row(record)?)?;
    let file = writer
        .into_inner()
        .map_err(|e| FileError::Schema(e.to_string()))?;
    read_back(file)
}

fn render_parquet(record: &ObjectRecord) -> Result<Vec<u8>, FileError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("address", DataType::Utf8, false),
        Field::new("avg_rating", DataType::Float64, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("country", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("free_breakfast", DataType::Boolean, false),
        Field::new("free_parking", DataType::Boolean, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("phone", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
        Field::new("public_likes", DataType::Utf8, false),
        Field::new("reviews", DataType::Utf8, false),
        Field::new("type", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
        Field::new("extra", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![record.address.clone()])),
        Arc::new(Float64Array::from(vec![record.avg_rating])),
        Arc::new(StringArray::from(vec![record.city.clone()])),
        Arc::new(StringArray::from(vec![record.country.clone()])),
        Arc::new(StringArray::from(vec![record.email.clone()])),
        Arc::new(BooleanArray::from(vec![record.free_breakfast])),
        Arc::new(BooleanArray::from(vec![record.free_parking])),
        Arc::new(StringArray::from(vec![record.name.clone()])),
        Arc::new(StringArray::from(vec![record.phone.clone()])),
        Arc::new(Float64Array::from(vec![record.price])),
        Arc::new(StringArray::from(vec![serde_json::to_string(
            &record.public_likes,
        )?])),
        Arc::new(StringArray::from(vec![serde_json::to_string(
            &record.reviews,
        )?])),
        Arc::new(StringArray::from(vec![record.kind.clone()])),
        Arc::new(StringArray::from(vec![record.url.clone()])),
        Arc::new(StringArray::from(vec![record.extra.clone()])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = tempfile::tempfile()?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    let file = writer.into_inner()?;
    read_back(file)
}

const AVRO_SCHEMA: &str = r#"{
    "type": "record",
    "name": "TreeObject",
    "fields": [
        {"name": "address", "type": "string"},
        {"name": "avg_rating", "type": "double"},
        {"name": "city", "type": "string"},
        {"name": "country", "type": "string"},
        {"name": "email", "type": "string"},
        {"name": "free_breakfast", "type": "boolean"},
        {"name": "free_parking", "type": "boolean"},
        {"name": "name", "type": "string"},
        {"name": "phone", "type": "string"},
        {"name": "price", "type": "double"},
        {"name": "public_likes", "type": {"type": "array", "items": "string"}},
        {"name": "reviews", "type": "string"},
        {"name": "type", "type": "string"},
        {"name": "url", "type": "string"},
        {"name": "extra", "type": "string"}
    ]
}"#;

fn render_avro(record: &ObjectRecord) -> Result<Vec<u8>, FileError> {
    let schema = apache_avro::Schema::parse_str(AVRO_SCHEMA)?;
    let file = tempfile::tempfile()?;
    let mut writer = apache_avro::Writer::new(&schema, file);
    let mut row = apache_avro::types::Record::new(&schema)
        .ok_or_else(|| FileError::Schema("avro schema is not a record".to_string()))?;
    row.put("address", record.address.as_str());
    row.put("avg_rating", record.avg_rating);
    row.put("city", record.city.as_str());
    row.put("country", record.country.as_str());
    row.put("email", record.email.as_str());
    row.put("free_breakfast", record.free_breakfast);
    row.put("free_parking", record.free_parking);
    row.put("name", record.name.as_str());
    row.put("phone", record.phone.as_str());
    row.put("price", record.price);
    row.put(
        "public_likes",
        apache_avro::types::Value::Array(
            record
                .public_likes
                .iter()
                .map(|like| apache_avro::types::Value::String(like.clone()))
                .collect(),
        ),
    );
    row.put("reviews", serde_json::to_string(&record.reviews)?);
    row.put("type", record.kind.as_str());
    row.put("url", record.url.as_str());
    row.put("extra", record.extra.as_str());
    writer.append(row)?;
    let file = writer.into_inner()?;
    read_back(file)
}

/// Minimal fake-data helpers for the flat record.
mod docwords {
    use rand::seq::IndexedRandom;
    use rand::Rng;

    static WORDS: [&str; 16] = [
        "harbor", "meadow", "summit", "willow", "ember", "grove", "cascade", "prairie",
        "canyon", "breeze", "orchard", "lagoon", "tundra", "valley", "drift", "hollow",
    ];

    static COMMENTS: [&str; 6] = [
        "Would absolutely stay again.",
        "The view from the balcony was unbeatable.",
        "Check-in took longer than expected.",
        "Quiet rooms and generous breakfast.",
        "A short walk from the waterfront.",
        "Heating struggled on the coldest night.",
    ];

    static LETTERS: [char; 26] = [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q',
        'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];

    pub fn word<R: Rng + ?Sized>(rng: &mut R) -> String {
        WORDS.choose(rng).copied().unwrap_or_default().to_string()
    }

    pub fn comment<R: Rng + ?Sized>(rng: &mut R) -> String {
        COMMENTS.choose(rng).copied().unwrap_or_default().to_string()
    }

    pub fn username<R: Rng + ?Sized>(rng: &mut R) -> String {
        format!("{}{}", word(rng), rng.random_range(10..1000))
    }

    pub fn email<R: Rng + ?Sized>(rng: &mut R) -> String {
        format!("{}{}@example.com", word(rng), rng.random_range(1..100))
    }

    pub fn phone<R: Rng + ?Sized>(rng: &mut R) -> String {
        format!(
            "+1-{:03}-{:03}-{:04}",
            rng.random_range(200..1000),
            rng.random_range(200..1000),
            rng.random_range(0..10000)
        )
    }

    pub fn url<R: Rng + ?Sized>(rng: &mut R) -> String {
        format!("https://www.{}{}.com/", word(rng), word(rng))
    }

    pub fn letters<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
        (0..len)
            .map(|_| LETTERS[rng.random_range(0..LETTERS.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record() -> ObjectRecord {
        let mut rng = StdRng::seed_from_u64(42);
        generate(&mut rng, 1024)
    }

    #[test]
    fn test_generated_json_reaches_size() {
        let record = record();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.len() >= 1024);
    }

    #[test]
    fn test_json_rendering() {
        let bytes = render(FileFormat::Json, &record()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("avg_rating").is_some());
        assert_eq!(value["reviews"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_csv_and_tsv_have_header_and_row() {
        for (format, delim) in [(FileFormat::Csv, ','), (FileFormat::Tsv, '\t')] {
            let bytes = render(format, &record()).unwrap();
            let text = String::from_utf8(bytes).unwrap();
            let mut lines = text.lines();
            let header = lines.next().unwrap();
            assert!(header.starts_with(&format!("address{delim}avg_rating")));
            assert!(lines.next().is_some());
        }
    }

    #[test]
    fn test_parquet_rendering_is_nonempty() {
        let bytes = render(FileFormat::Parquet, &record()).unwrap();
        // Parquet files start and end with the "PAR1" magic.
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }

    #[test]
    fn test_avro_rendering_is_nonempty() {
        let bytes = render(FileFormat::Avro, &record()).unwrap();
        // Avro object container files start with "Obj\x01".
        assert_eq!(&bytes[..4], b"Obj\x01");
    }
}
