use crate::extract::ProductRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use serde::Deserialize;
use std::io::{Read, Write};

/// Column order of the CSV output
pub const CSV_HEADER: [&str; 7] = [
    "name",
    "price",
    "url",
    "product_id",
    "image_urls",
    "image_count",
    "image_url",
];

/// Writes records as CSV rows, joining image URLs with a separator
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    separator: String,
    written: usize,
    finished: bool,
}

impl<W: Write> CsvSink<W> {
    /// Creates the sink and writes the header row
    pub fn new(writer: W, separator: &str) -> OutputResult<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(CSV_HEADER)?;
        Ok(Self {
            writer,
            separator: separator.to_string(),
            written: 0,
            finished: false,
        })
    }

    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &ProductRecord) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        let images = record
            .image_urls()
            .iter()
            .map(|image| escape_separator(image, &self.separator))
            .collect::<Vec<_>>()
            .join(&self.separator);
        let count = record.image_count().to_string();
        self.writer.write_record([
            record.name(),
            record.price(),
            record.url(),
            record.product_id(),
            images.as_str(),
            count.as_str(),
            record.image_url(),
        ])?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

/// Percent-encodes every occurrence of `separator` inside one image URL
///
/// Keeps the joined cell splittable; the encoded URL addresses the same
/// resource.
fn escape_separator(image: &str, separator: &str) -> String {
    if separator.is_empty() || !image.contains(separator) {
        return image.to_string();
    }
    let encoded: String = separator
        .bytes()
        .map(|b| format!("%{:02X}", b))
        .collect();
    image.replace(separator, &encoded)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    price: String,
    url: String,
    product_id: String,
    image_urls: String,
}

/// Reads records back from CSV produced by [`CsvSink`]
///
/// `image_count` and `image_url` are recomputed from `image_urls`.
pub fn read_csv_records<R: Read>(reader: R, separator: &str) -> OutputResult<Vec<ProductRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        let images = if row.image_urls.is_empty() {
            Vec::new()
        } else {
            row.image_urls
                .split(separator)
                .map(str::to_string)
                .collect()
        };
        records.push(ProductRecord::new(
            row.name,
            row.price,
            row.url,
            row.product_id,
            images,
        ));
    }

    Ok(records)
}
