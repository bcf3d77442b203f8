use crate::extract::ProductRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use std::io::Write;

/// Streams records as one pretty-printed JSON array
pub struct JsonArraySink<W: Write> {
    writer: W,
    written: usize,
    finished: bool,
}

impl<W: Write> JsonArraySink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            finished: false,
        }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonArraySink<W> {
    fn write(&mut self, record: &ProductRecord) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        let separator = if self.written == 0 { "[\n" } else { ",\n" };
        self.writer.write_all(separator.as_bytes())?;
        serde_json::to_writer_pretty(&mut self.writer, record)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        let trailer = if self.written == 0 { "[]\n" } else { "\n]\n" };
        self.writer.write_all(trailer.as_bytes())?;
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

/// Writes one compact JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
    finished: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            finished: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &ProductRecord) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
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
