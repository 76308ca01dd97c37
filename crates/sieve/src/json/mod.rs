//! Streaming JSON adapters.
//!
//! [`JsonReader`] and [`JsonWriter`] put JSON text on either side of the
//! token interface, so [`crate::project`] can filter a reader into a writer
//! without ever materializing the document. [`project_deserializer`] drives
//! a projection straight off any serde `Deserializer` instead.

mod reader;
mod seed;
mod writer;

use std::io::{self, Read, Write};

use tracing::debug;

use crate::error::Result;
use crate::mask::Mask;
use crate::project::project;

pub use reader::JsonReader;
pub(crate) use seed::NUMBER_TOKEN;
pub use seed::project_deserializer;
pub use writer::JsonWriter;

/// Projects a JSON document held in a string.
///
/// ```
/// use sieve::{parse, project_json_str};
///
/// let mask = parse("-z:(x)").unwrap();
/// let out = project_json_str(Some(&mask), r#"{"z":{"x":10,"y":20}}"#).unwrap();
/// assert_eq!(out, r#"{"z":{"x":10}}"#);
/// ```
pub fn project_json_str(mask: Option<&Mask>, input: &str) -> Result<String> {
    let mut reader = JsonReader::new(input.as_bytes());
    let mut writer = JsonWriter::new(Vec::new());
    project(mask, &mut reader, &mut writer)?;
    reader.end()?;
    let bytes = writer.finish()?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

/// Streams one JSON document from `reader` to `writer` through `mask`.
///
/// Anything but whitespace after the document is an error. On failure the
/// writer may already hold a partial document.
pub fn project_json_reader<R, W>(mask: Option<&Mask>, reader: R, writer: W) -> Result<()>
where
    R: Read,
    W: Write,
{
    debug!(mask = %mask.map(Mask::to_text).unwrap_or_default(), "projecting JSON stream");
    let mut source = JsonReader::new(reader);
    let mut sink = JsonWriter::new(writer);
    project(mask, &mut source, &mut sink)?;
    source.end()?;
    sink.finish()?;
    debug!(bytes = source.offset(), "JSON stream projected");
    Ok(())
}
