// Fills certificate form values into an xlsx template.
// An xlsx file is a zip of XML parts; the form cells live in the first
// worksheet, so that one part is rewritten and everything else is copied
// through untouched (styles, merged cells and print areas survive as-is).
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::certificate::CertificateFields;

#[derive(Debug, Error)]
pub enum FillError {
    #[error("template is not a valid workbook: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("worksheet XML is malformed: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("worksheet XML has a malformed attribute: {0}")]
    Attr(#[from] AttrError),
    #[error("workbook contains no worksheet")]
    NoWorksheet,
    #[error("worksheet XML ended inside a cell")]
    TruncatedCell,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Writes a copy of `template` to `output` with the form fields inserted
/// into their reserved cells.
pub fn fill_template(
    template: &Path,
    output: &Path,
    fields: &CertificateFields,
) -> Result<(), FillError> {
    let mut archive = ZipArchive::new(File::open(template)?)?;
    let sheet_name = first_worksheet(&archive).ok_or(FillError::NoWorksheet)?;

    let mut sheet_xml = Vec::new();
    archive.by_name(&sheet_name)?.read_to_end(&mut sheet_xml)?;
    let filled = fill_cells(&sheet_xml, &fields.cell_values())?;

    let mut writer = ZipWriter::new(File::create(output)?);
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name() != sheet_name {
            writer.raw_copy_file(entry)?;
        }
    }
    writer.start_file(sheet_name.as_str(), SimpleFileOptions::default())?;
    writer.write_all(&filled)?;
    writer.finish()?;
    Ok(())
}

fn first_worksheet<R: Read + std::io::Seek>(archive: &ZipArchive<R>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .min()
        .map(str::to_string)
}

/// Rewrites the sheet XML so each cell named in `values` carries the given
/// value as an inline string. Cell attributes other than the value type
/// (style, reference) are preserved.
fn fill_cells(xml: &[u8], values: &[(&str, &str)]) -> Result<Vec<u8>, FillError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"c" => {
                match target_value(&e, values)? {
                    Some(value) => {
                        write_inline_cell(&mut writer, &e, value)?;
                        skip_cell_body(&mut reader)?;
                    }
                    None => writer.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"c" => match target_value(&e, values)? {
                Some(value) => write_inline_cell(&mut writer, &e, value)?,
                None => writer.write_event(Event::Empty(e))?,
            },
            ev => writer.write_event(ev)?,
        }
    }

    Ok(writer.into_inner().into_inner())
}

fn target_value<'a>(
    cell: &BytesStart<'_>,
    values: &[(&str, &'a str)],
) -> Result<Option<&'a str>, FillError> {
    for attr in cell.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"r" {
            let reference = attr.unescape_value()?;
            return Ok(values
                .iter()
                .find(|(cell_ref, _)| *cell_ref == reference.as_ref())
                .map(|(_, v)| *v));
        }
    }
    Ok(None)
}

fn write_inline_cell(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    original: &BytesStart<'_>,
    value: &str,
) -> Result<(), FillError> {
    let mut cell = BytesStart::new("c");
    for attr in original.attributes() {
        let attr = attr?;
        // drop any previous value type; the cell becomes an inline string
        if attr.key.as_ref() != b"t" {
            cell.push_attribute(attr);
        }
    }
    cell.push_attribute(("t", "inlineStr"));

    writer.write_event(Event::Start(cell))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;
    writer.write_event(Event::Start(BytesStart::new("t")))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Consumes the original contents of a cell up to and including its end tag.
fn skip_cell_body(reader: &mut Reader<&[u8]>) -> Result<(), FillError> {
    let mut depth = 0u32;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                if depth == 0 && e.name().as_ref() == b"c" {
                    return Ok(());
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Err(FillError::TruncatedCell),
            _ => {}
        }
    }
}
