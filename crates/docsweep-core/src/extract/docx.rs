//! Word (.docx) text extraction
//!
//! A .docx file is a zip package; the body lives in `word/document.xml`.
//! Text runs (`w:t`) are concatenated, paragraphs end with a newline.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::FormatExtractor;
use crate::error::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// First bytes of an OLE compound file; password-protected .docx files use this container
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Extracts the flattened body text of a .docx package
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let file = File::open(path)?;
        let mut archive = match zip::ZipArchive::new(BufReader::new(file)) {
            Ok(archive) => archive,
            Err(_) if is_ole_container(path)? => return Err(ExtractionError::Encrypted),
            Err(e) => {
                return Err(ExtractionError::Open(format!("Failed to open DOCX package: {}", e)));
            }
        };

        let mut xml = String::new();
        match archive.by_name(DOCUMENT_PART) {
            Ok(mut part) => {
                part.read_to_string(&mut xml).map_err(|e| {
                    ExtractionError::Malformed(format!("Failed to read {}: {}", DOCUMENT_PART, e))
                })?;
            }
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ExtractionError::Malformed(format!("Package has no {}", DOCUMENT_PART)));
            }
            Err(e) => {
                return Err(ExtractionError::Malformed(format!("Failed to read {}: {}", DOCUMENT_PART, e)));
            }
        }

        body_text(&xml)
    }
}

fn is_ole_container(path: &Path) -> Result<bool, ExtractionError> {
    let mut head = [0u8; 8];
    let mut file = File::open(path)?;
    Ok(file.read_exact(&mut head).is_ok() && head == OLE_MAGIC)
}

/// Flatten WordprocessingML body XML to plain text
fn body_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);

    let mut output = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" | b"w:cr" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    output.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            // Entity references arrive separately from the text around them
            Ok(Event::GeneralRef(e)) => {
                if in_text {
                    let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                    if let Some(c) = resolve_entity(&name) {
                        output.push_str(&c);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Malformed(format!(
                    "XML parsing error at {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(output)
}

/// Resolve a predefined XML entity or a numeric character reference
fn resolve_entity(name: &str) -> Option<String> {
    if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return Some(resolved.to_string());
    }
    let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => name.strip_prefix('#')?.parse().ok()?,
    };
    char::from_u32(code).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    /// Write a deflated .docx package, the way Word saves them
    fn write_docx(path: &Path, body: &str) {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
            zip.start_file(DOCUMENT_PART, options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        std::fs::write(path, buf).unwrap();
    }

    fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text)
    }

    #[test]
    fn test_extract_deflated_docx_paragraphs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cv.docx");
        let body = format!("{}{}", paragraph("Jane Doe"), paragraph("jane@example.com"));
        write_docx(&path, &body);

        let text = DocxExtractor.extract(&path).unwrap();
        assert_eq!(text, "Jane Doe\njane@example.com\n");
    }

    #[test]
    fn test_runs_tabs_and_entities() {
        let body = r#"<w:p><w:r><w:t xml:space="preserve">Smith &amp; </w:t></w:r><w:r><w:t>Sons</w:t><w:tab/><w:t>&#43;1 555 123 4567</w:t></w:r></w:p>"#;
        let text = body_text(&format!("<w:body>{}</w:body>", body)).unwrap();
        assert_eq!(text, "Smith & Sons\t+1 555 123 4567\n");
    }

    #[test]
    fn test_text_outside_runs_ignored() {
        let xml = "<w:body><w:p><w:instrText>HYPERLINK</w:instrText><w:r><w:t>shown</w:t></w:r></w:p></w:body>";
        assert_eq!(body_text(xml).unwrap(), "shown\n");
    }

    #[test]
    fn test_package_without_body_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.docx");
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        std::fs::write(&path, buf).unwrap();

        let err = DocxExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_ole_wrapped_docx_is_encrypted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.docx");
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 504]);
        std::fs::write(&path, bytes).unwrap();

        let err = DocxExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Encrypted));
    }

    #[test]
    fn test_non_zip_docx_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, "plain text pretending").unwrap();

        let err = DocxExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Open(_)));
    }
}
