//! PDF document loading

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::RawDocument;

/// Loads a PDF file into one page-level document per page, in page order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a source file referenced by a job.
    pub fn load(&self, path: &Path) -> Result<Vec<RawDocument>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if extension != "pdf" {
            return Err(Error::UnsupportedFormat(format!(
                "'{}' is not a PDF file",
                path.display()
            )));
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        if !data.starts_with(b"%PDF-") {
            return Err(Error::UnsupportedFormat(format!(
                "'{}' does not start with a PDF header",
                path.display()
            )));
        }

        let source = path.display().to_string();
        let pages = Self::extract_pages(&source, &data)?;

        let documents: Vec<RawDocument> = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| RawDocument::new(source.clone(), (i + 1) as u32, normalize_page_text(&text)))
            .collect();

        if documents.iter().all(|d| d.text.is_empty()) {
            return Err(Error::parse(
                &source,
                "no text content could be extracted (image-based or encrypted PDF?)",
            ));
        }

        Ok(documents)
    }

    /// Extract page texts, preferring pdf-extract and falling back to lopdf
    /// when it cannot handle the document.
    fn extract_pages(source: &str, data: &[u8]) -> Result<Vec<String>> {
        match pdf_extract::extract_text_from_mem_by_pages(data) {
            Ok(pages) if !pages.is_empty() => Ok(pages),
            Ok(_) => Err(Error::parse(source, "PDF has no pages")),
            Err(e) => {
                tracing::warn!(source, error = %e, "pdf-extract failed, trying lopdf fallback");
                Self::extract_pages_fallback(source, data)
            }
        }
    }

    fn extract_pages_fallback(source: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::parse(source, format!("failed to load PDF: {e}")))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(Error::parse(source, "PDF has no pages"));
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in page_numbers {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::debug!(source, page = page_number, error = %e, "no text for page");
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

/// Strip NUL bytes and collapse the whitespace noise PDF extraction leaves
/// behind.
fn normalize_page_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::Write;

    /// Build a minimal PDF with one page per entry in `pages`.
    fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn write_temp(suffix: &str, data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_one_document_per_page_in_order() {
        let file = write_temp(".pdf", &sample_pdf(&["alpha", "bravo"]));
        let docs = PdfLoader::new().load(file.path()).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, 1);
        assert_eq!(docs[1].metadata.page, 2);
        assert!(docs[0].text.contains("alpha"), "page 1 was: {:?}", docs[0].text);
        assert!(docs[1].text.contains("bravo"), "page 2 was: {:?}", docs[1].text);
        assert_eq!(docs[0].metadata.source, file.path().display().to_string());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = PdfLoader::new()
            .load(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn non_pdf_extension_is_unsupported() {
        let file = write_temp(".txt", b"plain text");
        let err = PdfLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn bad_magic_is_unsupported() {
        let file = write_temp(".pdf", b"this is not a pdf at all");
        let err = PdfLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_pdf_is_a_parse_error() {
        let file = write_temp(".pdf", b"%PDF-1.5\ngarbage garbage garbage");
        let err = PdfLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got: {err:?}");
    }

    #[test]
    fn normalizes_extracted_text() {
        assert_eq!(
            normalize_page_text("  hello \0world  \n\n  second line \n"),
            "hello world\nsecond line"
        );
    }
}
