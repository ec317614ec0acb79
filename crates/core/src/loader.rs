use crate::chunking::normalize_whitespace;
use crate::error::LoadError;
use crate::models::{Document, DocumentMetadata};
use std::path::Path;
use tracing::{debug, info};

const CELL_SEPARATOR: &str = "  ";
const EMPTY_CELL: &str = "-";

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// The file holds OCR output for an image rather than native text.
    pub treat_as_image: bool,
}

/// Reads a file from disk into a [`Document`], choosing the reader by extension.
pub fn load_document(path: &Path, options: LoadOptions) -> Result<Document, LoadError> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| LoadError::MissingExtension(path.display().to_string()))?;

    let mut document = match extension.as_str() {
        "pdf" => load_pdf(path)?,
        "txt" | "md" | "text" => load_plain_text(path)?,
        "csv" => load_table(path, b',')?,
        "tsv" => load_table(path, b'\t')?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    document.metadata.file_type = Some(extension);
    document.metadata.is_image = options.treat_as_image;

    info!(
        path = %path.display(),
        file_type = document.metadata.file_type.as_deref().unwrap_or_default(),
        chars = document.full_text.len(),
        is_image = options.treat_as_image,
        "document loaded"
    );
    Ok(document)
}

fn load_pdf(path: &Path) -> Result<Document, LoadError> {
    let pdf = lopdf::Document::load(path).map_err(|error| LoadError::PdfParse(error.to_string()))?;

    let pages = pdf.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_no in pages.keys() {
        let text = pdf
            .extract_text(&[*page_no])
            .map_err(|error| LoadError::PdfParse(error.to_string()))?;
        if text.trim().is_empty() {
            debug!(page = page_no, "pdf page has no text layer");
            continue;
        }
        texts.push(text);
    }

    let metadata = DocumentMetadata {
        page_count: Some(pages.len() as u64),
        ..DocumentMetadata::default()
    };
    Ok(Document::new(texts.join("\n"), metadata))
}

fn load_plain_text(path: &Path) -> Result<Document, LoadError> {
    let text = String::from_utf8(std::fs::read(path)?)?;
    let metadata = DocumentMetadata {
        line_count: Some(text.lines().count() as u64),
        ..DocumentMetadata::default()
    };
    Ok(Document::new(text, metadata))
}

fn load_table(path: &Path, delimiter: u8) -> Result<Document, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let header = reader
        .headers()?
        .iter()
        .map(table_cell)
        .collect::<Vec<_>>();
    let mut rows = vec![header];
    for record in reader.records() {
        rows.push(record?.iter().map(table_cell).collect());
    }

    let data_rows = rows.len() - 1;
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let metadata = DocumentMetadata {
        row_count: Some(data_rows as u64),
        column_count: Some(column_count as u64),
        ..DocumentMetadata::default()
    };
    Ok(Document::new(render_table(&rows, column_count), metadata))
}

/// Cells must not contain the separator or be empty, or columns would shift
/// when the text is split back apart.
fn table_cell(raw: &str) -> String {
    let cell = normalize_whitespace(raw);
    if cell.is_empty() {
        EMPTY_CELL.to_string()
    } else {
        cell
    }
}

/// Pads every column to its widest cell and joins cells with two spaces.
fn render_table(rows: &[Vec<String>], column_count: usize) -> String {
    let mut widths = vec![0usize; column_count];
    for row in rows {
        for (column, cell) in row.iter().enumerate() {
            widths[column] = widths[column].max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let last = row.len().saturating_sub(1);
            row.iter()
                .enumerate()
                .map(|(column, cell)| {
                    if column == last {
                        cell.clone()
                    } else {
                        format!("{cell:<width$}", width = widths[column])
                    }
                })
                .collect::<Vec<_>>()
                .join(CELL_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
