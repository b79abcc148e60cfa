//! Report export: CSV and XLSX payloads, base64 download links, files on disk.
//!
//! Both formats carry the header row and no index column. The XLSX writer
//! emits the smallest Office Open XML package spreadsheet applications
//! accept: content types, package and workbook relationships, a workbook
//! and one sheet of inline strings.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bioactivity_common::{ReportError, Result};
use bioactivity_ingestion::units::parse_numeric;
use quick_xml::escape::escape;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::text_table::TextTable;

pub const CSV_MIME: &str = "text/csv";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const NO_DATA_LINK: &str = "<em>No data to download</em>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl FromStr for ExportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(ReportError::Unsupported(s.trim().to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_MIME,
            ExportFormat::Xlsx => XLSX_MIME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvSeparator {
    #[default]
    Comma,
    Semicolon,
    Tab,
}

impl CsvSeparator {
    pub fn as_byte(&self) -> u8 {
        match self {
            CsvSeparator::Comma => b',',
            CsvSeparator::Semicolon => b';',
            CsvSeparator::Tab => b'\t',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CsvSeparator::Comma => "Comma ,",
            CsvSeparator::Semicolon => "Semicolon ;",
            CsvSeparator::Tab => "Tab \\t",
        }
    }
}

impl FromStr for CsvSeparator {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "," => return Ok(CsvSeparator::Comma),
            ";" => return Ok(CsvSeparator::Semicolon),
            "\t" | "\\t" => return Ok(CsvSeparator::Tab),
            _ => {}
        }
        match s.trim().to_lowercase().as_str() {
            "comma" => Ok(CsvSeparator::Comma),
            "semicolon" => Ok(CsvSeparator::Semicolon),
            "tab" => Ok(CsvSeparator::Tab),
            other => Err(ReportError::Config(format!("Unknown CSV separator '{}'", other))),
        }
    }
}

/// A serialized table ready to be saved or offered for download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }

    /// HTML anchor that downloads the payload from an in-page data URI.
    pub fn download_link(&self) -> String {
        format!(
            "<a download=\"{name}\" href=\"{uri}\">⬇️ Download {name}</a>",
            name = escape(&self.filename),
            uri = self.data_uri()
        )
    }

    /// Writes the payload into `dir` under its filename.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Export written");
        Ok(path)
    }
}

/// Serializes `table` as `<stem>.<ext>`.
pub fn export_table(
    table: &TextTable,
    format: ExportFormat,
    separator: CsvSeparator,
    stem: &str,
) -> Result<ExportArtifact> {
    let bytes = match format {
        ExportFormat::Csv => to_csv(table, separator)?,
        ExportFormat::Xlsx => to_xlsx(table)?,
    };
    debug!(format = format.extension(), bytes = bytes.len(), "Table serialized");
    Ok(ExportArtifact {
        filename: format!("{}.{}", stem, format.extension()),
        mime: format.mime(),
        bytes,
    })
}

/// Like [`export_table`] but returns the HTML download link, or a placeholder
/// when there is nothing to download.
pub fn download_link(
    table: &TextTable,
    format: ExportFormat,
    separator: CsvSeparator,
    stem: &str,
) -> Result<String> {
    if table.is_empty() {
        return Ok(NO_DATA_LINK.to_string());
    }
    Ok(export_table(table, format, separator, stem)?.download_link())
}

pub fn to_csv(table: &TextTable, separator: CsvSeparator) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(separator.as_byte())
        .from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::Export(format!("CSV flush failed: {}", e)))
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

pub fn to_xlsx(table: &TextTable) -> Result<Vec<u8>> {
    let sheet = sheet_xml(table);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", PACKAGE_RELS_XML),
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(body.as_bytes())?;
    }
    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> ReportError {
    ReportError::Export(format!("XLSX packaging failed: {}", e))
}

fn sheet_xml(table: &TextTable) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );

    push_sheet_row(&mut xml, 1, &table.headers, &[]);
    for (i, row) in table.rows.iter().enumerate() {
        push_sheet_row(&mut xml, i + 2, row, &table.numeric);
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_sheet_row(xml: &mut String, row_no: usize, cells: &[String], numeric: &[bool]) {
    xml.push_str(&format!("<row r=\"{}\">", row_no));
    for (col, cell) in cells.iter().enumerate() {
        if cell.is_empty() {
            continue;
        }
        let reference = format!("{}{}", column_letter(col), row_no);
        let number = numeric
            .get(col)
            .copied()
            .unwrap_or(false)
            .then(|| parse_numeric(cell))
            .flatten();
        match number {
            Some(n) => xml.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, n)),
            None => xml.push_str(&format!(
                "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                reference,
                escape(cell.as_str())
            )),
        }
    }
    xml.push_str("</row>");
}

/// Zero-based column index to spreadsheet letters: 0 → A, 25 → Z, 26 → AA.
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use bioactivity_ingestion::{DerivedRow, DisplayTable};
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn sample() -> TextTable {
        TextTable::from(&DisplayTable::new(vec![
            DerivedRow {
                target: "Cyclooxygenase-1".to_string(),
                activity: "IC50".to_string(),
                value: "1670".to_string(),
                units: "nM".to_string(),
                kd_nm: None,
            },
            DerivedRow {
                target: "Prostaglandin G/H synthase, \"COX\" & co".to_string(),
                activity: "KA".to_string(),
                value: "2000000".to_string(),
                units: "M^-1".to_string(),
                kd_nm: Some(500.0),
            },
        ]))
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" xlsx ".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        let err = "parquet".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, ReportError::Unsupported(ref f) if f == "parquet"));
    }

    #[test]
    fn test_separator_parsing() {
        assert_eq!(";".parse::<CsvSeparator>().unwrap(), CsvSeparator::Semicolon);
        assert_eq!("tab".parse::<CsvSeparator>().unwrap(), CsvSeparator::Tab);
        assert_eq!("\\t".parse::<CsvSeparator>().unwrap(), CsvSeparator::Tab);
        assert!("pipe".parse::<CsvSeparator>().is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let table = sample();
        let bytes = to_csv(&table, CsvSeparator::Comma).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();

        assert_eq!(headers, table.headers);
        assert_eq!(rows, table.rows);
    }

    #[test]
    fn test_csv_semicolon_separator() {
        let bytes = to_csv(&sample(), CsvSeparator::Semicolon).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("Target;Activity;Value;Units;Kd (nM) (from KA)\n"));
        assert!(text.contains("Cyclooxygenase-1;IC50;1670;nM;\n"));
    }

    #[test]
    fn test_xlsx_package_contents() {
        let bytes = to_xlsx(&sample()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("xl/workbook.xml").is_ok());

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains("<c r=\"A1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Target</t></is></c>"));
        assert!(sheet.contains("<c r=\"E3\"><v>500</v></c>"));
        assert!(sheet.contains("&quot;COX&quot; &amp; co"));
        assert!(!sheet.contains("r=\"E2\""));
    }

    #[test]
    fn test_artifact_and_download_link() {
        let artifact = export_table(&sample(), ExportFormat::Csv, CsvSeparator::Comma, "bioactivity").unwrap();
        assert_eq!(artifact.filename, "bioactivity.csv");
        assert!(artifact.data_uri().starts_with("data:text/csv;base64,"));

        let decoded = STANDARD.decode(artifact.to_base64()).unwrap();
        assert_eq!(decoded, artifact.bytes);

        let link = artifact.download_link();
        assert!(link.starts_with("<a download=\"bioactivity.csv\" href=\"data:text/csv;base64,"));
        assert!(link.ends_with("⬇️ Download bioactivity.csv</a>"));
    }

    #[test]
    fn test_empty_table_has_no_download() {
        let empty = TextTable::from(&DisplayTable::default());
        let link = download_link(&empty, ExportFormat::Xlsx, CsvSeparator::Comma, "bioactivity").unwrap();
        assert_eq!(link, "<em>No data to download</em>");
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = export_table(&sample(), ExportFormat::Xlsx, CsvSeparator::Comma, "report").unwrap();
        let path = artifact.save(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "report.xlsx");
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(4), "E");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }
}
