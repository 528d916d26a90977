//! Minimal SpreadsheetML (xlsx) writer
//!
//! An xlsx file is a zip package of XML parts. The package carries content
//! types, package and workbook relationships, the workbook part, a minimal
//! stylesheet (default and bold header formats) and one worksheet per sheet.
//! Cells are written as inline strings so no shared-string table is required.

use super::{Sheet, Workbook};
use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Longest text a single cell may hold
const MAX_CELL_CHARS: usize = 32_767;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Index into `cellXfs` for header cells
const HEADER_STYLE: usize = 1;

/// Excel requires two fills (`none`, `gray125`) and at least one font,
/// border and cell format
const STYLESHEET: &str = concat!(
    "<fonts count=\"2\">",
    "<font><sz val=\"11\"/><name val=\"Calibri\"/><family val=\"2\"/></font>",
    "<font><b/><sz val=\"11\"/><name val=\"Calibri\"/><family val=\"2\"/></font>",
    "</fonts>",
    "<fills count=\"2\">",
    "<fill><patternFill patternType=\"none\"/></fill>",
    "<fill><patternFill patternType=\"gray125\"/></fill>",
    "</fills>",
    "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>",
    "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
    "<cellXfs count=\"2\">",
    "<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>",
    "<xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\"/>",
    "</cellXfs>",
    "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
);

impl Workbook {
    /// Serialize the workbook as an xlsx package
    ///
    /// # Errors
    ///
    /// [`Error::Workbook`] when the workbook has no sheets (the format
    /// requires at least one) or the package cannot be written.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        if self.sheets.is_empty() {
            return Err(Error::Workbook(
                "a workbook needs at least one sheet".to_string(),
            ));
        }

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut put = |name: &str, body: String| -> Result<()> {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
            Ok(())
        };

        put("[Content_Types].xml", content_types(self.sheets.len()))?;
        put("_rels/.rels", package_rels())?;
        put("xl/workbook.xml", workbook_part(&self.sheets))?;
        put("xl/_rels/workbook.xml.rels", workbook_rels(self.sheets.len()))?;
        put("xl/styles.xml", styles_part())?;
        for (i, sheet) in self.sheets.iter().enumerate() {
            put(&format!("xl/worksheets/sheet{}.xml", i + 1), worksheet_part(sheet))?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = format!(
        "{XML_DECLARATION}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
         <Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>"
    );
    for n in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Override PartName=\"/xl/worksheets/sheet{n}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        "{XML_DECLARATION}<Relationships xmlns=\"{NS_PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{NS_REL}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         </Relationships>"
    )
}

fn workbook_part(sheets: &[Sheet]) -> String {
    let mut xml = format!(
        "{XML_DECLARATION}<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_REL}\"><sheets>"
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        let _ = write!(
            xml,
            "<sheet name=\"{}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>",
            escape(&sheet.title)
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = format!("{XML_DECLARATION}<Relationships xmlns=\"{NS_PKG_REL}\">");
    for n in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Relationship Id=\"rId{n}\" Type=\"{NS_REL}/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>"
        );
    }
    // Styles take the id after the last worksheet
    let _ = write!(
        xml,
        "<Relationship Id=\"rId{}\" Type=\"{NS_REL}/styles\" Target=\"styles.xml\"/>",
        sheet_count + 1
    );
    xml.push_str("</Relationships>");
    xml
}

fn styles_part() -> String {
    format!("{XML_DECLARATION}<styleSheet xmlns=\"{NS_MAIN}\">{STYLESHEET}</styleSheet>")
}

/// Used range of a sheet as an A1 reference, header row included
fn dimension(sheet: &Sheet) -> String {
    let columns = sheet.header.len();
    if columns == 0 {
        return "A1".to_string();
    }
    format!("A1:{}{}", column_name(columns), sheet.rows.len() + 1)
}

fn worksheet_part(sheet: &Sheet) -> String {
    let mut xml = format!(
        "{XML_DECLARATION}<worksheet xmlns=\"{NS_MAIN}\"><dimension ref=\"{}\"/><sheetData>",
        dimension(sheet)
    );
    write_row(&mut xml, 1, &sheet.header, Some(HEADER_STYLE));
    for (r, cells) in sheet.rows.iter().enumerate() {
        write_row(&mut xml, r + 2, cells, None);
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_row(xml: &mut String, row_number: usize, cells: &[String], style: Option<usize>) {
    let style = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    let _ = write!(xml, "<row r=\"{row_number}\">");
    for (c, text) in cells.iter().enumerate() {
        // Blank cells are simply omitted
        if text.is_empty() {
            continue;
        }
        let text: String = text.chars().take(MAX_CELL_CHARS).collect();
        let _ = write!(
            xml,
            "<c r=\"{}{row_number}\"{style} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            column_name(c + 1),
            escape(&text)
        );
    }
    xml.push_str("</row>");
}

/// Spreadsheet column letters for a 1-based index (1 → A, 27 → AA)
fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Escape text for XML content and attributes, dropping characters XML 1.0 cannot carry
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
