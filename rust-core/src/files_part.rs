use crate::sheet_name::{same_sheet_name, validate_sheet_name};
use crate::table::{CellValue, Table};
use ::zip as zip_crate;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesText, Event},
};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::{
    borrow::Cow,
    fs::{self, File},
    io::{self, Read, Seek, Write},
    path::Path,
};
use tempfile::NamedTempFile;

const WORKBOOK_XML: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// What is on disk at a workbook path.
#[derive(Debug)]
pub enum WorkbookState {
    Absent,
    /// Sheet names in tab order.
    Present(Vec<String>),
    /// The file exists but is not a readable xlsx archive.
    Unreadable(anyhow::Error),
}

/// Looks at `path` without modifying it.
pub fn probe_workbook<P: AsRef<Path>>(path: P) -> WorkbookState {
    let path = path.as_ref();
    if !path.exists() {
        return WorkbookState::Absent;
    }
    match sheet_names(path) {
        Ok(names) => WorkbookState::Present(names),
        Err(e) => WorkbookState::Unreadable(e),
    }
}

/// `true` when the workbook at `path` already has a sheet called
/// `sheet_name` (compared without case). An absent or unreadable workbook has
/// no sheets.
pub fn sheet_exists<P: AsRef<Path>>(path: P, sheet_name: &str) -> bool {
    match probe_workbook(path) {
        WorkbookState::Present(names) => names.iter().any(|n| same_sheet_name(n, sheet_name)),
        WorkbookState::Absent | WorkbookState::Unreadable(_) => false,
    }
}

/// Reads the sheet names of a workbook, in tab order.
pub fn sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut zip = open_archive(path)?;
    let wb_xml = read_part(&mut zip, WORKBOOK_XML)?;
    sheet_names_in(&wb_xml)
}

/// Writes `table` into the sheet `sheet_name` of the workbook at `path`.
///
/// An existing workbook gets the sheet appended after its other sheets, with
/// every other part of the archive copied through untouched. A missing
/// workbook is created with this single sheet. Either way the result is first
/// written to a temporary file next to `path` and only renamed over it once
/// complete.
///
/// # Arguments
/// * `table` - Header row and data rows to write.
/// * `path` - The `.xlsx` file to create or extend.
/// * `sheet_name` - Name of the new sheet; must not exist in the workbook yet.
///
/// # Returns
/// A `Result` indicating success or an `anyhow::Error` if the operation fails.
pub fn write_sheet<P: AsRef<Path>>(table: &Table, path: P, sheet_name: &str) -> Result<()> {
    let path = path.as_ref();
    validate_sheet_name(sheet_name)?;

    if path.exists() {
        append_sheet(table, path, sheet_name)?;
        info!("appended sheet `{}` to {}", sheet_name, path.display());
    } else {
        create_workbook(table, path, sheet_name)?;
        info!("created {} with sheet `{}`", path.display(), sheet_name);
    }
    Ok(())
}

fn create_workbook(table: &Table, path: &Path, sheet_name: &str) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, label) in table.header().iter().enumerate() {
        write_cell(worksheet, 0, col, label)?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1).context("too many rows for one sheet")?;
        for (col, cell) in row.iter().enumerate() {
            if let Some(token) = cell {
                write_cell(worksheet, row_num, col, token)?;
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    let mut tmp = temp_beside(path)?;
    tmp.write_all(&bytes)?;
    tmp.persist(path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: usize, token: &str) -> Result<()> {
    let col = u16::try_from(col).context("too many columns for one sheet")?;
    match CellValue::from_token(token) {
        CellValue::Number(n) => worksheet.write_number(row, col, n)?,
        CellValue::Text(text) => worksheet.write_string(row, col, text)?,
    };
    Ok(())
}

fn append_sheet(table: &Table, path: &Path, sheet_name: &str) -> Result<()> {
    let mut zin = open_archive(path)?;

    // ── части, которые меняем ────────────────────────────────────
    let mut wb_xml = read_part(&mut zin, WORKBOOK_XML)?;
    let mut rels_xml = read_part(&mut zin, WORKBOOK_RELS)?;
    let mut types_xml = read_part(&mut zin, CONTENT_TYPES)?;

    if sheet_names_in(&wb_xml)?
        .iter()
        .any(|n| same_sheet_name(n, sheet_name))
    {
        bail!("Sheet {} already exists", sheet_name);
    }

    // -------- свободные sheetId / rId / sheet#.xml ----------
    let sheet_id = max_numbered_attr(&wb_xml, b"sheet", b"sheetId", "")? + 1;
    let rid = max_numbered_attr(&rels_xml, b"Relationship", b"Id", "rId")? + 1;
    let sheet_no = zin
        .file_names()
        .filter_map(|name| {
            name.strip_prefix("xl/worksheets/sheet")
                .and_then(|s| s.strip_suffix(".xml"))
                .and_then(|s| s.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0)
        + 1;
    let sheet_path = format!("xl/worksheets/sheet{sheet_no}.xml");
    debug!("new part {sheet_path}: sheetId={sheet_id}, rId{rid}");

    insert_before(
        &mut wb_xml,
        b"</sheets>",
        &format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_escape(sheet_name),
            sheet_id,
            rid
        ),
        WORKBOOK_XML,
    )?;
    insert_before(
        &mut rels_xml,
        b"</Relationships>",
        &format!(
            r#"<Relationship Id="rId{rid}" Type="{WORKSHEET_REL_TYPE}" Target="worksheets/sheet{sheet_no}.xml"/>"#
        ),
        WORKBOOK_RELS,
    )?;
    insert_before(
        &mut types_xml,
        b"</Types>",
        &format!(r#"<Override PartName="/{sheet_path}" ContentType="{WORKSHEET_CONTENT_TYPE}"/>"#),
        CONTENT_TYPES,
    )?;

    let sheet_xml = render_sheet(table).context("cannot render worksheet XML")?;

    // -------- пишем новый архив во временный файл ----------
    let mut tmp = temp_beside(path)?;
    {
        let mut zout = zip_crate::ZipWriter::new(tmp.as_file_mut());
        let opt: zip_crate::write::FileOptions<'_, ()> = zip_crate::write::FileOptions::default()
            .compression_method(zip_crate::CompressionMethod::Deflated)
            .compression_level(Some(1));

        for i in 0..zin.len() {
            let file = zin.by_index_raw(i)?;
            let name = file.name().to_owned();
            let rewritten: Option<&[u8]> = match name.as_str() {
                WORKBOOK_XML => Some(wb_xml.as_slice()),
                WORKBOOK_RELS => Some(rels_xml.as_slice()),
                CONTENT_TYPES => Some(types_xml.as_slice()),
                _ => None,
            };
            match rewritten {
                Some(content) => {
                    zout.start_file(name, opt)?;
                    zout.write_all(content)?;
                }
                None => zout.raw_copy_file(file)?,
            }
        }

        zout.start_file(sheet_path.as_str(), opt)?;
        zout.write_all(&sheet_xml)?;
        zout.finish()?;
    }

    // права исходной книги переносим на новую
    let perms = fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?
        .permissions();
    tmp.as_file()
        .set_permissions(perms)
        .with_context(|| format!("cannot copy permissions of {}", path.display()))?;

    // переименовываем временный файл в целевой
    tmp.persist(path)
        .with_context(|| format!("cannot replace {}", path.display()))?;
    Ok(())
}

fn open_archive(path: &Path) -> Result<zip_crate::ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    zip_crate::ZipArchive::new(file)
        .with_context(|| format!("{} is not an xlsx workbook", path.display()))
}

fn read_part<R: Read + Seek>(zip: &mut zip_crate::ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut part = zip
        .by_name(name)
        .with_context(|| format!("{name} not found"))?;
    let mut buf = Vec::with_capacity(part.size() as usize);
    part.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Temporary file in the destination's directory, so the final rename stays
/// on one filesystem.
fn temp_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create a temporary file in {}", dir.display()))
}

fn sheet_names_in(wb_xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(wb_xml);
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    loop {
        match reader.read_event().context("malformed workbook.xml")? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                if let Some(raw) = e.attributes().with_checks(false).flatten().find_map(|a| {
                    (a.key.as_ref() == b"name")
                        .then(|| String::from_utf8_lossy(&a.value).into_owned())
                }) {
                    let name = match quick_xml::escape::unescape(&raw) {
                        Ok(unescaped) => unescaped.into_owned(),
                        Err(_) => raw.clone(),
                    };
                    names.push(name);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

/// Largest `N` among `<element attr="{prefix}N">` in `xml`, or 0.
fn max_numbered_attr(xml: &[u8], element: &[u8], attr: &[u8], prefix: &str) -> Result<u32> {
    let mut rdr = Reader::from_reader(xml);
    rdr.config_mut().trim_text(true);

    let mut max = 0u32;
    loop {
        match rdr.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == element => {
                let n = e
                    .attributes()
                    .with_checks(false)
                    .flatten()
                    .find_map(|a| {
                        (a.key.as_ref() == attr)
                            .then(|| String::from_utf8_lossy(&a.value).into_owned())
                    })
                    .and_then(|v| v.strip_prefix(prefix).and_then(|n| n.parse::<u32>().ok()));
                if let Some(n) = n {
                    max = max.max(n);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(max)
}

fn insert_before(xml: &mut Vec<u8>, closing: &[u8], tag: &str, part: &str) -> Result<()> {
    let Some(pos) = memchr::memmem::rfind(xml, closing) else {
        bail!("{} not found in {part}", String::from_utf8_lossy(closing));
    };
    xml.splice(pos..pos, tag.bytes());
    Ok(())
}

/// Worksheet part for `table`: header in row 1, records from row 2, strings
/// inline so the workbook's shared string table stays untouched.
fn render_sheet(table: &Table) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer
        .create_element("worksheet")
        .with_attribute(("xmlns", MAIN_NS))
        .write_inner_content(|w| {
            w.create_element("sheetData").write_inner_content(|w| {
                let header = table.header();
                write_row(w, 1, header.iter().map(|h| Some(h.as_str())))?;
                for (i, row) in table.rows().iter().enumerate() {
                    write_row(w, i as u32 + 2, row.iter().map(|c| c.as_deref()))?;
                }
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(writer.into_inner())
}

fn write_row<'a, W: Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    cells: impl Iterator<Item = Option<&'a str>>,
) -> io::Result<()> {
    writer
        .create_element("row")
        .with_attribute(("r", row_num.to_string().as_str()))
        .write_inner_content(|w| {
            for (col_idx, cell) in cells.enumerate() {
                // пустые ячейки не пишем
                let Some(token) = cell else { continue };
                let coord = format!("{}{}", col_letter(col_idx as u32), row_num);
                let c_elem = w.create_element("c").with_attribute(("r", coord.as_str()));
                match CellValue::from_token(token) {
                    CellValue::Number(_) => {
                        c_elem.write_inner_content(|w2| {
                            w2.create_element("v")
                                .write_text_content(BytesText::new(token))?;
                            Ok(())
                        })?;
                    }
                    CellValue::Text(text) => {
                        c_elem
                            .with_attribute(("t", "inlineStr"))
                            .write_inner_content(|w2| {
                                w2.create_element("is").write_inner_content(|w3| {
                                    let text = escape_cell_text(text);
                                    w3.create_element("t")
                                        .write_text_content(BytesText::new(&text))?;
                                    Ok(())
                                })?;
                                Ok(())
                            })?;
                    }
                }
            }
            Ok(())
        })?;
    Ok(())
}

/// 0-based column index to letters: 0 -> "A", 26 -> "AA".
fn col_letter(mut n: u32) -> String {
    let mut s = String::new();
    loop {
        s.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

/// Cell text as spreadsheet applications store it: C0 control characters
/// other than tab, newline and carriage return become `_xHHHH_`, and a
/// literal `_xHHHH_` gets its underscore escaped as `_x005F_` so readers do
/// not decode it. Same encoding `rust_xlsxwriter` applies to new workbooks.
fn escape_cell_text(text: &str) -> Cow<'_, str> {
    if !text.contains("_x") && !text.chars().any(is_escaped_control) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 7);
    for (i, c) in text.char_indices() {
        if c == '_' && starts_with_escape(&text.as_bytes()[i..]) {
            out.push_str("_x005F_");
        } else if is_escaped_control(c) {
            out.push_str(&format!("_x{:04X}_", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn is_escaped_control(c: char) -> bool {
    c <= '\u{1f}' && !matches!(c, '\t' | '\n' | '\r')
}

/// `_xHHHH_` at the start of `s`.
fn starts_with_escape(s: &[u8]) -> bool {
    s.len() >= 7
        && s.starts_with(b"_x")
        && s[2..6].iter().all(u8::is_ascii_hexdigit)
        && s[6] == b'_'
}

// Простейший экранировщик для XML-атрибутов.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
