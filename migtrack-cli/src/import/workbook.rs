//! Open a workbook and read one worksheet's raw cell stream
//!
//! `.xlsx`/`.xlsm` packages are read part by part so shared-string references
//! reach the grid extractor unresolved. Other formats (`.xls`, `.xlsb`,
//! `.ods`) go through calamine, which hands back resolved values.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use roxmltree::{Document, Node};
use zip::ZipArchive;
use zip::result::ZipError;

use super::column::split_cell_reference;
use super::error::ImportError;
use super::grid::{CellContent, RawCell, RawRow, RawSheet};

/// Read the selected (or first) worksheet of a workbook
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<RawSheet, ImportError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" => read_ooxml(path, sheet),
        _ => read_with_calamine(path, sheet),
    }
}

/// Pick a sheet by name (case-insensitive) or fall back to the first one
fn pick_sheet(names: &[String], wanted: Option<&str>, path: &Path) -> Result<usize, ImportError> {
    if names.is_empty() {
        return Err(ImportError::open(path, "workbook has no sheets"));
    }

    match wanted {
        None => Ok(0),
        Some(wanted) => names
            .iter()
            .position(|n| n.trim().eq_ignore_ascii_case(wanted.trim()))
            .ok_or_else(|| {
                ImportError::open(
                    path,
                    format!("sheet '{}' not found (available: {})", wanted, names.join(", ")),
                )
            }),
    }
}

// ============================================================================
// OOXML packages
// ============================================================================

fn read_ooxml(path: &Path, sheet: Option<&str>) -> Result<RawSheet, ImportError> {
    let file = File::open(path).map_err(|e| ImportError::open(path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| ImportError::open(path, e))?;

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")
        .map_err(|e| ImportError::open(path, e))?
        .ok_or_else(|| ImportError::open(path, "missing xl/workbook.xml"))?;
    let sheets = parse_workbook_sheets(&workbook_xml).map_err(|e| ImportError::open(path, e))?;

    let names: Vec<String> = sheets.iter().map(|(name, _)| name.clone()).collect();
    let (sheet_name, rel_id) = sheets[pick_sheet(&names, sheet, path)?].clone();

    let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")
        .map_err(|e| ImportError::open(path, e))?
        .ok_or_else(|| ImportError::open(path, "missing xl/_rels/workbook.xml.rels"))?;
    let relationships = parse_relationships(&rels_xml).map_err(|e| ImportError::open(path, e))?;
    let target = relationships.get(&rel_id).ok_or_else(|| {
        ImportError::open(
            path,
            format!("relationship '{}' for sheet '{}' not found", rel_id, sheet_name),
        )
    })?;
    let part_name = resolve_part_name(target);

    let shared_strings = read_part(&mut archive, "xl/sharedStrings.xml")
        .map_err(|e| ImportError::open(path, e))?
        .map(|xml| parse_shared_strings(&xml))
        .transpose()
        .map_err(|e| ImportError::open(path, e))?;

    let sheet_xml = read_part(&mut archive, &part_name)
        .map_err(|e| ImportError::open(path, e))?
        .ok_or_else(|| ImportError::open(path, format!("missing worksheet part {}", part_name)))?;
    let rows = parse_sheet_rows(&sheet_xml).map_err(|e| ImportError::open(path, e))?;

    log::debug!(
        "Read sheet '{}' from {}: {} row(s), {} shared string(s)",
        sheet_name,
        part_name,
        rows.len(),
        shared_strings.as_ref().map(|s| s.len()).unwrap_or(0)
    );

    Ok(RawSheet {
        name: sheet_name,
        shared_strings,
        rows,
    })
}

/// Read a package part as text; `None` when the part does not exist
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>, String> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut xml = String::new();
            part.read_to_string(&mut xml)
                .map_err(|e| format!("failed to read {}: {}", name, e))?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(format!("failed to open {}: {}", name, e)),
    }
}

/// Worksheet targets are relative to `xl/` unless absolute
fn resolve_part_name(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{}", target.trim_start_matches("./"))
    }
}

fn local_attribute<'a>(node: &Node<'a, '_>, local_name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attr| attr.name() == local_name)
        .map(|attr| attr.value())
}

/// (sheet name, relationship id) in workbook order
fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>, String> {
    let doc = Document::parse(xml).map_err(|e| format!("invalid workbook.xml: {}", e))?;

    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("sheet"))
        .filter_map(|n| {
            let name = n.attribute("name")?;
            let id = local_attribute(&n, "id")?;
            Some((name.to_string(), id.to_string()))
        })
        .collect())
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, String> {
    let doc = Document::parse(xml).map_err(|e| format!("invalid workbook relationships: {}", e))?;

    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("Relationship"))
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect())
}

/// Concatenated text of `<t>` runs, skipping phonetic (`<rPh>`) runs
fn run_text(node: Node) -> String {
    let mut text = String::new();
    for t in node.descendants().filter(|n| n.has_tag_name("t")) {
        if t.ancestors().any(|a| a.has_tag_name("rPh")) {
            continue;
        }
        if let Some(s) = t.text() {
            text.push_str(s);
        }
    }
    text
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let doc = Document::parse(xml).map_err(|e| format!("invalid sharedStrings.xml: {}", e))?;

    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("si"))
        .map(run_text)
        .collect())
}

fn parse_sheet_rows(xml: &str) -> Result<Vec<RawRow>, String> {
    let doc = Document::parse(xml).map_err(|e| format!("invalid worksheet xml: {}", e))?;

    let mut rows = Vec::new();
    let mut next_row = 0usize;

    for row_node in doc.descendants().filter(|n| n.has_tag_name("row")) {
        // `r` is 1-based; rows without it follow the previous one
        let index = row_node
            .attribute("r")
            .and_then(|r| r.trim().parse::<usize>().ok())
            .filter(|r| *r > 0)
            .map(|r| r - 1)
            .unwrap_or(next_row);
        next_row = index + 1;

        let mut cells = Vec::new();
        let mut next_column = 0usize;

        for cell_node in row_node.children().filter(|n| n.has_tag_name("c")) {
            let column = match cell_node.attribute("r") {
                Some(reference) => split_cell_reference(reference)
                    .map(|(column, _)| column)
                    .map_err(|e| e.to_string())?,
                None => next_column,
            };
            next_column = column + 1;

            cells.push(RawCell {
                column,
                content: parse_cell_content(&cell_node),
            });
        }

        rows.push(RawRow { index, cells });
    }

    Ok(rows)
}

fn parse_cell_content(cell: &Node) -> CellContent {
    let value = cell
        .children()
        .find(|n| n.has_tag_name("v"))
        .and_then(|v| v.text());

    match cell.attribute("t").unwrap_or("n") {
        "s" => match value.and_then(|v| v.trim().parse::<usize>().ok()) {
            Some(idx) => CellContent::Shared(idx),
            None => CellContent::Empty,
        },
        "inlineStr" => match cell.children().find(|n| n.has_tag_name("is")) {
            Some(is) => CellContent::Inline(run_text(is)),
            None => CellContent::Empty,
        },
        "b" => match value.map(str::trim) {
            Some("1") => CellContent::Bool(true),
            Some("0") => CellContent::Bool(false),
            _ => CellContent::Empty,
        },
        "e" => CellContent::Error(value.unwrap_or_default().to_string()),
        _ => match value {
            Some(v) => CellContent::Inline(v.to_string()),
            None => CellContent::Empty,
        },
    }
}

// ============================================================================
// Everything else (calamine)
// ============================================================================

fn read_with_calamine(path: &Path, sheet: Option<&str>) -> Result<RawSheet, ImportError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ImportError::open(path, e))?;

    let names = workbook.sheet_names();
    let sheet_name = names[pick_sheet(&names, sheet, path)?].clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::open(path, format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    let (first_row, first_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let rows = range
        .rows()
        .enumerate()
        .map(|(i, row)| RawRow {
            index: first_row + i,
            cells: row
                .iter()
                .enumerate()
                .filter(|(_, data)| !matches!(data, Data::Empty))
                .map(|(j, data)| RawCell {
                    column: first_col + j,
                    content: data_to_content(data),
                })
                .collect(),
        })
        .collect();

    Ok(RawSheet {
        name: sheet_name,
        shared_strings: None,
        rows,
    })
}

fn data_to_content(data: &Data) -> CellContent {
    match data {
        Data::Empty => CellContent::Empty,
        Data::String(s) => CellContent::Inline(s.clone()),
        Data::Int(i) => CellContent::Inline(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                CellContent::Inline((*f as i64).to_string())
            } else {
                CellContent::Inline(f.to_string())
            }
        }
        Data::Bool(b) => CellContent::Bool(*b),
        // Serial number; the date decoder handles it
        Data::DateTime(dt) => CellContent::Inline(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellContent::Inline(s.clone()),
        Data::Error(e) => CellContent::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::grid::extract_grid;
    use calamine::{CellErrorType, ExcelDateTime, ExcelDateTimeType};
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn test_parse_sheet_rows() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="2">
      <c r="A2" t="s"><v>0</v></c>
      <c r="C2"><v>45</v></c>
      <c r="D2" t="inlineStr"><is><t>inline &amp; text</t></is></c>
    </row>
    <row>
      <c t="b"><v>1</v></c>
      <c t="e"><v>#N/A</v></c>
    </row>
  </sheetData>
</worksheet>"#;

        let rows = parse_sheet_rows(xml).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].cells[0], RawCell { column: 0, content: CellContent::Shared(0) });
        assert_eq!(rows[0].cells[1], RawCell { column: 2, content: CellContent::Inline("45".into()) });
        assert_eq!(
            rows[0].cells[2],
            RawCell { column: 3, content: CellContent::Inline("inline & text".into()) }
        );
        assert_eq!(rows[1].index, 2);
        assert_eq!(rows[1].cells[0], RawCell { column: 0, content: CellContent::Bool(true) });
        assert_eq!(rows[1].cells[1].column, 1);
        assert!(matches!(rows[1].cells[1].content, CellContent::Error(_)));
    }

    #[test]
    fn test_parse_shared_strings_with_rich_text() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
  <si><t>Plain</t></si>
  <si><r><t>Rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si>
</sst>"#;

        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Plain".to_string(), "Rich text".to_string()]);
    }

    #[test]
    fn test_resolve_part_name() {
        assert_eq!(resolve_part_name("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_part_name("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_reads_xlsx_written_by_xlsxwriter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut workbook = Workbook::new();
        let first = workbook.add_worksheet();
        first.set_name("Notes").unwrap();
        first.write_string(0, 0, "ignore me").unwrap();
        let data = workbook.add_worksheet();
        data.set_name("Data").unwrap();
        data.write_string(0, 1, "Application").unwrap();
        data.write_number(1, 2, 45.0).unwrap();
        data.write_string(1, 30, "wide").unwrap();
        workbook.save(&path).unwrap();

        let first_sheet = read_sheet(&path, None).unwrap();
        assert_eq!(first_sheet.name, "Notes");

        let sheet = read_sheet(&path, Some("data")).unwrap();
        assert_eq!(sheet.name, "Data");
        assert!(sheet.shared_strings.is_some());

        let grid = extract_grid(&sheet);
        assert_eq!(grid.row(0).unwrap().get(1), "Application");
        assert_eq!(grid.row(1).unwrap().get(2), "45");
        assert_eq!(grid.row(1).unwrap().get(30), "wide");
    }

    #[test]
    fn test_unknown_sheet_is_open_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut workbook = Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "x").unwrap();
        workbook.save(&path).unwrap();

        let err = read_sheet(&path, Some("Missing")).unwrap_err();
        assert!(matches!(err, ImportError::Open { .. }));
    }

    #[test]
    fn test_calamine_values_become_cell_text() {
        assert_eq!(data_to_content(&Data::Float(45306.0)), CellContent::Inline("45306".into()));
        assert_eq!(data_to_content(&Data::Float(45306.75)), CellContent::Inline("45306.75".into()));
        assert_eq!(data_to_content(&Data::Int(7)), CellContent::Inline("7".into()));
        assert_eq!(data_to_content(&Data::String("CRM".into())), CellContent::Inline("CRM".into()));
        assert_eq!(data_to_content(&Data::Bool(false)), CellContent::Bool(false));
        assert_eq!(
            data_to_content(&Data::DateTime(ExcelDateTime::new(45306.5, ExcelDateTimeType::DateTime, false))),
            CellContent::Inline("45306.5".into())
        );
        assert_eq!(
            data_to_content(&Data::DateTimeIso("2024-01-15T00:00:00".into())),
            CellContent::Inline("2024-01-15T00:00:00".into())
        );
        assert_eq!(data_to_content(&Data::Error(CellErrorType::NA)), CellContent::Error("#N/A".into()));
        assert_eq!(data_to_content(&Data::Empty), CellContent::Empty);
    }

    #[test]
    fn test_unrecognised_extension_goes_through_calamine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.dat");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data").unwrap();
        sheet.write_string(1, 1, "Application").unwrap();
        sheet.write_number(2, 1, 45306.0).unwrap();
        sheet.write_boolean(2, 3, true).unwrap();
        workbook.save(&path).unwrap();

        let raw = read_sheet(&path, Some("Data")).unwrap();
        assert_eq!(raw.name, "Data");
        assert!(raw.shared_strings.is_none());

        let grid = extract_grid(&raw);
        assert_eq!(grid.row(1).unwrap().get(1), "Application");
        assert_eq!(grid.row(2).unwrap().get(1), "45306");
        assert_eq!(grid.row(2).unwrap().get(3), "TRUE");
        assert!(grid.row(0).unwrap().is_blank());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = read_sheet(Path::new("/definitely/not/here.xlsx"), None).unwrap_err();
        assert!(matches!(err, ImportError::Open { .. }));
    }
}
