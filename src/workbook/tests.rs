use super::*;
use serde_json::json;
use std::io::{Cursor, Read};

fn row(value: serde_json::Value) -> ResultRow {
    serde_json::from_value(value).unwrap()
}

fn task(id: &str, name: Option<&str>) -> RemoteTask {
    RemoteTask::new(id, name)
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut text = String::new();
    part.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn titles_drop_forbidden_characters() {
    assert_eq!(
        sanitize_sheet_title(Some("EU/US [Remote]?"), 1),
        "EUUS Remote"
    );
    assert_eq!(sanitize_sheet_title(Some("  a:b*c\\d  "), 1), "abcd");
}

#[test]
fn titles_fall_back_to_position() {
    assert_eq!(sanitize_sheet_title(Some("???"), 3), "Task_3");
    assert_eq!(sanitize_sheet_title(Some("   "), 1), "Task_1");
    assert_eq!(sanitize_sheet_title(None, 2), "Task_2");
}

#[test]
fn titles_are_truncated_on_char_boundaries() {
    let long = "Données d'emploi très très longues pour l'Europe";
    let title = sanitize_sheet_title(Some(long), 1);
    assert_eq!(title.chars().count(), MAX_SHEET_TITLE_CHARS);
    assert!(long.starts_with(&title));
}

#[test]
fn header_is_union_in_first_seen_order() {
    let rows = vec![row(json!({"a": 1, "b": 2})), row(json!({"b": 3, "c": 4}))];
    let workbook = {
        let mut builder = AggregationBuilder::new();
        builder.add_task(&task("t1", Some("Jobs")), &rows);
        builder.build()
    };

    let sheet = &workbook.sheets()[0];
    assert_eq!(sheet.header, vec!["a", "b", "c"]);
    assert_eq!(sheet.rows[0], vec!["1", "2", ""]);
    assert_eq!(sheet.rows[1], vec!["", "3", "4"]);
}

#[test]
fn empty_task_gets_default_columns() {
    let mut builder = AggregationBuilder::new();
    builder.add_task(&task("t1", Some("Nothing yet")), &[]);
    let workbook = builder.build();

    let sheet = &workbook.sheets()[0];
    assert_eq!(sheet.header, DEFAULT_COLUMNS.to_vec());
    assert!(sheet.rows.is_empty());
}

#[test]
fn duplicate_titles_get_numbered_suffixes() {
    let mut builder = AggregationBuilder::new();
    builder
        .add_task(&task("t1", Some("LinkedIn")), &[])
        .add_task(&task("t2", Some("linkedin")), &[])
        .add_task(&task("t3", Some("LinkedIn?")), &[]);
    let titles: Vec<String> = builder
        .build()
        .sheets()
        .iter()
        .map(|s| s.title.clone())
        .collect();

    assert_eq!(titles, vec!["LinkedIn", "linkedin (2)", "LinkedIn (3)"]);
}

#[test]
fn suffixed_titles_stay_within_limit() {
    let name = "A".repeat(40);
    let mut builder = AggregationBuilder::new();
    builder
        .add_task(&task("t1", Some(&name)), &[])
        .add_task(&task("t2", Some(&name)), &[]);
    let workbook = builder.build();

    let second = &workbook.sheets()[1].title;
    assert_eq!(second.chars().count(), MAX_SHEET_TITLE_CHARS);
    assert!(second.ends_with(" (2)"));
}

#[test]
fn from_results_keeps_task_order() {
    let results = vec![
        TaskResultSet {
            rows: vec![row(json!({"title": "x"}))],
            fetches: 1,
            ..TaskResultSet::empty(task("t1", Some("First")))
        },
        TaskResultSet::empty(task("t2", None)),
    ];
    let workbook = AggregationBuilder::from_results(&results);

    assert_eq!(workbook.sheets().len(), 2);
    assert_eq!(workbook.sheets()[0].title, "First");
    assert_eq!(workbook.sheets()[1].title, "Task_2");
    assert_eq!(workbook.row_count(), 1);
}

#[test]
fn xlsx_package_contains_one_worksheet_per_sheet() {
    let mut builder = AggregationBuilder::new();
    builder
        .add_task(
            &task("t1", Some("R&D <EU>")),
            &[row(json!({"title": "Engineer & Lead", "salary": 100}))],
        )
        .add_task(&task("t2", Some("Empty")), &[]);
    let bytes = builder.build().to_xlsx_bytes().unwrap();

    let workbook_xml = read_part(&bytes, "xl/workbook.xml");
    assert!(workbook_xml.contains(r#"name="R&amp;D &lt;EU&gt;""#));
    assert!(workbook_xml.contains(r#"name="Empty""#));

    let types = read_part(&bytes, "[Content_Types].xml");
    assert!(types.contains("/xl/worksheets/sheet2.xml"));

    let sheet1 = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet1.contains(r#"<dimension ref="A1:B2"/>"#));
    assert!(sheet1.contains(r#"<c r="A1" s="1" t="inlineStr"><is><t xml:space="preserve">title</t>"#));
    assert!(sheet1.contains("Engineer &amp; Lead"));
    assert!(sheet1.contains(r#"<c r="B2""#));

    let sheet2 = read_part(&bytes, "xl/worksheets/sheet2.xml");
    assert!(sheet2.contains(">companyName<"));
    assert!(!sheet2.contains(r#"<row r="2">"#));

    assert!(sheet2.contains(r#"<dimension ref="A1:E1"/>"#));

    assert!(types.contains("/xl/styles.xml"));
    let rels = read_part(&bytes, "xl/_rels/workbook.xml.rels");
    assert!(rels.contains(r#"Target="styles.xml""#));
    assert!(read_part(&bytes, "xl/styles.xml").contains("<cellXfs"));
    read_part(&bytes, "_rels/.rels");
}

#[test]
fn empty_workbook_cannot_be_serialized() {
    let err = Workbook::default().to_xlsx_bytes().unwrap_err();
    assert!(matches!(err, crate::error::Error::Workbook(_)));
}
