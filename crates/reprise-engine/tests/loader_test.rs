use reprise_engine::common::EventKind;
use reprise_engine::loader::{LoadError, RecordLoader};
use std::io::Write;
use tempfile::NamedTempFile;

const CAPTURE: &str = "\
ProcessName,UserName,ExeName,Application,Event,FieldName,FieldType,Sentence,URL,StartTime,EndTime,WindowName,Extra
chrome,alice,chrome.exe,Google Chrome,LeftMouseClick,Sign in,button,,https://example.com/login,2024-03-01 09:00:00,2024-03-01 09:00:01,Login - Chrome,x
EXCEL,alice,EXCEL.EXE,Microsoft Excel,KeyPress,B12,edit,42,,2024-03-01 09:00:05.500,2024-03-01 09:00:03,Book1 - Excel,y
notepad,alice,notepad.exe,,type,Text Editor,edit,hello,,,,Untitled - Notepad,z
";

#[tokio::test]
async fn test_loads_capture_in_file_order() {
    let mut file = NamedTempFile::with_suffix(".csv").unwrap();
    file.write_all(CAPTURE.as_bytes()).unwrap();

    let records = RecordLoader::from_path(file.path()).await.unwrap();
    assert_eq!(records.len(), 3);

    let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let web = &records[0];
    assert_eq!(web.event, EventKind::Click);
    assert_eq!(web.url(), Some("https://example.com/login"));
    assert_eq!(web.window_name, "Login - Chrome");
    assert!(web.sentence().is_none());

    let excel = &records[1];
    assert_eq!(excel.event, EventKind::KeyPress);
    assert_eq!(excel.sentence(), Some("42"));
    assert!(excel.url().is_none());
    // inverted end is clamped
    assert_eq!(excel.end_time, excel.start_time);

    let notepad = &records[2];
    assert!(notepad.start_time.is_none());
    assert!(notepad.end_time.is_none());
    assert_eq!(notepad.target_name(), "notepad");
}

#[test]
fn test_missing_columns_default_to_empty() {
    let data = "Event,ProcessName\nclick,calc\n";
    let records = RecordLoader::from_reader(data.as_bytes()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].process_name, "calc");
    assert!(records[0].field_name.is_empty());
    assert!(records[0].url().is_none());
}

#[test]
fn test_utc_columns_are_a_fallback() {
    let data = "Event,UTCStartTime,UTCEndTime\nclick,2024-03-01T09:00:00Z,2024-03-01T09:00:02Z\n";
    let records = RecordLoader::from_reader(data.as_bytes()).unwrap();
    assert!(records[0].start_time.is_some());
    assert!(records[0].end_time > records[0].start_time);
}

#[tokio::test]
async fn test_missing_file() {
    let result = RecordLoader::from_path(std::path::Path::new("/nonexistent/capture.csv")).await;
    assert!(matches!(result, Err(LoadError::Io(_))));
}

#[test]
fn test_header_only_is_empty() {
    let records = RecordLoader::from_reader("ProcessName,Event\n".as_bytes()).unwrap();
    assert!(records.is_empty());
}
