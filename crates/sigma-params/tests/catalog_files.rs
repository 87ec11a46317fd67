//! File-loading tests across both catalog formats.

use std::io::Write;

use sigma_params::{ParameterCatalog, ParamsError};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn loads_json_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "project.json",
        r#"[
            {"name": "master_volume", "address": 32,
             "encoding": {"format": "q", "integer_bits": 5, "fractional_bits": 23}},
            {"name": "input_select", "address": 40, "encoding": {"format": "int"}}
        ]"#,
    );

    let catalog = ParameterCatalog::from_file(&path).unwrap();
    assert_eq!(catalog.len(), 2);
    let volume = catalog.resolve("master_volume").unwrap();
    assert_eq!(volume.address, 0x20);
    assert_eq!(volume.word_count, 1);
}

#[test]
fn loads_sigmastudio_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "project.params",
        "Cell Name         = Main\n\
         Parameter Name    = MainVolAlg1target\n\
         Parameter Address = 0x0020\n\
         Parameter Value   = 1.0\n\
         Parameter Data :\n\
         0x00 ,\n\
         0x80 ,\n\
         0x00 ,\n\
         0x00 ,\n",
    );

    let catalog = ParameterCatalog::from_file(&path).unwrap();
    let row = catalog.resolve("MainVolAlg1target").unwrap();
    assert_eq!(row.address, 0x20);
    assert_eq!(row.byte_length(), 4);
    assert_eq!(catalog.resolve_address(0x20).unwrap().name, row.name);
}

#[test]
fn missing_file_is_a_clean_error() {
    let err = ParameterCatalog::from_file("/nonexistent/project.params").unwrap_err();
    assert!(matches!(err, ParamsError::FileNotFound { .. }));
}

#[test]
fn invalid_table_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "overlap.json",
        r#"[
            {"name": "a", "address": 16, "word_count": 4},
            {"name": "b", "address": 18}
        ]"#,
    );
    assert!(matches!(
        ParameterCatalog::from_file(&path).unwrap_err(),
        ParamsError::SpanOverlap { .. }
    ));
}
