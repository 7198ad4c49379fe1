use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use changer_config::{load_denominations_csv, load_toml};
use rstest::rstest;
use tempfile::{TempDir, tempdir};

fn write_csv(lines: &[&str]) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("denominations.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn loads_valid_table() {
    let (_dir, path) = write_csv(&["coin_type,value", "1,5", "2, 10", "3,25"]);
    let rows = load_denominations_csv(&path).unwrap();
    assert_eq!(rows, vec![(1, 5), (2, 10), (3, 25)]);
}

#[rstest]
fn wrong_headers_error() {
    let (_dir, path) = write_csv(&["type,cents", "1,5"]);
    let err = load_denominations_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'coin_type,value'"));
}

#[rstest]
fn non_numeric_row_errors() {
    let (_dir, path) = write_csv(&["coin_type,value", "1,five"]);
    let err = load_denominations_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
#[case(&["coin_type,value"], "no rows")]
#[case(&["coin_type,value", "1,5", "1,10"], "duplicate coin_type")]
#[case(&["coin_type,value", "20,5"], "outside")]
fn rejects_bad_tables(#[case] lines: &[&str], #[case] needle: &str) {
    let (_dir, path) = write_csv(lines);
    let err = load_denominations_csv(&path).unwrap_err();
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn missing_file_errors() {
    let err = load_denominations_csv(&PathBuf::from("/definitely/not/here.csv")).unwrap_err();
    assert!(format!("{err}").contains("open denomination CSV"));
}

#[rstest]
fn config_prefers_csv_over_inline_table() {
    let (dir, _path) = write_csv(&["coin_type,value", "4,50"]);
    let cfg = load_toml("[setup]\nfallback_csv = \"denominations.csv\"").unwrap();
    let table = cfg.fallback_denominations(dir.path()).unwrap();
    assert_eq!(table, vec![(4, 50)]);

    let inline = load_toml("").unwrap();
    assert_eq!(inline.fallback_denominations(dir.path()).unwrap().len(), 5);
}
