use std::path::PathBuf;

use woven_core::{compile_file, Options, OutputStyle};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("woven_core_imports_suite").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn import_prefers_the_partial_file() {
    let dir = fixture_dir("prefers_partial");
    std::fs::write(dir.join("_colors.scss"), "$brand: teal;").unwrap();
    std::fs::write(dir.join("main.scss"), "@import \"colors\";\na { color: $brand; }").unwrap();

    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let out = compile_file(dir.join("main.scss"), &options).unwrap_or_else(|e| panic!("compile failed: {e}"));
    assert_eq!(out.css, "a {\n  color: teal;\n}\n");
}

#[test]
fn importing_the_same_file_twice_loads_it_once() {
    let dir = fixture_dir("dedup");
    std::fs::write(dir.join("_shared.scss"), "$w: 1px;").unwrap();
    std::fs::write(dir.join("main.scss"), "@import \"shared\";\n@import \"shared\";\na { width: $w; }").unwrap();

    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let out = compile_file(dir.join("main.scss"), &options).unwrap_or_else(|e| panic!("compile failed: {e}"));
    let loads = out.loaded_files.iter().filter(|p| p.ends_with("_shared.scss")).count();
    assert_eq!(loads, 1);
}

#[test]
fn css_extension_imports_are_left_as_literal_at_rules() {
    let dir = fixture_dir("passthrough");
    std::fs::write(dir.join("main.scss"), "@import \"vendor.css\";\na { b: 1; }").unwrap();

    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let out = compile_file(dir.join("main.scss"), &options).unwrap_or_else(|e| panic!("compile failed: {e}"));
    assert!(out.css.contains("@import \"vendor.css\""), "unexpected output: {out}", out = out.css);
}

#[test]
fn missing_import_reports_an_import_error() {
    let dir = fixture_dir("missing");
    std::fs::write(dir.join("main.scss"), "@import \"nope\";").unwrap();

    let options = Options { style: OutputStyle::Expanded, ..Options::default() };
    let err = compile_file(dir.join("main.scss"), &options).unwrap_err();
    assert_eq!(err.kind, woven_core::ErrorKind::Import);
}

#[test]
fn load_path_is_searched_for_imports() {
    let dir = fixture_dir("load_path");
    let vendor = dir.join("vendor");
    std::fs::create_dir_all(&vendor).unwrap();
    std::fs::write(vendor.join("_grid.scss"), ".row { width: 100%; }").unwrap();
    std::fs::write(dir.join("main.scss"), "@import \"grid\";").unwrap();

    let options = Options { style: OutputStyle::Expanded, load_paths: vec![vendor], ..Options::default() };
    let out = compile_file(dir.join("main.scss"), &options).unwrap_or_else(|e| panic!("compile failed: {e}"));
    assert_eq!(out.css, ".row {\n  width: 100%;\n}\n");
}
