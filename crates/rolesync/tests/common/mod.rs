#![allow(dead_code)]

use std::io::Write;

use rolesync::config::Config;
use rolesync::Error;
use tempfile::NamedTempFile;

pub fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

pub fn load(contents: &str) -> Config {
    let file = write_config(contents);
    Config::load(file.path()).unwrap_or_else(|e| panic!("Failed to load: {contents}\nError: {e}"))
}

pub fn load_err(contents: &str) -> Error {
    let file = write_config(contents);
    Config::load(file.path()).expect_err(&format!("Expected load error for: {contents}"))
}
