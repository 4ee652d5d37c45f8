#![allow(dead_code)]

use rolesync_core::{compile, CompileError, RuleTemplate, SyncItem};

pub fn items(yaml: &str) -> Vec<SyncItem> {
    serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("Failed to decode: {yaml}\nError: {e}"))
}

pub fn compiled(yaml: &str) -> Vec<SyncItem> {
    compile(items(yaml)).unwrap_or_else(|e| panic!("Failed to compile: {yaml}\nError: {e}"))
}

pub fn compile_err(yaml: &str) -> CompileError {
    compile(items(yaml)).expect_err(&format!("Expected compile error for: {yaml}"))
}

pub fn rule_names(item: &SyncItem) -> Vec<&str> {
    item.roles
        .iter()
        .map(|rule: &RuleTemplate| rule.name.pattern())
        .collect()
}
