// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Multi-document YAML/JSON manifest loading

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parse a (possibly multi-document) YAML or JSON manifest into its documents.
/// Empty documents in the stream are skipped.
pub fn parse_documents(input: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        docs.push(value);
    }
    Ok(docs)
}

/// Load and parse a manifest file
pub fn load_file(path: &Path) -> Result<Vec<Value>> {
    let contents = fs::read_to_string(path)?;
    parse_documents(&contents)
}
