// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TOML configuration layer
//!
//! Each sketch reads three tables under its root (`para`, `test`, `data`),
//! plus a `ch` table when it is hierarchy-backed:
//!
//! ```toml
//! [CM.para]
//! depth = 4
//! width = 65536
//!
//! [CM.test]
//! update = ["RATE"]
//! query = ["ARE", "AAE", "PODF"]
//! query_podf = 0.1
//!
//! [CM.data]
//! data = "records.bin"
//! format = [["flowkey", "length", "padding"], [13, 2, 1]]
//! cnt_method = "InLength"
//! ```
//!
//! [`Section`] navigates a dotted path into the document and hands out
//! serde-typed values, so every getter reports the full path of what is
//! missing or mistyped.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use flowsketch_core::data::{CntMethod, DataFormat};
use flowsketch_core::error::{MeterError, Result};
use flowsketch_core::ground_truth::HxMethod;

/// A parsed configuration document.
pub struct Config {
    doc: toml::Value,
}

impl Config {
    /// Load and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading config from {}", path.display());
        let text = fs::read_to_string(path)?;
        let doc = text.parse::<toml::Value>().map_err(|e| {
            MeterError::BadConfig(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Self { doc })
    }

    /// Parse configuration from an in-memory string.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let doc = text
            .parse::<toml::Value>()
            .map_err(|e| MeterError::BadConfig(format!("failed to parse config: {e}")))?;
        Ok(Self { doc })
    }

    /// Navigate to the table at a dotted `path` (`"CM.test"`); an empty
    /// path is the document root.
    pub fn section(&self, path: &str) -> Result<Section<'_>> {
        let mut node = &self.doc;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            node = node.get(part).ok_or_else(|| {
                MeterError::BadConfig(format!("missing table `{path}` in config"))
            })?;
        }
        Ok(Section {
            node,
            path: path.to_string(),
        })
    }

    /// Whether the table at `path` exists.
    pub fn has_section(&self, path: &str) -> bool {
        self.section(path).is_ok()
    }
}

/// A working node inside the configuration.
pub struct Section<'a> {
    node: &'a toml::Value,
    path: String,
}

impl Section<'_> {
    /// The value of `key`, deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.get_opt(key)? {
            Some(value) => Ok(value),
            None => Err(MeterError::BadConfig(format!(
                "missing key `{}.{key}` in config",
                self.path
            ))),
        }
    }

    /// The value of `key` if present, deserialized into `T`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.node.get(key) {
            None => Ok(None),
            Some(value) => value.clone().try_into().map(Some).map_err(|e| {
                MeterError::BadConfig(format!("bad value for `{}.{key}`: {e}", self.path))
            }),
        }
    }
}

/// Read the 2-row `format` array of a data section into a record layout.
pub fn parse_data_format(data: &Section<'_>) -> Result<DataFormat> {
    let (names, widths): (Vec<String>, Vec<usize>) = data.get("format")?;
    if names.len() != widths.len() {
        return Err(MeterError::BadConfig(format!(
            "format rows disagree: {} field names, {} widths",
            names.len(),
            widths.len()
        )));
    }
    DataFormat::from_fields(names.iter().map(String::as_str).zip(widths.iter().copied()))
}

/// Read `cnt_method` from a data section; absent means byte counting.
pub fn parse_cnt_method(data: &Section<'_>) -> Result<CntMethod> {
    match data.get_opt::<String>("cnt_method")?.as_deref() {
        None | Some("InLength") => Ok(CntMethod::InLength),
        Some("InPacket") => Ok(CntMethod::InPacket),
        Some(other) => Err(MeterError::BadConfig(format!(
            "cnt_method should be \"InLength\" or \"InPacket\", got {other:?}"
        ))),
    }
}

/// Read `hx_method` from a data section; absent means top-K.
pub fn parse_hx_method(data: &Section<'_>) -> Result<HxMethod> {
    match data.get_opt::<String>("hx_method")?.as_deref() {
        None | Some("TopK") => Ok(HxMethod::TopK),
        Some("Percentile") => Ok(HxMethod::Percentile),
        Some(other) => Err(MeterError::BadConfig(format!(
            "hx_method should be \"TopK\" or \"Percentile\", got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        key = 2

        [A.B.C]
        key = 1

        [CM.para]
        depth = 4
        width = 65536

        [CM.data]
        data = "records.bin"
        format = [["flowkey", "length", "padding", "timestamp", "padding"], [8, 4, 1, 2, 1]]
        cnt_method = "InPacket"

        [CM.ch]
        cnt_no_ratio = 0.3
        width_cnt = [8, 8, 8]
        no_hash = [2, 2]
    "#;

    #[test]
    fn test_dotted_paths() {
        let config = Config::from_toml_str(DOC).unwrap();
        assert_eq!(config.section("A.B.C").unwrap().get::<i64>("key").unwrap(), 1);
        assert_eq!(config.section("").unwrap().get::<i64>("key").unwrap(), 2);
        assert!(config.section("A.B.D").is_err());
        assert!(config.has_section("CM.ch"));
        assert!(!config.has_section("CM.missing"));
    }

    #[test]
    fn test_typed_getters() {
        let config = Config::from_toml_str(DOC).unwrap();
        let para = config.section("CM.para").unwrap();
        assert_eq!(para.get::<usize>("depth").unwrap(), 4);
        assert_eq!(para.get::<usize>("width").unwrap(), 65536);
        assert!(para.get::<String>("depth").is_err());
        assert!(para.get::<usize>("absent").is_err());
        assert_eq!(para.get_opt::<usize>("absent").unwrap(), None);

        let ch = config.section("CM.ch").unwrap();
        assert_eq!(ch.get::<f64>("cnt_no_ratio").unwrap(), 0.3);
        assert_eq!(ch.get::<Vec<usize>>("width_cnt").unwrap(), vec![8, 8, 8]);
        assert_eq!(ch.get::<Vec<usize>>("no_hash").unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_data_format_adapter() {
        let config = Config::from_toml_str(DOC).unwrap();
        let data = config.section("CM.data").unwrap();
        let format = parse_data_format(&data).unwrap();
        assert_eq!(format.record_len(), 16);
        assert_eq!(format.key_len(), 8);
        assert_eq!(parse_cnt_method(&data).unwrap(), CntMethod::InPacket);
        assert_eq!(parse_hx_method(&data).unwrap(), HxMethod::TopK);
    }

    #[test]
    fn test_bad_documents() {
        assert!(Config::from_toml_str("key = [").is_err());

        let config = Config::from_toml_str(
            r#"
            [X.data]
            format = [["flowkey"], [5]]
            cnt_method = "InBytes"
            "#,
        )
        .unwrap();
        let data = config.section("X.data").unwrap();
        assert!(parse_data_format(&data).is_err());
        assert!(parse_cnt_method(&data).is_err());
    }
}
