//! Single-line TOML writing for keys and values.
//!
//! Every region entry is rendered on exactly one line, so nested values are
//! always written inline and strings always use the basic (escaped) form.
//! Encoding of keys and scalars is left to `toml_write`; this module only
//! decides the layout.

use domainsmith_core::{ConfigTable, ConfigValue};
use toml_write::{ToTomlKey, ToTomlValue, TomlKeyBuilder, TomlStringBuilder};

/// Write a key bare when TOML allows it, quoted otherwise.
pub fn key(name: &str) -> String {
    TomlKeyBuilder::new(name).as_default().to_toml_key()
}

/// Basic string; line breaks are escaped rather than written multi-line.
pub fn string(value: &str) -> String {
    TomlStringBuilder::new(value).as_basic().to_toml_value()
}

pub fn value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(text) => string(text),
        ConfigValue::Integer(number) => number.to_toml_value(),
        ConfigValue::Float(number) => number.to_toml_value(),
        ConfigValue::Boolean(flag) => flag.to_toml_value(),
        ConfigValue::Datetime(datetime) => datetime.to_string(),
        ConfigValue::Array(items) => array(items),
        ConfigValue::Table(table) => inline_table(table, &[]),
    }
}

pub fn array(items: &[ConfigValue]) -> String {
    let rendered: Vec<String> = items.iter().map(value).collect();
    format!("[{}]", rendered.join(", "))
}

pub fn string_array<S: AsRef<str>>(items: &[S]) -> String {
    let rendered: Vec<String> = items.iter().map(|item| string(item.as_ref())).collect();
    format!("[{}]", rendered.join(", "))
}

/// Inline table with `leading` keys first (in that order), then the rest sorted.
pub fn inline_table(table: &ConfigTable, leading: &[&str]) -> String {
    let mut pairs: Vec<String> = Vec::with_capacity(table.len());
    for name in leading {
        if let Some(entry) = table.get(*name) {
            pairs.push(format!("{} = {}", key(name), value(entry)));
        }
    }
    // ConfigTable iterates in key order.
    for (name, entry) in table {
        if !leading.contains(&name.as_str()) {
            pairs.push(format!("{} = {}", key(name), value(entry)));
        }
    }
    if pairs.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", pairs.join(", "))
    }
}
