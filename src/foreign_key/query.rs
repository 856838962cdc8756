use crate::models::{ColumnMetadata, ForeignKeyRef, QueryData, RelatedRow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PLAIN_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("valid identifier regex"));

static CONNECTION_GONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)connection not found").expect("valid connection regex"));

// Finds the foreign key declared for `field_key`. Matching is case-insensitive and
// prefers the result-set alias over the underlying column name.
pub fn find_foreign_key<'a>(field_key: &str, metadata: &'a [ColumnMetadata]) -> Option<&'a ForeignKeyRef> {
    let by_alias = metadata.iter().find(|column| {
        column
            .result_name
            .as_deref()
            .map(|alias| alias.eq_ignore_ascii_case(field_key))
            .unwrap_or(false)
    });
    let column = by_alias.or_else(|| {
        metadata
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(field_key))
    })?;
    column.foreign_key.as_ref()
}

pub fn build_lookup_query(reference: &ForeignKeyRef, value: &Value, limit: u32) -> String {
    let table = match reference.schema.as_deref().filter(|schema| !schema.is_empty()) {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&reference.table)),
        None => quote_identifier(&reference.table),
    };
    format!(
        "SELECT * FROM {} WHERE {} = {} LIMIT {}",
        table,
        quote_identifier(&reference.column),
        sql_literal(value),
        limit
    )
}

pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(text) => quote_string(text),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => "NULL".to_string(),
        Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
    }
}

fn quote_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quote_identifier(identifier: &str) -> String {
    if PLAIN_IDENTIFIER_RE.is_match(identifier) {
        identifier.to_string()
    } else {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

pub fn rows_to_records(data: &QueryData) -> Vec<RelatedRow> {
    data.rows
        .iter()
        .map(|row| {
            data.columns
                .iter()
                .zip(row.iter())
                .map(|(column, cell)| (column.clone(), cell.clone()))
                .collect::<RelatedRow>()
        })
        .collect()
}

pub fn indicates_connection_gone(message: &str) -> bool {
    CONNECTION_GONE_RE.is_match(message)
}
