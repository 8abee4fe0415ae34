//! Table naming.
//!
//! Table names are a pure function of the key path:
//!
//! ```text
//! bw_document__page                    document
//! bw_document__page__versions          versions
//! bw_document__page__fields            document-fields
//! bw_document__page__fields__faq       repeater on collection fields
//! bw_document__page__hero              brick
//! bw_document__page__hero__links       repeater in brick
//! bw_document__page__hero__links__tags nested repeater
//! ```
//!
//! Because `versions` and `fields` can never be brick keys and keys never
//! contain the delimiter, every name parses back to exactly one key path.

use brickwork_schema::{TableKey, TableType};

use crate::error::{CompileError, KeyKind};

/// Joins the parts of a table name.
pub const KEY_DELIMITER: &str = "__";

/// Table part of a collection's versions table.
pub const VERSIONS_PART: &str = "versions";

/// Table part of a collection's document-fields table.
pub const FIELDS_PART: &str = "fields";

/// Longest identifier Postgres keeps, in bytes. Longer ones are truncated.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// `<prefix>_document__`: every table owned by the engine starts with this.
pub fn document_table_prefix(prefix: &str) -> String {
    format!("{}_document{}", prefix, KEY_DELIMITER)
}

pub fn document_table(prefix: &str, collection: &str) -> String {
    format!("{}{}", document_table_prefix(prefix), collection)
}

pub fn versions_table(prefix: &str, collection: &str) -> String {
    join(&[&document_table(prefix, collection), VERSIONS_PART])
}

pub fn fields_table(prefix: &str, collection: &str) -> String {
    join(&[&document_table(prefix, collection), FIELDS_PART])
}

pub fn brick_table(prefix: &str, collection: &str, brick: &str) -> String {
    join(&[&document_table(prefix, collection), brick])
}

/// Table for the repeater at `path`, under a brick or (with `None`) under the
/// collection's fields.
pub fn repeater_table(
    prefix: &str,
    collection: &str,
    brick: Option<&str>,
    path: &[&str],
) -> String {
    let owner = match brick {
        Some(brick) => brick_table(prefix, collection, brick),
        None => fields_table(prefix, collection),
    };
    let mut parts = vec![owner.as_str()];
    parts.extend_from_slice(path);
    join(&parts)
}

/// Name of the table identified by `key` and `table_type`.
pub fn table_name(prefix: &str, table_type: TableType, key: &TableKey) -> String {
    match table_type {
        TableType::Document => document_table(prefix, &key.collection),
        TableType::Versions => versions_table(prefix, &key.collection),
        TableType::DocumentFields => fields_table(prefix, &key.collection),
        TableType::Brick => brick_table(
            prefix,
            &key.collection,
            key.brick.as_deref().unwrap_or_default(),
        ),
        TableType::Repeater => {
            let path: Vec<&str> = key.repeater.iter().map(String::as_str).collect();
            repeater_table(prefix, &key.collection, key.brick.as_deref(), &path)
        }
    }
}

/// Recover the table type and key path from a table name.
///
/// Returns `None` for tables the engine does not own.
pub fn parse_table_name(prefix: &str, name: &str) -> Option<(TableType, TableKey)> {
    let rest = name.strip_prefix(&document_table_prefix(prefix))?;
    let mut parts = rest.split(KEY_DELIMITER);
    let collection = parts.next().filter(|c| !c.is_empty())?.to_string();
    let parts: Vec<&str> = parts.collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let key = |brick: Option<&str>, repeater: &[&str]| TableKey {
        collection: collection.clone(),
        brick: brick.map(str::to_string),
        repeater: repeater.iter().map(|r| r.to_string()).collect(),
    };

    let parsed = match parts.as_slice() {
        [] => (TableType::Document, key(None, &[])),
        [VERSIONS_PART] => (TableType::Versions, key(None, &[])),
        [FIELDS_PART] => (TableType::DocumentFields, key(None, &[])),
        [VERSIONS_PART, ..] => return None,
        [FIELDS_PART, repeaters @ ..] => (TableType::Repeater, key(None, repeaters)),
        [brick] => (TableType::Brick, key(Some(*brick), &[])),
        [brick, repeaters @ ..] => (TableType::Repeater, key(Some(*brick), repeaters)),
    };
    Some(parsed)
}

fn join(parts: &[&str]) -> String {
    parts.join(KEY_DELIMITER)
}

/// Check a key is a lowercase snake_case identifier.
pub fn check_identifier(kind: KeyKind, key: &str) -> Result<(), CompileError> {
    let invalid = |reason| CompileError::InvalidKey {
        kind,
        key: key.to_string(),
        reason,
    };

    let Some(first) = key.chars().next() else {
        return Err(invalid("key is empty"));
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase letter"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid("only lowercase letters, digits and '_' are allowed"));
    }
    Ok(())
}

/// Check a derived table or column name fits in [`MAX_IDENTIFIER_LEN`].
pub fn check_identifier_length(name: &str) -> Result<(), CompileError> {
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(CompileError::IdentifierTooLong {
            identifier: name.to_string(),
            len: name.len(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(())
}

/// Check a key that becomes part of a table name (collection, brick, repeater).
pub fn check_table_key(kind: KeyKind, key: &str) -> Result<(), CompileError> {
    check_identifier(kind, key)?;

    let reserved = |reserved| CompileError::ReservedKey {
        kind,
        key: key.to_string(),
        reserved,
    };

    if key.contains(KEY_DELIMITER) {
        return Err(reserved(KEY_DELIMITER));
    }
    for part in ["_fields", "_versions"] {
        if key.contains(part) {
            return Err(reserved(part));
        }
    }
    if key == FIELDS_PART {
        return Err(reserved(FIELDS_PART));
    }
    if key == VERSIONS_PART {
        return Err(reserved(VERSIONS_PART));
    }
    if key.ends_with('_') {
        return Err(CompileError::InvalidKey {
            kind,
            key: key.to_string(),
            reason: "must not end with '_'",
        });
    }
    Ok(())
}
