//! Mapping from semantic type tags back to PostgreSQL DDL types.

/// Default width for bounded string columns created from a bare varchar tag.
///
/// The catalog's `character varying` tag does not carry the original width,
/// so generated DDL falls back to a fixed default.
pub const DEFAULT_VARCHAR_WIDTH: u32 = 255;

/// Map a semantic type tag to a PostgreSQL DDL type.
///
/// Anything outside the known set is passed through uppercased as a
/// last-resort native type name.
pub fn postgres_ddl_type(type_tag: &str) -> String {
    match type_tag {
        "character varying" | "varchar" => format!("VARCHAR({})", DEFAULT_VARCHAR_WIDTH),
        "integer" | "int" | "int4" => "INTEGER".to_string(),
        "boolean" | "bool" => "BOOLEAN".to_string(),
        other => other.to_uppercase(),
    }
}
