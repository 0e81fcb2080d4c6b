use serde_json::Value;

use super::column::ColumnDescriptor;

/// Default CSV field delimiter
pub const DEFAULT_DELIMITER: char = ',';

/// Serialize `rows` as CSV with a header line of column headers.
///
/// Fields containing the delimiter, a quote or a line break are quoted and
/// inner quotes doubled. Lines are separated by `\n`.
pub fn to_csv(columns: &[&ColumnDescriptor], rows: &[&Value], delimiter: char) -> String {
    let mut out = String::new();
    write_line(&mut out, columns.iter().map(|c| c.header.clone()), delimiter);
    for row in rows {
        write_line(&mut out, columns.iter().map(|c| c.text(row)), delimiter);
    }
    out
}

fn write_line(out: &mut String, fields: impl Iterator<Item = String>, delimiter: char) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        out.push_str(&escape(&field, delimiter));
    }
    out.push('\n');
}

fn escape(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
