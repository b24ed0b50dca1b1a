//! Cell cleaning for raw uploads

use super::{CleanedTable, RawTable, SourceRow, Value};

/// Tokens that spreadsheet authors use to mean "no value"
const EMPTY_TOKENS: &[&str] = &["", "-", "N/A", "n/a"];

/// Check whether a cell carries no data
pub fn is_empty_cell(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => EMPTY_TOKENS.contains(&s.trim()),
        _ => false,
    }
}

/// Check whether every cell in a row is empty
pub fn is_empty_row(cells: &[Value]) -> bool {
    cells.iter().all(is_empty_cell)
}

/// Clean a single cell: trim strings, collapse empty tokens and NaN to null
pub fn clean_cell(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if EMPTY_TOKENS.contains(&trimmed) {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Value::Float(f) if f.is_nan() => Value::Null,
        other => other.clone(),
    }
}

/// Clean every data row and drop rows that are entirely empty.
///
/// Surviving rows keep their position below the header as `row_number`,
/// so errors reported later point at the line the user sees.
pub fn clean_table(table: &RawTable) -> CleanedTable {
    let headers = table.headers();
    let mut rows = Vec::with_capacity(table.data_row_count());
    let mut removed_rows = 0;

    for (idx, cells) in table.rows.iter().skip(1).enumerate() {
        if is_empty_row(cells) {
            removed_rows += 1;
            continue;
        }
        rows.push(SourceRow {
            row_number: idx + 1,
            cells: cells.iter().map(clean_cell).collect(),
        });
    }

    if removed_rows > 0 {
        log::debug!("Dropped {} empty rows", removed_rows);
    }

    CleanedTable {
        headers,
        rows,
        removed_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_row_detection() {
        let empty = vec![
            Value::from(""),
            Value::Null,
            Value::from("-"),
            Value::from("N/A"),
        ];
        assert!(is_empty_row(&empty));

        let kept = vec![Value::from(""), Value::Null, Value::from("0")];
        assert!(!is_empty_row(&kept));

        assert!(!is_empty_row(&[Value::Float(f64::NAN)]));
        assert!(!is_empty_row(&[Value::Int(0)]));
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell(&Value::from("  GD1 ")), Value::from("GD1"));
        assert_eq!(clean_cell(&Value::from(" n/a ")), Value::Null);
        assert_eq!(clean_cell(&Value::from("-")), Value::Null);
        assert_eq!(clean_cell(&Value::Float(f64::NAN)), Value::Null);
        assert_eq!(clean_cell(&Value::Int(7)), Value::Int(7));
    }

    #[test]
    fn test_clean_table_keeps_row_numbers() {
        let table = RawTable::from_strings(
            &["Code", "Name"],
            &[
                vec!["GD1", "Tiếp cận"],
                vec!["", "-"],
                vec![" GD2 ", "N/A"],
            ],
        );

        let cleaned = clean_table(&table);
        assert_eq!(cleaned.headers, vec!["Code", "Name"]);
        assert_eq!(cleaned.removed_rows, 1);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rows[1].row_number, 3);
        assert_eq!(cleaned.rows[1].cells, vec![Value::from("GD2"), Value::Null]);
    }

    #[test]
    fn test_clean_table_header_only() {
        let table = RawTable::from_strings(&["Code"], &[]);
        let cleaned = clean_table(&table);
        assert!(cleaned.rows.is_empty());
        assert_eq!(cleaned.removed_rows, 0);
    }
}
