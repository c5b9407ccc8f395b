use super::error::ColumnError;
use super::model::{Table, TextColumn};

/// Joins the parts of a composite key (`BRK` + `A` -> `BRK.A`).
pub const KEY_SEPARATOR: char = '.';

/// The key columns of one table, resolved as text.
///
/// A row's key is the values of the columns joined with [`KEY_SEPARATOR`];
/// a null cell contributes an empty part, so a listing without a suffix
/// keys as `AAPL.` under `sym_root,sym_suffix` and as `""` under
/// `sym_suffix` alone.
#[derive(Debug, Clone)]
pub struct SymbolKeys {
    columns: Vec<TextColumn>,
}

impl SymbolKeys {
    pub fn resolve(table: &Table, names: &[String]) -> Result<Self, ColumnError> {
        let columns = names
            .iter()
            .map(|name| table.text_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    /// Key of `row`.  Single-column keys borrow straight from the column;
    /// composite keys are assembled in `buf`.
    pub fn key_at<'a>(&'a self, row: usize, buf: &'a mut String) -> &'a str {
        match self.columns.as_slice() {
            [only] => only.value(row).unwrap_or(""),
            columns => {
                buf.clear();
                for (i, col) in columns.iter().enumerate() {
                    if i > 0 {
                        buf.push(KEY_SEPARATOR);
                    }
                    buf.push_str(col.value(row).unwrap_or(""));
                }
                buf.as_str()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, StringArray};
    use arrow::record_batch::RecordBatch;

    use super::*;

    fn listings() -> Table {
        let roots = StringArray::from(vec![Some("BRK"), Some("PBR"), Some("AAPL")]);
        let suffixes = StringArray::from(vec![Some("A"), Some("A"), None]);
        let batch = RecordBatch::try_from_iter(vec![
            ("sym_root", Arc::new(roots) as ArrayRef),
            ("sym_suffix", Arc::new(suffixes) as ArrayRef),
        ])
        .unwrap();
        Table::new(batch)
    }

    #[test]
    fn composite_keys_keep_roots_apart() {
        let names = vec!["sym_root".to_string(), "sym_suffix".to_string()];
        let keys = SymbolKeys::resolve(&listings(), &names).unwrap();
        let mut buf = String::new();

        assert_eq!(keys.key_at(0, &mut buf), "BRK.A");
        assert_eq!(keys.key_at(1, &mut buf), "PBR.A");
        assert_eq!(keys.key_at(2, &mut buf), "AAPL.");
    }

    #[test]
    fn single_key_maps_null_to_empty() {
        let keys = SymbolKeys::resolve(&listings(), &["sym_suffix".to_string()]).unwrap();
        let mut buf = String::new();

        assert_eq!(keys.key_at(0, &mut buf), "A");
        assert_eq!(keys.key_at(2, &mut buf), "");
    }

    #[test]
    fn any_missing_key_column_fails() {
        let names = vec!["sym_root".to_string(), "exchange".to_string()];
        assert!(matches!(
            SymbolKeys::resolve(&listings(), &names),
            Err(ColumnError::Missing { column }) if column == "exchange"
        ));
    }
}
