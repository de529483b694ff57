use std::collections::HashMap;

/// Text columns carried alongside the numeric features of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowKey {
    pub ticker: String,
    pub insider_name: String,
    pub title: String,
}

/// Numeric feature table produced by the feature engineer.
///
/// Row order matches the input batch. Values may be NaN only when a whole column
/// had nothing to impute from; `matrix` turns those into 0.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
    keys: Vec<RowKey>,
}

impl FeatureTable {
    pub fn new(keys: Vec<RowKey>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    /// Adds or replaces a column. The column length must match the row count.
    pub fn insert(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.keys.len(), "column {name} has wrong length");
        match self.index.get(name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.index.insert(name.to_string(), self.columns.len());
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        let i = *self.index.get(name)?;
        Some(&mut self.columns[i])
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|c| c.get(row).copied())
    }

    pub fn key(&self, row: usize) -> Option<&RowKey> {
        self.keys.get(row)
    }

    /// Names of `wanted` that exist in this table, keeping the order of `wanted`.
    pub fn available<'a>(&self, wanted: &'a [String]) -> Vec<&'a String> {
        wanted.iter().filter(|n| self.has_column(n)).collect()
    }

    /// Row-major matrix over `names`. Absent columns and NaN cells become 0.
    pub fn matrix(&self, names: &[String]) -> Vec<Vec<f64>> {
        let cols: Vec<Option<&[f64]>> = names.iter().map(|n| self.column(n)).collect();
        (0..self.len())
            .map(|row| {
                cols.iter()
                    .map(|col| match col {
                        Some(values) if values[row].is_finite() => values[row],
                        _ => 0.0,
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<RowKey> {
        (0..n)
            .map(|i| RowKey {
                ticker: format!("T{i}"),
                insider_name: "X".to_string(),
                title: "Director".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_matrix_fills_absent_and_nan_with_zero() {
        let mut table = FeatureTable::new(keys(2));
        table.insert("a", vec![1.0, f64::NAN]);
        table.insert("b", vec![3.0, 4.0]);

        let names = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let m = table.matrix(&names);
        assert_eq!(m, vec![vec![3.0, 0.0, 1.0], vec![4.0, 0.0, 0.0]]);
        assert_eq!(table.available(&names), vec![&names[0], &names[2]]);
    }

    #[test]
    fn test_insert_replaces_existing_column() {
        let mut table = FeatureTable::new(keys(1));
        table.insert("a", vec![1.0]);
        table.insert("a", vec![2.0]);
        assert_eq!(table.names().len(), 1);
        assert_eq!(table.value(0, "a"), Some(2.0));
    }
}
