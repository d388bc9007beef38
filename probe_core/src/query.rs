use serde::{Deserialize, Serialize};

/// Column descriptor of a tabular query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows of nullable strings as returned by the monitored service.
///
/// The cache stores this value as-is; collectors do their own parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns the cell at `row`/`column`, or `None` when out of range or NULL.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec![Column::new("datname", "text"), Column::new("size", "int8")],
            vec![
                vec![Some("postgres".into()), Some("8192".into())],
                vec![Some("app".into()), None],
            ],
        )
    }

    #[test]
    fn test_cell_lookup() {
        let result = sample();
        assert_eq!(result.cell(0, "datname"), Some("postgres"));
        assert_eq!(result.cell(1, "size"), None);
        assert_eq!(result.cell(2, "datname"), None);
        assert_eq!(result.cell(0, "missing"), None);
    }
}
