use std::collections::HashMap;

use crate::connection::{ProtocolEvent, QueryEnd};
use crate::error::ServerError;
use crate::protocol::{Column, Row, Status};

/// Everything a query produced: column metadata and rows for each statement,
/// terminal metadata, and (on failure) the server's error fields.
///
/// Row iteration is one-shot within the current result set; [`next_set`]
/// steps to the following statement's results when multi-statements are
/// enabled.
///
/// [`next_set`]: Results::next_set
#[derive(Debug, Default)]
pub struct Results {
    // one entry per statement, in parallel
    columns: Vec<Vec<Column>>,
    rows: Vec<Vec<Row>>,

    affected_rows: u64,
    last_insert_id: u64,
    warnings: u16,
    status: Status,

    error: Option<ServerError>,

    // iteration cursor: (result set, next row)
    set_index: usize,
    row_index: usize,
}

impl Results {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fold one connection event into the accumulated results.
    pub(crate) fn apply(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::Columns(columns) => {
                self.columns.push(columns);
                self.rows.push(Vec::new());
            }

            ProtocolEvent::Row(row) => {
                if let Some(rows) = self.rows.last_mut() {
                    rows.push(row);
                }
            }

            ProtocolEvent::End(QueryEnd { affected_rows, last_insert_id, warnings, status }) => {
                self.affected_rows = affected_rows;
                self.last_insert_id = last_insert_id;
                self.warnings = warnings;
                self.status = status;
            }

            ProtocolEvent::ServerError(error) => {
                self.error = Some(error);
            }
        }
    }

    /// Column names of the current result set, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.column_names_at(self.set_index)
    }

    /// Column names of the `index`-th result set.
    pub fn column_names_at(&self, index: usize) -> Vec<&str> {
        self.columns
            .get(index)
            .map(|columns| columns.iter().map(|column| column.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Full column metadata of the current result set.
    pub fn columns(&self) -> &[Column] {
        self.columns.get(self.set_index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of result sets (statements that produced one).
    pub fn set_count(&self) -> usize {
        self.columns.len()
    }

    /// Step iteration to the next result set. Returns `false` when there is
    /// no further set.
    pub fn next_set(&mut self) -> bool {
        if self.set_index + 1 < self.columns.len() {
            self.set_index += 1;
            self.row_index = 0;
            true
        } else {
            false
        }
    }

    /// Number of rows in the current result set.
    pub fn rows(&self) -> usize {
        self.rows.get(self.set_index).map(Vec::len).unwrap_or(0)
    }

    /// Consume the next row as an ordered sequence of nullable values.
    pub fn array(&mut self) -> Option<Row> {
        let row = self.rows.get(self.set_index)?.get(self.row_index)?.clone();
        self.row_index += 1;

        Some(row)
    }

    /// Consume every remaining row of the current result set.
    pub fn arrays(&mut self) -> Vec<Row> {
        let mut remaining = Vec::new();

        while let Some(row) = self.array() {
            remaining.push(row);
        }

        remaining
    }

    /// Consume the next row as a mapping keyed by column name. On duplicate
    /// column names the last wins; use [`array`] when that matters.
    ///
    /// [`array`]: Results::array
    pub fn hash(&mut self) -> Option<HashMap<String, Option<String>>> {
        let names: Vec<String> =
            self.column_names().into_iter().map(str::to_owned).collect();
        let row = self.array()?;

        Some(names.into_iter().zip(row.into_values()).collect())
    }

    /// Consume every remaining row of the current result set as mappings.
    pub fn hashes(&mut self) -> Vec<HashMap<String, Option<String>>> {
        let mut remaining = Vec::new();

        while let Some(hash) = self.hash() {
            remaining.push(hash);
        }

        remaining
    }

    /// Rows affected by the statement (matched rows when `found_rows` is
    /// enabled).
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Value generated for an AUTO_INCREMENT column by the statement.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn warnings_count(&self) -> u16 {
        self.warnings
    }

    /// Server status flags from the terminal packet.
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error_code(&self) -> Option<u16> {
        self.error.as_ref().map(|error| error.code)
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.sql_state.as_str())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    pub(crate) fn take_error(&mut self) -> Option<ServerError> {
        self.error.take()
    }

    pub(crate) fn server_error(&self) -> Option<&ServerError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::Results;
    use crate::connection::{ProtocolEvent, QueryEnd};
    use crate::error::ServerError;
    use crate::protocol::{Column, ColumnFlags, Row, Status};

    fn column(name: &str) -> Column {
        Column {
            catalog: "def".into(),
            schema: "test".into(),
            table: "t".into(),
            org_table: "t".into(),
            name: name.into(),
            org_name: name.into(),
            character_set: 33,
            column_length: 28,
            type_id: 0xfd,
            flags: ColumnFlags::empty(),
            decimals: 0,
        }
    }

    fn row(values: &[Option<&str>]) -> Row {
        use crate::io::ProtocolDecode;

        let mut payload = Vec::new();
        for value in values {
            match value {
                Some(value) => {
                    payload.push(value.len() as u8);
                    payload.extend_from_slice(value.as_bytes());
                }
                None => payload.push(0xfb),
            }
        }

        Row::decode_with(payload.into(), values.len()).unwrap()
    }

    fn end(status: Status) -> ProtocolEvent {
        ProtocolEvent::End(QueryEnd {
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
            status,
        })
    }

    #[test]
    fn one_shot_row_iteration() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::Columns(vec![column("id"), column("name")]));
        results.apply(ProtocolEvent::Row(row(&[Some("1"), Some("alice")])));
        results.apply(ProtocolEvent::Row(row(&[Some("2"), None])));
        results.apply(end(Status::AUTOCOMMIT));

        assert_eq!(results.column_names(), ["id", "name"]);
        assert_eq!(results.rows(), 2);

        let first = results.array().unwrap();
        assert_eq!(first.get(0), Some("1"));
        assert_eq!(first.get(1), Some("alice"));

        let second = results.array().unwrap();
        assert_eq!(second.get(1), None);

        assert!(results.array().is_none());
    }

    #[test]
    fn hash_keys_by_column_name() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::Columns(vec![column("id"), column("name")]));
        results.apply(ProtocolEvent::Row(row(&[Some("7"), Some("bob")])));
        results.apply(end(Status::AUTOCOMMIT));

        let hash = results.hash().unwrap();
        assert_eq!(hash["id"].as_deref(), Some("7"));
        assert_eq!(hash["name"].as_deref(), Some("bob"));

        assert!(results.hash().is_none());
    }

    #[test]
    fn duplicate_column_names_last_wins() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::Columns(vec![column("n"), column("n")]));
        results.apply(ProtocolEvent::Row(row(&[Some("1"), Some("2")])));
        results.apply(end(Status::AUTOCOMMIT));

        let hash = results.hash().unwrap();
        assert_eq!(hash.len(), 1);
        assert_eq!(hash["n"].as_deref(), Some("2"));
    }

    #[test]
    fn multi_statement_sets() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::Columns(vec![column("1")]));
        results.apply(ProtocolEvent::Row(row(&[Some("1")])));
        results.apply(end(Status::MORE_RESULTS_EXISTS));
        results.apply(ProtocolEvent::Columns(vec![column("2")]));
        results.apply(ProtocolEvent::Row(row(&[Some("2")])));
        results.apply(end(Status::AUTOCOMMIT));

        assert_eq!(results.set_count(), 2);
        assert_eq!(results.column_names(), ["1"]);
        assert_eq!(results.array().unwrap().get(0), Some("1"));
        assert!(results.array().is_none());

        assert!(results.next_set());
        assert_eq!(results.column_names(), ["2"]);
        assert_eq!(results.array().unwrap().get(0), Some("2"));

        assert!(!results.next_set());
    }

    #[test]
    fn carries_error_fields() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::ServerError(ServerError {
            code: 1146,
            sql_state: "42S02".into(),
            message: "Table 'test.nope' doesn't exist".into(),
        }));

        assert_eq!(results.error_code(), Some(1146));
        assert_eq!(results.sql_state(), Some("42S02"));
        assert!(results.error_message().unwrap().contains("doesn't exist"));
    }

    #[test]
    fn terminal_metadata() {
        let mut results = Results::new();
        results.apply(ProtocolEvent::End(QueryEnd {
            affected_rows: 3,
            last_insert_id: 42,
            warnings: 1,
            status: Status::AUTOCOMMIT,
        }));

        assert_eq!(results.affected_rows(), 3);
        assert_eq!(results.last_insert_id(), 42);
        assert_eq!(results.warnings_count(), 1);
    }
}
