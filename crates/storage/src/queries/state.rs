//! Key/value rows of `storestate`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

pub trait StateQueries {
    fn get_state(&self, name: &str) -> Result<Option<String>>;

    fn set_state(&self, name: &str, value: &str) -> Result<()>;
}

impl StateQueries for Connection {
    fn get_state(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .query_row("SELECT state FROM storestate WHERE statename = ?1", [name], |row| row.get(0))
            .optional()?)
    }

    fn set_state(&self, name: &str, value: &str) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO storestate (statename, state) VALUES (?1, ?2)",
            params![name, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_connection;

    #[test]
    fn test_state_roundtrip_and_overwrite() {
        let conn = test_connection();
        assert_eq!(conn.get_state("k").unwrap(), None);
        conn.set_state("k", "1").unwrap();
        conn.set_state("k", "2").unwrap();
        assert_eq!(conn.get_state("k").unwrap().as_deref(), Some("2"));
    }
}
