use crate::{Store, StoreError};
use faascore::{Function, FunctionError, FunctionId};
use rusqlite::{params, Row};
use std::str::FromStr;

impl Store {
    /// Register a new function and return its assigned id
    pub fn insert_function(&self, function: &Function) -> Result<FunctionId, StoreError> {
        function.validate()?;
        let settings = serde_json::to_string(&function.settings)?;
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO functions (name, route, language, timeout, runtime, settings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                function.name,
                function.route,
                function.language.as_str(),
                function.timeout_secs as i64,
                function.runtime.as_str(),
                settings,
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => {
                Err(FunctionError::RouteTaken(function.route.clone()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All registered functions, oldest first
    pub fn list_functions(&self) -> Result<Vec<Function>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, route, language, timeout, runtime, settings
             FROM functions ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_function)?;
        let mut functions = Vec::new();
        for row in rows {
            functions.push(row??);
        }
        Ok(functions)
    }

    pub fn get_function(&self, id: FunctionId) -> Result<Function, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, route, language, timeout, runtime, settings
             FROM functions WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_function)?;
        match rows.next() {
            Some(row) => Ok(row??),
            None => Err(FunctionError::NotFound(id).into()),
        }
    }

    pub fn find_by_route(&self, route: &str) -> Result<Function, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, route, language, timeout, runtime, settings
             FROM functions WHERE route = ?1",
        )?;
        let mut rows = stmt.query_map(params![route], row_to_function)?;
        match rows.next() {
            Some(row) => Ok(row??),
            None => Err(FunctionError::UnknownRoute(route.to_string()).into()),
        }
    }

    /// Replace an existing definition; the id is preserved
    pub fn update_function(
        &self,
        id: FunctionId,
        function: &Function,
    ) -> Result<Function, StoreError> {
        function.validate()?;
        let settings = serde_json::to_string(&function.settings)?;
        let changed = {
            let conn = self.conn();
            let result = conn.execute(
                "UPDATE functions
                 SET name = ?1, route = ?2, language = ?3, timeout = ?4, runtime = ?5, settings = ?6
                 WHERE id = ?7",
                params![
                    function.name,
                    function.route,
                    function.language.as_str(),
                    function.timeout_secs as i64,
                    function.runtime.as_str(),
                    settings,
                    id,
                ],
            );
            match result {
                Ok(n) => n,
                Err(e) if is_unique_violation(&e) => {
                    return Err(FunctionError::RouteTaken(function.route.clone()).into())
                }
                Err(e) => return Err(e.into()),
            }
        };
        if changed == 0 {
            return Err(FunctionError::NotFound(id).into());
        }
        self.get_function(id)
    }

    pub fn delete_function(&self, id: FunctionId) -> Result<(), StoreError> {
        let changed = self
            .conn()
            .execute("DELETE FROM functions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(FunctionError::NotFound(id).into());
        }
        Ok(())
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_function(row: &Row<'_>) -> rusqlite::Result<Result<Function, StoreError>> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let route: String = row.get(2)?;
    let language: String = row.get(3)?;
    let timeout: i64 = row.get(4)?;
    let runtime: String = row.get(5)?;
    let settings: String = row.get(6)?;
    Ok(decode_function(
        id, name, route, language, timeout, runtime, settings,
    ))
}

fn decode_function(
    id: i64,
    name: String,
    route: String,
    language: String,
    timeout: i64,
    runtime: String,
    settings: String,
) -> Result<Function, StoreError> {
    let language = faascore::Language::from_str(&language)?;
    let runtime = faascore::RuntimeKind::from_str(&runtime)?;
    let settings = serde_json::from_str(&settings)?;
    Ok(Function {
        id,
        name,
        route,
        language,
        timeout_secs: timeout.max(0) as u64,
        runtime,
        settings,
    })
}
