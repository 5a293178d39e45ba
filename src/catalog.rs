//! Parquet catalog
//!
//! Caller-side glue around the analytical engine: discovers `*.parquet` tables in a
//! directory, reports their live schemas for the schema context, and runs generated
//! SQL through the polars SQL context. Generation itself never touches this module.

use crate::error::{ConverSqlError, Result};
use crate::schema_context::{ColumnSchema, TableSchema};
use polars::prelude::*;
use polars::sql::SQLContext;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ParquetCatalog {
    dir: PathBuf,
    tables: Vec<CatalogTable>,
}

impl ParquetCatalog {
    /// Every `*.parquet` file in `dir` (not recursive), sorted by path. The table name
    /// is the file stem.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| ConverSqlError::Catalog(format!("Cannot read {}: {}", dir.display(), e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                paths.push(path);
            }
        }
        paths.sort();

        let tables: Vec<CatalogTable> = paths
            .into_iter()
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                Some(CatalogTable { name, path })
            })
            .collect();
        info!("📂 Found {} parquet table(s) in {}", tables.len(), dir.display());
        Ok(Self { dir, tables })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tables(&self) -> &[CatalogTable] {
        &self.tables
    }

    fn scan(&self, table: &CatalogTable) -> Result<LazyFrame> {
        LazyFrame::scan_parquet(&table.path, ScanArgsParquet::default()).map_err(|e| {
            ConverSqlError::Catalog(format!("Failed to scan {}: {}", table.path.display(), e))
        })
    }

    /// Column names and engine types of every table, in file column order.
    pub fn table_schemas(&self) -> Result<Vec<TableSchema>> {
        self.tables
            .iter()
            .map(|table| {
                let schema = self.scan(table)?.schema()?;
                let columns = schema
                    .iter()
                    .map(|(name, dtype)| ColumnSchema::new(name.as_str(), engine_type(dtype)))
                    .collect();
                Ok(TableSchema::new(table.name.clone(), columns))
            })
            .collect()
    }

    pub fn execute(&self, sql: &str) -> Result<DataFrame> {
        let mut ctx = SQLContext::new();
        for table in &self.tables {
            ctx.register(&table.name, self.scan(table)?);
        }
        debug!("Executing SQL over {} table(s)", self.tables.len());
        let frame = ctx
            .execute(sql)
            .map_err(|e| ConverSqlError::Catalog(format!("Query failed: {}", e)))?;
        Ok(frame.collect()?)
    }
}

/// SQL-style type name for a polars dtype.
fn engine_type(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::String => "VARCHAR".to_string(),
        DataType::Binary => "BLOB".to_string(),
        other => other.to_string().to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_parquet(path: &Path, df: &mut DataFrame) {
        let mut file = std::fs::File::create(path).unwrap();
        ParquetWriter::new(&mut file).finish(df).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut loans = df![
            "LOAN_ID" => ["L1", "L2", "L3"],
            "STATE" => ["CA", "TX", "CA"],
            "CSCORE_B" => [600i64, 700, 580],
            "ORIG_RATE" => [6.5f64, 3.25, 7.0]
        ]
        .unwrap();
        write_parquet(&dir.path().join("loans.parquet"), &mut loans);
        let mut states = df!["STATE" => ["CA", "TX"], "NAME" => ["California", "Texas"]].unwrap();
        write_parquet(&dir.path().join("states.parquet"), &mut states);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[test]
    fn discovers_parquet_tables_sorted() {
        let dir = fixture();
        let catalog = ParquetCatalog::open(dir.path()).unwrap();
        let names: Vec<&str> = catalog.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["loans", "states"]);
    }

    #[test]
    fn schemas_keep_native_column_order() {
        let dir = fixture();
        let schemas = ParquetCatalog::open(dir.path()).unwrap().table_schemas().unwrap();
        assert_eq!(
            schemas[0],
            TableSchema::from_pairs(
                "loans",
                [
                    ("LOAN_ID", "VARCHAR"),
                    ("STATE", "VARCHAR"),
                    ("CSCORE_B", "BIGINT"),
                    ("ORIG_RATE", "DOUBLE"),
                ]
            )
        );
    }

    #[test]
    fn executes_sql_against_registered_tables() {
        let dir = fixture();
        let catalog = ParquetCatalog::open(dir.path()).unwrap();
        let df = catalog
            .execute("SELECT LOAN_ID FROM loans WHERE STATE = 'CA' AND CSCORE_B < 620")
            .unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn missing_directory_is_a_catalog_error() {
        let err = ParquetCatalog::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ConverSqlError::Catalog(_)));
    }
}
