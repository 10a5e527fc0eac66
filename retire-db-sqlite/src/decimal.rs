use std::str::FromStr;

use retire_core::RepositoryError;
use rust_decimal::Decimal;
use sqlx::{Row, TypeInfo, ValueRef};

/// Read a decimal column.
///
/// Values are written as TEXT. INTEGER and REAL are still accepted so rows
/// written by older tooling remain readable.
/// NULL reads as zero.
pub fn get_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    // SQLite reports the declared column type even for NULL values.
    if value_ref.is_null() {
        return Ok(Decimal::ZERO);
    }

    let type_info = value_ref.type_info();
    let type_name = type_info.name();

    match type_name {
        "TEXT" => {
            let text: String = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get TEXT from '{}': {}", column, e))
            })?;
            Decimal::from_str(text.trim()).map_err(|e| {
                RepositoryError::Database(format!(
                    "Invalid decimal '{}' in column '{}': {}",
                    text, column, e
                ))
            })
        }
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!(
                    "Failed to get INTEGER from '{}': {}",
                    column, e
                ))
            })?;
            Ok(Decimal::from(val))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get REAL from '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map_err(|e| {
                RepositoryError::Database(format!("Failed to convert {} to Decimal: {}", val, e))
            })
        }
        _ => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            type_name, column
        ))),
    }
}

/// Read a nullable decimal column.
pub fn get_optional_decimal(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    if value_ref.is_null() {
        return Ok(None);
    }

    get_decimal(row, column).map(Some)
}

/// Exact text form of a decimal for storage.
pub fn decimal_to_text(d: Decimal) -> String {
    d.to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        sqlx::query(
            "CREATE TABLE test_decimals (
                id INTEGER PRIMARY KEY,
                text_value TEXT,
                int_value INTEGER,
                real_value REAL,
                blob_value BLOB
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create test table");
        pool
    }

    async fn fetch_row(
        pool: &SqlitePool,
        insert: &str,
    ) -> SqliteRow {
        sqlx::query(insert)
            .execute(pool)
            .await
            .expect("Failed to insert test data");
        sqlx::query("SELECT * FROM test_decimals WHERE id = 1")
            .fetch_one(pool)
            .await
            .expect("Failed to fetch row")
    }

    // get_decimal

    #[tokio::test]
    async fn test_get_decimal_from_text_keeps_cents() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, text_value) VALUES (1, '1234567.89')",
        )
        .await;

        assert_eq!(get_decimal(&row, "text_value"), Ok(dec!(1234567.89)));
    }

    #[tokio::test]
    async fn test_get_decimal_from_negative_text() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, text_value) VALUES (1, '-0.01')",
        )
        .await;

        assert_eq!(get_decimal(&row, "text_value"), Ok(dec!(-0.01)));
    }

    #[tokio::test]
    async fn test_get_decimal_from_invalid_text() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, text_value) VALUES (1, 'not a number')",
        )
        .await;

        let result = get_decimal(&row, "text_value");

        assert!(matches!(result, Err(RepositoryError::Database(msg)) if msg.starts_with("Invalid decimal 'not a number'")));
    }

    #[tokio::test]
    async fn test_get_decimal_from_legacy_integer() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, int_value) VALUES (1, 12345)",
        )
        .await;

        assert_eq!(get_decimal(&row, "int_value"), Ok(dec!(12345)));
    }

    #[tokio::test]
    async fn test_get_decimal_from_legacy_real() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, real_value) VALUES (1, 123.45)",
        )
        .await;

        assert_eq!(get_decimal(&row, "real_value"), Ok(dec!(123.45)));
    }

    #[tokio::test]
    async fn test_get_decimal_from_null_returns_zero() {
        let pool = setup_test_db().await;
        let row = fetch_row(&pool, "INSERT INTO test_decimals (id) VALUES (1)").await;

        assert_eq!(get_decimal(&row, "text_value"), Ok(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_get_decimal_from_null_in_every_declared_type() {
        let pool = setup_test_db().await;
        let row = fetch_row(&pool, "INSERT INTO test_decimals (id) VALUES (1)").await;

        for column in ["text_value", "int_value", "real_value", "blob_value"] {
            assert_eq!(get_decimal(&row, column), Ok(Decimal::ZERO), "column {}", column);
        }
    }

    #[tokio::test]
    async fn test_get_decimal_column_not_found() {
        let pool = setup_test_db().await;
        let row = fetch_row(&pool, "INSERT INTO test_decimals (id) VALUES (1)").await;

        let result = get_decimal(&row, "nonexistent_column");

        assert!(matches!(result, Err(RepositoryError::Database(msg)) if msg.starts_with("Column 'nonexistent_column' not found:")));
    }

    #[tokio::test]
    async fn test_get_decimal_unexpected_type() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, blob_value) VALUES (1, x'00ff')",
        )
        .await;

        assert_eq!(
            get_decimal(&row, "blob_value"),
            Err(RepositoryError::Database(
                "Unexpected type 'BLOB' for column 'blob_value'".to_string()
            ))
        );
    }

    // get_optional_decimal

    #[tokio::test]
    async fn test_get_optional_decimal_from_text() {
        let pool = setup_test_db().await;
        let row = fetch_row(
            &pool,
            "INSERT INTO test_decimals (id, text_value) VALUES (1, '999.99')",
        )
        .await;

        assert_eq!(get_optional_decimal(&row, "text_value"), Ok(Some(dec!(999.99))));
    }

    #[tokio::test]
    async fn test_get_optional_decimal_from_null_returns_none() {
        let pool = setup_test_db().await;
        let row = fetch_row(&pool, "INSERT INTO test_decimals (id) VALUES (1)").await;

        assert_eq!(get_optional_decimal(&row, "text_value"), Ok(None));
    }

    // decimal_to_text

    #[test]
    fn test_decimal_to_text_keeps_scale() {
        assert_eq!(decimal_to_text(dec!(100.50)), "100.50");
        assert_eq!(decimal_to_text(dec!(-789.01)), "-789.01");
        assert_eq!(decimal_to_text(Decimal::ZERO), "0");
    }

    #[tokio::test]
    async fn test_text_round_trip_is_exact() {
        let pool = setup_test_db().await;
        let value = dec!(98765432109.87);
        sqlx::query("INSERT INTO test_decimals (id, text_value) VALUES (1, ?)")
            .bind(decimal_to_text(value))
            .execute(&pool)
            .await
            .expect("Failed to insert test data");
        let row = sqlx::query("SELECT text_value FROM test_decimals WHERE id = 1")
            .fetch_one(&pool)
            .await
            .expect("Failed to fetch row");

        assert_eq!(get_decimal(&row, "text_value"), Ok(value));
    }
}
