use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Null,
}

/// What a column accepts from a JSON payload.
#[derive(Clone, Copy)]
pub enum ColumnKind {
    /// Non-empty string
    Text,
    /// Finite, non-negative number
    Amount,
    /// Non-negative integer, or null
    OptionalCount,
    /// String accepted by the given parser
    Choice(fn(&str) -> bool),
}

/// Maps a JSON field (dotted for nested objects) to a table column.
#[derive(Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(field: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        Self {
            field,
            column,
            kind,
        }
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// `{"allowances": {"meal": 1}}` becomes `{"allowances.meal": 1}`; one level deep.
fn flatten(obj: &Map<String, Value>) -> Vec<(String, &Value)> {
    let mut fields = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match value {
            Value::Object(inner) => {
                for (inner_key, inner_value) in inner {
                    fields.push((format!("{key}.{inner_key}"), inner_value));
                }
            }
            _ => fields.push((key.clone(), value)),
        }
    }
    fields
}

fn convert(column: &Column, value: &Value) -> AppResult<SqlValue> {
    let invalid = |what: &str| AppError::validation(format!("{} must be {what}", column.field));

    match (column.kind, value) {
        (ColumnKind::Text, Value::String(s)) if !s.trim().is_empty() => {
            Ok(SqlValue::String(s.trim().to_string()))
        }
        (ColumnKind::Text, _) => Err(invalid("a non-empty string")),

        (ColumnKind::Amount, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => Ok(SqlValue::F64(f)),
            _ => Err(invalid("a non-negative amount")),
        },
        (ColumnKind::Amount, _) => Err(invalid("a non-negative amount")),

        (ColumnKind::OptionalCount, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::OptionalCount, Value::Number(n)) => match n.as_i64() {
            Some(i) if (0..=i64::from(i32::MAX)).contains(&i) => Ok(SqlValue::I64(i)),
            _ => Err(invalid("a non-negative whole number")),
        },
        (ColumnKind::OptionalCount, _) => Err(invalid("a non-negative whole number")),

        (ColumnKind::Choice(accepts), Value::String(s)) if accepts(s) => {
            Ok(SqlValue::String(s.clone()))
        }
        (ColumnKind::Choice(_), _) => Err(invalid("one of the allowed values")),
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only fields listed in `columns` may be set; anything else is rejected
/// rather than silently dropped. Assignments come out sorted by field name.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    columns: &[Column],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    let mut fields = flatten(obj);
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    if fields.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len() + 1);

    for (field, value) in fields {
        let column = columns
            .iter()
            .find(|c| c.field == field)
            .ok_or_else(|| AppError::validation(format!("{field} cannot be updated")))?;

        assignments.push(format!("{} = ?", column.column));
        values.push(convert(column, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    tracing::debug!(sql = %update.sql, "Executing dynamic update");
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<i64>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::new("firstName", "first_name", ColumnKind::Text),
        Column::new("basicSalary", "basic_salary", ColumnKind::Amount),
        Column::new("allowances.meal", "meal_allowance", ColumnKind::Amount),
        Column::new("leaveBalance", "leave_balance", ColumnKind::OptionalCount),
        Column::new("status", "status", ColumnKind::Choice(known_status)),
    ];

    fn known_status(s: &str) -> bool {
        matches!(s, "active" | "inactive")
    }

    #[test]
    fn builds_set_clause_from_whitelisted_fields() {
        let update = build_update_sql(
            "staff",
            &json!({"basicSalary": 120000, "allowances": {"meal": 2000.5}}),
            COLUMNS,
            "id",
            9,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE staff SET meal_allowance = ?, basic_salary = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![SqlValue::F64(2000.5), SqlValue::F64(120000.0), SqlValue::U64(9)]
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = build_update_sql("staff", &json!({"id": 4}), COLUMNS, "id", 1).unwrap_err();
        assert_eq!(err.to_string(), "id cannot be updated");
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err =
            build_update_sql("staff", &json!({"basicSalary": -5}), COLUMNS, "id", 1).unwrap_err();
        assert_eq!(err.to_string(), "basicSalary must be a non-negative amount");
    }

    #[test]
    fn choice_and_null_handling() {
        let update = build_update_sql(
            "staff",
            &json!({"status": "inactive", "leaveBalance": null}),
            COLUMNS,
            "id",
            1,
        )
        .unwrap();
        assert!(update.values.contains(&SqlValue::String("inactive".into())));
        assert!(update.values.contains(&SqlValue::Null));

        assert!(build_update_sql("staff", &json!({"status": "fired"}), COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(build_update_sql("staff", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("staff", &json!([1, 2]), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("staff", &json!({"firstName": "  "}), COLUMNS, "id", 1).is_err());
    }
}
