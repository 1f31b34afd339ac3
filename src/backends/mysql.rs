//! MySQL database backend implementation
//!
//! Built on `mysql_async`. Statements always go through the binary protocol
//! with positional parameters, so values are bound by the server and never
//! interpolated into SQL text.

use crate::core::{
    connection::Connection, connection::Connector, connection::EndpointConfig,
    database_types::DatabaseType, error::DatabaseError, error::Result, value::DatabaseResult,
    value::DatabaseRow, value::DatabaseValue,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, DriverError, OptsBuilder, Params, Row, Value};

/// Server error codes that mean the session is gone rather than the statement is bad
const CONNECTION_ERROR_CODES: &[u16] = &[
    1040, // ER_CON_COUNT_ERROR
    1053, // ER_SERVER_SHUTDOWN
    1927, // ER_CONNECTION_KILLED
    2006, // CR_SERVER_GONE_ERROR
    2013, // CR_SERVER_LOST
    2055, // CR_SERVER_LOST_EXTENDED
    4031, // ER_CLIENT_INTERACTION_TIMEOUT
];

/// Opens MySQL sessions for one endpoint
pub struct MysqlConnector {
    endpoint: EndpointConfig,
}

impl MysqlConnector {
    /// Create a connector after validating the endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is incomplete
    pub fn new(endpoint: EndpointConfig) -> Result<Self> {
        endpoint.validate()?;
        Ok(Self { endpoint })
    }

    fn opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.endpoint.host.clone())
            .tcp_port(self.endpoint.port)
            .user(Some(self.endpoint.username.clone()))
            .pass(self.endpoint.password.clone())
            .db_name(Some(self.endpoint.database.clone()))
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mysql
    }

    fn endpoint(&self) -> String {
        self.endpoint.describe()
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = Conn::new(self.opts()).await.map_err(|e| {
            let message = e.to_string();
            match classify(e) {
                err if err.is_connection_class() => DatabaseError::connection_failed_with_source(
                    self.endpoint(),
                    message,
                    Box::new(err),
                ),
                // Access denied, unknown database and the like
                err => err,
            }
        })?;

        Ok(Box::new(MysqlConnection {
            conn: Some(conn),
            in_transaction: false,
            last_insert_id: None,
        }))
    }
}

/// One open MySQL session
pub struct MysqlConnection {
    conn: Option<Conn>,
    in_transaction: bool,
    last_insert_id: Option<u64>,
}

impl MysqlConnection {
    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("Not connected"))
    }

    /// Convert bound values into positional parameters
    fn to_params(params: &[DatabaseValue]) -> Params {
        if params.is_empty() {
            return Params::Empty;
        }
        Params::Positional(params.iter().map(Self::value_to_param).collect())
    }

    fn value_to_param(value: &DatabaseValue) -> Value {
        match value {
            DatabaseValue::Null => Value::NULL,
            DatabaseValue::Bool(v) => Value::Int(i64::from(*v)),
            DatabaseValue::Int(v) => Value::Int(i64::from(*v)),
            DatabaseValue::Long(v) => Value::Int(*v),
            DatabaseValue::Float(v) => Value::Float(*v),
            DatabaseValue::Double(v) => Value::Double(*v),
            DatabaseValue::String(v) => Value::Bytes(v.clone().into_bytes()),
            DatabaseValue::Bytes(v) => Value::Bytes(v.clone()),
            DatabaseValue::Timestamp(micros) => {
                match chrono::DateTime::from_timestamp_micros(*micros) {
                    Some(ts) => {
                        let ts = ts.naive_utc();
                        Value::Date(
                            ts.year() as u16,
                            ts.month() as u8,
                            ts.day() as u8,
                            ts.hour() as u8,
                            ts.minute() as u8,
                            ts.second() as u8,
                            ts.and_utc().timestamp_subsec_micros(),
                        )
                    }
                    None => Value::NULL,
                }
            }
        }
    }

    /// Convert a MySQL row to a DatabaseRow, keeping column order
    fn row_to_database_row(row: Row) -> DatabaseRow {
        let columns = row.columns();
        let values = row.unwrap();
        let mut db_row = DatabaseRow::with_capacity(columns.len());

        for (column, value) in columns.iter().zip(values) {
            let converted = Self::convert_value(value, column.column_type());
            db_row.insert(column.name_str().into_owned(), converted);
        }

        db_row
    }

    fn convert_value(value: Value, column_type: ColumnType) -> DatabaseValue {
        match value {
            Value::NULL => DatabaseValue::Null,
            Value::Int(v) => DatabaseValue::Long(v),
            Value::UInt(v) => i64::try_from(v)
                .map(DatabaseValue::Long)
                .unwrap_or(DatabaseValue::Double(v as f64)),
            Value::Float(v) => DatabaseValue::Float(v),
            Value::Double(v) => DatabaseValue::Double(v),
            // Strings, decimals and blobs all arrive as bytes
            Value::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => DatabaseValue::String(s),
                Err(e) => DatabaseValue::Bytes(e.into_bytes()),
            },
            Value::Date(year, month, day, hour, minute, second, micros) => {
                let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
                if column_type == ColumnType::MYSQL_TYPE_DATE {
                    return match date {
                        Some(d) => DatabaseValue::String(d.format("%Y-%m-%d").to_string()),
                        // Zero dates such as 0000-00-00
                        None => DatabaseValue::Null,
                    };
                }
                date.and_then(|d| {
                    d.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                })
                .map(|ts| DatabaseValue::Timestamp(ts.and_utc().timestamp_micros()))
                .unwrap_or(DatabaseValue::Null)
            }
            Value::Time(negative, days, hours, minutes, seconds, _micros) => {
                let total_hours = days * 24 + u32::from(hours);
                DatabaseValue::String(format!(
                    "{}{:02}:{:02}:{:02}",
                    if negative { "-" } else { "" },
                    total_hours,
                    minutes,
                    seconds
                ))
            }
        }
    }
}

/// Map a driver error onto the query layer's taxonomy
fn classify(err: mysql_async::Error) -> DatabaseError {
    match err {
        mysql_async::Error::Io(e) => DatabaseError::connection_lost(None, e.to_string()),
        mysql_async::Error::Driver(DriverError::ConnectionClosed) => {
            DatabaseError::connection_lost(None, "connection closed by driver")
        }
        mysql_async::Error::Driver(e) => DatabaseError::query(e.to_string()),
        mysql_async::Error::Server(e) if CONNECTION_ERROR_CODES.contains(&e.code) => {
            DatabaseError::connection_lost(Some(e.code), e.message)
        }
        mysql_async::Error::Server(e) => {
            DatabaseError::query(format!("{} ({}): {}", e.code, e.state, e.message))
        }
        mysql_async::Error::Url(e) => DatabaseError::configuration(e.to_string()),
        other => DatabaseError::other(other.to_string()),
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mysql
    }

    async fn ping(&mut self) -> Result<()> {
        self.conn()?.ping().await.map_err(classify)
    }

    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let params = Self::to_params(params);
        let rows: Vec<Row> = self
            .conn()?
            .exec(query, params)
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().map(Self::row_to_database_row).collect())
    }

    async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let params = Self::to_params(params);
        let conn = self.conn()?;
        conn.exec_drop(query, params).await.map_err(classify)?;

        let affected = conn.affected_rows();
        let inserted = conn.last_insert_id().filter(|id| *id > 0);
        self.last_insert_id = inserted;
        Ok(affected)
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(DatabaseError::transaction("Already in a transaction"));
        }
        self.conn()?
            .query_drop("START TRANSACTION")
            .await
            .map_err(classify)?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }
        self.conn()?.query_drop("COMMIT").await.map_err(classify)?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }
        self.in_transaction = false;
        self.conn()?.query_drop("ROLLBACK").await.map_err(classify)
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.disconnect().await.map_err(classify),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::ServerError;

    fn server_error(code: u16) -> mysql_async::Error {
        mysql_async::Error::Server(ServerError {
            code,
            message: "boom".to_string(),
            state: "HY000".to_string(),
        })
    }

    #[test]
    fn test_classify_server_codes() {
        for code in [2006, 2013, 1053] {
            let err = classify(server_error(code));
            assert!(err.is_connection_class(), "code {code} should be connection-class");
        }

        // Syntax error and duplicate key are the statement's fault
        for code in [1064, 1062, 1146] {
            let err = classify(server_error(code));
            assert!(!err.is_connection_class(), "code {code} should be query-class");
        }
    }

    #[test]
    fn test_classify_driver_errors() {
        let err = classify(mysql_async::Error::Driver(DriverError::ConnectionClosed));
        assert!(err.is_connection_class());

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err = classify(mysql_async::Error::from(io));
        assert!(err.is_connection_class());
    }

    #[test]
    fn test_convert_values() {
        assert_eq!(
            MysqlConnection::convert_value(Value::Bytes(b"Acme".to_vec()), ColumnType::MYSQL_TYPE_VAR_STRING),
            DatabaseValue::String("Acme".to_string())
        );
        assert_eq!(
            MysqlConnection::convert_value(Value::Date(2024, 3, 9, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE),
            DatabaseValue::String("2024-03-09".to_string())
        );

        let ts = MysqlConnection::convert_value(
            Value::Date(2024, 3, 9, 14, 30, 5, 0),
            ColumnType::MYSQL_TYPE_DATETIME,
        );
        assert_eq!(
            ts.to_json(),
            serde_json::Value::String("2024-03-09 14:30:05".to_string())
        );
        assert_eq!(
            MysqlConnection::convert_value(Value::UInt(7), ColumnType::MYSQL_TYPE_LONGLONG),
            DatabaseValue::Long(7)
        );
    }

    #[test]
    fn test_connector_requires_password() {
        let endpoint = EndpointConfig::new(DatabaseType::Mysql);
        assert!(matches!(
            MysqlConnector::new(endpoint),
            Err(DatabaseError::Configuration(_))
        ));

        let connector = MysqlConnector::new(EndpointConfig::new(DatabaseType::Mysql).password("pw"))
            .expect("valid endpoint");
        assert_eq!(connector.endpoint(), "mysql://root@localhost:3306/smart_supply_chain");
    }
}
