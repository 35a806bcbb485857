#![cfg(feature = "mssql")]
//! Runs against a real server when `TESTING_MSSQL_CONNECTION` holds a connection string,
//! e.g. `Server=tcp:localhost,1433;Database=master;User Id=sa;Password=...;TrustServerCertificate=true`.
use std::time::Duration;

use sql_glue::prelude::*;

fn live_options() -> Result<Option<MssqlOptions>, SqlGlueError> {
    match std::env::var("TESTING_MSSQL_CONNECTION") {
        Ok(cs) => MssqlOptions::from_connection_string(&cs).map(Some),
        Err(_) => Ok(None),
    }
}

#[tokio::test]
async fn wide_types_keep_their_value() -> Result<(), Box<dyn std::error::Error>> {
    let Some(opts) = live_options()? else {
        return Ok(());
    };
    let mut conn = opts.connection();
    conn.open().await?;

    let rs = conn
        .query(&Command::new(
            "SELECT CAST(12345678901234.5678 AS DECIMAL(18,4)) AS amount,
                    CAST('6F9619FF-8B86-D011-B42D-00C04FC964FF' AS UNIQUEIDENTIFIER) AS id,
                    CAST('13:45:10.5' AS TIME(1)) AS at,
                    CAST('2024-05-06 07:08:09 +02:00' AS DATETIMEOFFSET(0)) AS stamp,
                    CAST(NULL AS UNIQUEIDENTIFIER) AS missing",
        ))
        .await?;
    let row = &rs.results[0];
    assert_eq!(row.get("amount"), Some(&RowValues::Text("12345678901234.5678".into())));
    assert_eq!(
        row.get("id").and_then(RowValues::as_text).map(str::to_ascii_uppercase).as_deref(),
        Some("6F9619FF-8B86-D011-B42D-00C04FC964FF")
    );
    assert_eq!(row.get("at"), Some(&RowValues::Text("13:45:10.500".into())));
    assert_eq!(row.get("stamp"), Some(&RowValues::Text("2024-05-06T07:08:09+02:00".into())));
    assert_eq!(row.get("missing"), Some(&RowValues::Null));
    Ok(())
}

#[tokio::test]
async fn timed_out_command_closes_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let Some(opts) = live_options()? else {
        return Ok(());
    };
    let mut conn = opts.connection();
    conn.open().await?;

    let slow = Command::new("WAITFOR DELAY '00:00:05'; SELECT 1").with_timeout(Duration::from_secs(1));
    let err = conn.query(&slow).await.unwrap_err();
    assert!(matches!(err, SqlGlueError::ExecutionError(ref m) if m.contains("timed out")));
    assert_eq!(conn.state(), ConnectionState::Closed);

    conn.open().await?;
    let rs = conn.query(&Command::new("SELECT 2 AS two")).await?;
    assert_eq!(rs.scalar(), Some(&RowValues::Int(2)));
    Ok(())
}
