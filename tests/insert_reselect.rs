#![cfg(feature = "test-utils")]
use std::sync::Arc;

use sql_glue::prelude::*;
use sql_glue::test_utils::{ScriptedConnection, result_set};

#[derive(Debug, Default, Clone, PartialEq)]
struct Account {
    id: i64,
    owner: String,
}

sql_glue::record_shape!(Account { id: i64, owner: String });

fn columns(key: bool, identity: bool) -> ResultSet {
    let flag = |b: bool| RowValues::Int(i64::from(b));
    result_set(
        &[
            "column_name", "ordinal", "data_type", "is_nullable", "max_length",
            "numeric_precision", "numeric_scale", "is_identity", "is_computed", "is_key",
        ],
        vec![
            vec![
                RowValues::Text("Id".into()), RowValues::Int(1), RowValues::Text("int".into()),
                RowValues::Text("NO".into()), RowValues::Null, RowValues::Int(10), RowValues::Int(0),
                flag(identity), flag(false), flag(key),
            ],
            vec![
                RowValues::Text("Owner".into()), RowValues::Int(2), RowValues::Text("varchar".into()),
                RowValues::Text("YES".into()), RowValues::Int(50), RowValues::Null, RowValues::Null,
                flag(false), flag(false), flag(false),
            ],
        ],
    )
}

fn stored_row(id: i64) -> ResultSet {
    result_set(&["Id", "Owner"], vec![vec![RowValues::Int(id), RowValues::Text("dana".into())]])
}

async fn open(conn: ScriptedConnection) -> Result<DbContext, SqlGlueError> {
    DbContext::with_services(Box::new(conn), Arc::new(MetadataServices::default())).await
}

#[tokio::test]
async fn sql_server_inserts_and_reselects_in_one_batch() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::sql_server()
        .respond("INFORMATION_SCHEMA.COLUMNS", columns(true, true))
        .respond("SCOPE_IDENTITY()", stored_row(42));
    let log = conn.log();
    let mut ctx = open(conn).await?;

    let stored = ctx
        .table::<Account>("Accounts")
        .insert(&Account { id: 0, owner: "dana".into() })
        .await?;
    assert_eq!(stored, Account { id: 42, owner: "dana".into() });

    let batch = log.last().ok_or("no batch logged")?;
    assert_eq!(
        batch.text,
        "SET NOCOUNT ON; INSERT INTO [dbo].[Accounts] ([owner]) VALUES (@owner); \
         SELECT * FROM [dbo].[Accounts] WHERE [Id] = SCOPE_IDENTITY()"
    );
    assert_eq!(batch.parameters.len(), 1);
    assert_eq!(log.count_containing("INSERT"), 1);
    Ok(())
}

#[tokio::test]
async fn mysql_reselects_with_last_insert_id() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::mysql()
        .with_database(Some("bank"))
        .respond("INFORMATION_SCHEMA.COLUMNS", columns(true, true))
        .respond("LAST_INSERT_ID()", stored_row(7));
    let log = conn.log();
    let mut ctx = open(conn).await?;

    let stored = ctx
        .table::<Account>("accounts")
        .insert(&Account { id: 0, owner: "dana".into() })
        .await?;
    assert_eq!(stored.id, 7);

    let texts = log.texts();
    let tail = &texts[texts.len() - 2..];
    assert_eq!(tail[0], "INSERT INTO `bank`.`accounts` (`owner`) VALUES (@owner)");
    assert_eq!(tail[1], "SELECT * FROM `bank`.`accounts` WHERE `Id` = LAST_INSERT_ID()");
    Ok(())
}

#[tokio::test]
async fn key_without_identity_reselects_by_key() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::sql_server()
        .respond("INFORMATION_SCHEMA.COLUMNS", columns(true, false))
        .respond("WHERE [id] = @id", stored_row(5));
    let log = conn.log();
    let mut ctx = open(conn).await?;

    let stored = ctx
        .table::<Account>("Accounts")
        .insert(&Account { id: 5, owner: "dana".into() })
        .await?;
    assert_eq!(stored.id, 5);

    let reselect = log.last().ok_or("no reselect logged")?;
    assert_eq!(reselect.text, "SELECT * FROM [dbo].[Accounts] WHERE [id] = @id");
    assert_eq!(reselect.parameters.find("id").map(|p| &p.value), Some(&RowValues::Int(5)));
    Ok(())
}

#[tokio::test]
async fn keyless_insert_fails_before_touching_the_table() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::sql_server().respond("INFORMATION_SCHEMA.COLUMNS", columns(false, false));
    let log = conn.log();
    let mut ctx = open(conn).await?;

    let err = ctx
        .table::<Account>("Accounts")
        .insert(&Account::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlGlueError::InvalidOperation(_)));
    assert_eq!(log.count_containing("INSERT"), 0);
    Ok(())
}

#[tokio::test]
async fn unknown_dialects_cannot_reselect() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new("Acme.DataClient")
        .with_conventions("\"", "\"", "@")
        .respond("INFORMATION_SCHEMA.COLUMNS", columns(true, true));
    let mut ctx = open(conn).await?;
    let err = ctx
        .table::<Account>("accounts")
        .insert(&Account::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlGlueError::NotSupported(_)));
    Ok(())
}
