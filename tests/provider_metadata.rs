#![cfg(feature = "test-utils")]
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use sql_glue::prelude::*;
use sql_glue::test_utils::ScriptedConnection;
use sql_glue::ProviderMetadataResolver;

#[tokio::test]
async fn sql_server_defaults_and_open_on_resolve() -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ProviderMetadataResolver::default();
    let mut conn = ScriptedConnection::sql_server().with_connection_string("Server=a;Database=b");
    let opens = conn.open_counter();

    let meta = resolver.resolve(&mut conn).await?;
    assert_eq!(meta.kind, ProviderKind::SqlServer);
    assert_eq!(meta.quote_identifier("dbo.Orders"), "[dbo].[Orders]");
    assert_eq!(meta.quote_part("odd]name"), "[odd]]name]");
    assert_eq!(meta.parameter_name("id"), "@id");
    assert_eq!(meta.default_schema.as_deref(), Some("dbo"));
    assert_eq!(meta.default_timeout, Duration::from_secs(30));
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(conn.state(), ConnectionState::Open);
    Ok(())
}

#[tokio::test]
async fn sqlite_and_mysql_conventions() -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ProviderMetadataResolver::default();

    let sqlite = resolver.resolve(&mut ScriptedConnection::sqlite()).await?;
    assert_eq!(sqlite.kind, ProviderKind::Sqlite);
    assert_eq!(sqlite.parameter_name("@id"), "$id");
    assert_eq!(sqlite.default_schema.as_deref(), Some("main"));

    let mysql = resolver
        .resolve(&mut ScriptedConnection::mysql().with_database(Some("shop")))
        .await?;
    assert_eq!(mysql.kind, ProviderKind::MySql);
    assert_eq!(mysql.quote_identifier("shop.orders"), "`shop`.`orders`");
    assert_eq!(mysql.default_schema.as_deref(), Some("shop"));
    Ok(())
}

#[tokio::test]
async fn metadata_is_cached_per_connection_identity() -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ProviderMetadataResolver::default();
    let conn = ScriptedConnection::sql_server().with_connection_string("Server=a");

    let first = resolver.resolve(&mut conn.clone()).await?;
    let second = resolver.resolve(&mut conn.clone()).await?;
    assert!(Arc::ptr_eq(&first, &second));

    let other = resolver
        .resolve(&mut conn.clone().with_connection_string("Server=b"))
        .await?;
    assert!(!Arc::ptr_eq(&first, &other));
    assert_ne!(first.key, other.key);
    Ok(())
}

#[tokio::test]
async fn driver_conventions_override_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ProviderMetadataResolver::default();
    let mut conn = ScriptedConnection::sql_server().with_conventions("\"", "\"", ":");
    let meta = resolver.resolve(&mut conn).await?;
    assert_eq!(meta.kind, ProviderKind::SqlServer);
    assert_eq!(meta.quote_part("Orders"), "\"Orders\"");
    assert_eq!(meta.parameter_name("id"), ":id");
    Ok(())
}

#[tokio::test]
async fn unknown_providers_need_driver_conventions() -> Result<(), Box<dyn std::error::Error>> {
    let resolver = ProviderMetadataResolver::default();

    let err = resolver
        .resolve(&mut ScriptedConnection::new("Acme.DataClient"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlGlueError::NotSupported(_)));

    let meta = resolver
        .resolve(&mut ScriptedConnection::new("Acme.DataClient").with_conventions("<", ">", "?"))
        .await?;
    assert_eq!(meta.kind, ProviderKind::Unknown);
    assert_eq!(meta.quote_part("t"), "<t>");

    let err = resolver.resolve(&mut ScriptedConnection::new("")).await.unwrap_err();
    assert!(matches!(err, SqlGlueError::ArgumentError(_)));
    Ok(())
}

#[tokio::test]
async fn resolver_timeout_flows_into_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let options = ResolverOptions::default().with_default_timeout(Duration::from_secs(5));
    let resolver = ProviderMetadataResolver::new(options);
    let meta = resolver.resolve(&mut ScriptedConnection::sqlite()).await?;
    assert_eq!(meta.default_timeout, Duration::from_secs(5));
    Ok(())
}
