#![cfg(feature = "sqlite")]
use std::sync::Arc;

use sql_glue::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    id: i64,
    name: String,
    age: Option<i32>,
    active: bool,
}

sql_glue::record_shape!(Person { id: i64, name: String, age: Option<i32>, active: bool });

async fn people_db(dir: &tempfile::TempDir) -> Result<DbContext, SqlGlueError> {
    let path = dir.path().join("people.db");
    let conn = SqliteOptions::builder(path.to_string_lossy().into_owned())
        .busy_timeout(std::time::Duration::from_secs(2))
        .finish()
        .connection();
    let mut ctx = DbContext::with_services(Box::new(conn), Arc::new(MetadataServices::default())).await?;
    ctx.execute_batch(
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER,
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE tags (label TEXT);",
    )
    .await?;
    Ok(ctx)
}

fn person(name: &str, age: Option<i32>) -> Person {
    Person { id: 0, name: name.into(), age, active: true }
}

#[tokio::test]
async fn insert_reselects_the_generated_row() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    assert_eq!(ctx.provider().kind, ProviderKind::Sqlite);

    let alice = ctx.table::<Person>("people").insert(&person("alice", Some(31))).await?;
    let bob = ctx.table::<Person>("people").insert(&person("bob", None)).await?;
    assert_eq!(alice, Person { id: 1, name: "alice".into(), age: Some(31), active: true });
    assert_eq!(bob.id, 2);
    assert_eq!(bob.age, None);
    Ok(())
}

#[tokio::test]
async fn find_update_page_and_delete() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    for (name, age) in [("a", 1), ("b", 2), ("c", 3)] {
        ctx.table::<Person>("people").insert_only(&person(name, Some(age))).await?;
    }

    let mut b = ctx.table::<Person>("people").find(&2_i64).await?.ok_or("b missing")?;
    assert_eq!(b.name, "b");
    assert!(ctx.table::<Person>("people").find(&99_i64).await?.is_none());

    b.age = Some(40);
    b.active = false;
    assert_eq!(ctx.table::<Person>("people").update(&b).await?, 1);
    assert_eq!(ctx.table::<Person>("people").find(&2_i64).await?, Some(b.clone()));

    let page = ctx.table::<Person>("people").page(1, 1).await?;
    assert_eq!(page, vec![b.clone()]);

    assert_eq!(ctx.table::<Person>("people").delete(&b).await?, 1);
    let rest = ctx.table::<Person>("people").all().await?;
    assert_eq!(rest.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
    Ok(())
}

#[tokio::test]
async fn keyless_tables_refuse_record_inserts() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Debug, Default)]
    struct Tag {
        label: String,
    }
    sql_glue::record_shape!(Tag { label: String });

    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    let err = ctx
        .table::<Tag>("tags")
        .insert(&Tag { label: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, SqlGlueError::InvalidOperation(_)));

    let count = ctx.command().text("SELECT COUNT(*) FROM tags").scalar().await?;
    assert_eq!(count, Some(RowValues::Int(0)));

    assert_eq!(ctx.table::<Tag>("tags").insert_only(&Tag { label: "y".into() }).await?, 1);
    Ok(())
}

#[tokio::test]
async fn dynamic_rows_sanitize_names_and_keep_nulls() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    ctx.table::<Person>("people").insert_only(&person("zed", None)).await?;

    let rows = ctx
        .command()
        .text(r#"SELECT id, id AS ID, name AS "first name!", age, NULL AS "" FROM people"#)
        .query_dynamic()
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].names(), ["id", "Field_1", "firstname", "age", "Field_4"]);
    assert_eq!(rows[0].get("firstname"), Some(&RowValues::Text("zed".into())));
    assert_eq!(rows[0].get("age"), Some(&RowValues::Null));
    Ok(())
}

#[tokio::test]
async fn rolled_back_inserts_disappear() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;

    ctx.begin_transaction().await?;
    ctx.table::<Person>("people").insert_only(&person("ghost", None)).await?;
    ctx.command()
        .text("UPDATE people SET age = $age")
        .param("age", &7)
        .in_transaction()
        .execute()
        .await?;
    ctx.rollback().await?;

    let count = ctx.command().text("SELECT COUNT(*) FROM people").scalar().await?;
    assert_eq!(count, Some(RowValues::Int(0)));
    Ok(())
}

#[tokio::test]
async fn typed_parameters_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    ctx.command()
        .insert_into("people", &["name", "age", "active"])
        .param("name", "typed")
        .param("age", &Some(5_i32))
        .param_typed("active", "yes", DbType::Boolean, ParameterDirection::Input)
        .execute()
        .await?;

    let people: Vec<Person> = ctx
        .command()
        .select_from("people", &[])
        .where_equals(&["name"])
        .param("NAME", "typed")
        .query_as()
        .await?;
    assert_eq!(people, vec![Person { id: 1, name: "typed".into(), age: Some(5), active: true }]);
    Ok(())
}

#[tokio::test]
async fn insert_reselects_from_plain_rowid_tables() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Debug, Default, PartialEq)]
    struct Note {
        id: i64,
        body: String,
    }
    sql_glue::record_shape!(Note { id: i64, body: String });

    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    ctx.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);")
        .await?;

    let first = ctx.table::<Note>("notes").insert(&Note { id: 0, body: "one".into() }).await?;
    let second = ctx.table::<Note>("notes").insert(&Note { id: 0, body: "two".into() }).await?;
    assert_eq!(first, Note { id: 1, body: "one".into() });
    assert_eq!(second, Note { id: 2, body: "two".into() });
    assert!(!ctx.connection_mut().in_transaction());
    Ok(())
}

#[tokio::test]
async fn failed_reselect_rolls_the_insert_back() -> Result<(), Box<dyn std::error::Error>> {
    // `shout` is generated text, so reading it into an integer field fails after the insert
    #[derive(Debug, Default)]
    struct Loud {
        id: i64,
        word: String,
        shout: i64,
    }
    sql_glue::record_shape!(Loud { id: i64, word: String, shout: i64 });

    let dir = tempfile::tempdir()?;
    let mut ctx = people_db(&dir).await?;
    ctx.execute_batch(
        "CREATE TABLE loud (
            id INTEGER PRIMARY KEY,
            word TEXT NOT NULL,
            shout TEXT GENERATED ALWAYS AS (upper(word)) VIRTUAL
        );",
    )
    .await?;

    let err = ctx
        .table::<Loud>("loud")
        .insert(&Loud { id: 0, word: "hey".into(), shout: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, SqlGlueError::InvalidCast { ref field, .. } if field == "shout"));
    assert!(!ctx.connection_mut().in_transaction());

    let count = ctx.command().text("SELECT COUNT(*) FROM loud").scalar().await?;
    assert_eq!(count, Some(RowValues::Int(0)));
    Ok(())
}
