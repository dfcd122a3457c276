use super::*;
use crate::condition::Condition;
use crate::error::FluentError;
use crate::value::Value;

async fn try_connect() -> Option<tokio_postgres::Client> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&database_url, tokio_postgres::NoTls)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("tokio-postgres connection error: {e}");
        }
    });
    Some(client)
}

#[test]
fn builds_placeholders_in_order() {
    let mut q = sql("SELECT * FROM users WHERE a = ");
    q.push_bind(1).push(" AND b = ").push_bind("x");

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.sql(), "SELECT * FROM users WHERE a = $1 AND b = $2");
    assert_eq!(compiled.params(), &[Value::Int(1), Value::from("x")]);
    assert_eq!(compiled.params_ref().len(), 2);
}

#[test]
fn bind_fills_existing_markers() {
    let q = sql("SELECT * FROM users WHERE status = ? AND age > ?")
        .bind("active")
        .bind(18);
    assert_eq!(q.placeholder_count(), 2);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM users WHERE status = $1 AND age > $2"
    );
}

#[test]
fn push_escapes_question_marks() {
    let mut q = sql("SELECT '{\"a\": 1}'::jsonb ");
    q.push("? 'a' AND id = ").push_bind(3);

    assert_eq!(q.text(), "SELECT '{\"a\": 1}'::jsonb \\? 'a' AND id = ?");
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT '{\"a\": 1}'::jsonb ? 'a' AND id = $1"
    );
}

#[test]
fn can_compose_fragments() {
    let mut w = Sql::empty();
    w.push(" WHERE id = ").push_bind(42);

    let mut q = sql("SELECT * FROM users");
    q.push_sql(w);

    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM users WHERE id = $1");
    assert_eq!(q.params().len(), 1);
}

#[test]
fn bound_fragment_is_spliced() {
    let lower = sql("lower(?)").bind("Alice");
    let mut q = sql("SELECT id FROM users WHERE org = ");
    q.push_bind(7).push(" AND name = ").push_bind(lower);

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT id FROM users WHERE org = $1 AND name = lower($2)"
    );
    assert_eq!(compiled.params(), &[Value::Int(7), Value::from("Alice")]);
}

#[test]
fn bound_array_expands() {
    let q = sql("SELECT * FROM users WHERE id IN (?)").bind(vec![1, 2, 3]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM users WHERE id IN ($1, $2, $3)"
    );
}

#[test]
fn bound_empty_array_is_rejected() {
    let q = sql("SELECT * FROM users WHERE id IN (?)").bind(Vec::<i32>::new());
    assert!(matches!(
        q.compile(),
        Err(FluentError::EmptyArray { position: 1, .. })
    ));
}

#[test]
fn bind_list_renders_commas() {
    let mut q = sql("SELECT * FROM users WHERE id IN (");
    q.push_bind_list(vec![1, 2, 3]).push(")");
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM users WHERE id IN ($1, $2, $3)"
    );
    assert_eq!(q.params().len(), 3);
}

#[test]
fn bind_list_empty_is_valid_sql() {
    let mut q = sql("SELECT * FROM users WHERE id IN (");
    q.push_bind_list(Vec::<i32>::new()).push(")");
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM users WHERE id IN (NULL)");
    assert!(q.params().is_empty());
}

#[test]
fn missing_and_extra_params() {
    let q = sql("SELECT ? + ?").bind(1);
    match q.compile().unwrap_err() {
        FluentError::MissingParam { sql, position } => {
            assert_eq!(sql, "SELECT ? + ?");
            assert_eq!(position, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let q = sql("SELECT ?").bind(1).bind(2).bind(3);
    assert!(matches!(
        q.compile(),
        Err(FluentError::ExtraParam {
            placeholders: 1,
            unused: 2,
            ..
        })
    ));
}

#[test]
fn push_ident_accepts_simple_and_dotted() {
    let mut q = Sql::empty();
    q.push_ident("users").unwrap();
    q.push(", ");
    q.push_ident("public.users").unwrap();
    assert_eq!(q.to_sql().unwrap(), "users, public.users");
}

#[test]
fn push_ident_rejects_unsafe() {
    let mut q = Sql::empty();
    assert!(q.push_ident("users; drop table users; --").is_err());
    assert!(q.push_ident("1users").is_err());
    assert!(q.push_ident("users..name").is_err());
    assert!(q.push_ident("users name").is_err());
}

#[test]
fn can_append_condition_as_placeholders() {
    let mut c = Condition::default();
    c.add("id", 42_i64).unwrap();

    let mut q = sql("SELECT * FROM users WHERE ");
    q.push_condition(&c).unwrap();

    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM users WHERE id = $1");
    assert_eq!(q.params().len(), 1);
}

#[test]
fn condition_placeholders_compose_with_push_bind() {
    let mut c = Condition::default();
    c.add("b", "x").unwrap();

    let mut q = sql("SELECT * FROM users");
    q.push(" WHERE a = ").push_bind(1_i64);
    q.push(" AND ");
    q.push_condition(&c).unwrap();

    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM users WHERE a = $1 AND b = $2"
    );
}

#[test]
fn push_where_skips_blank_conditions() {
    let mut q = sql("SELECT * FROM users");
    q.push_where(&Condition::default()).unwrap();
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM users");

    let mut c = Condition::default();
    c.add("status", "active").unwrap();
    c.add("role", Value::array(["admin", "owner"])).unwrap();
    q.push_where(&c).unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM users WHERE (status = $1) AND (role IN ($2, $3))"
    );
}

#[test]
fn limit_offset_appends_both_params() {
    let mut q = sql("SELECT * FROM users ORDER BY id");
    q.limit_offset(10, 20);
    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2"
    );
    assert_eq!(compiled.params(), &[Value::Int(10), Value::Int(20)]);
}

#[test]
fn tag_is_kept_through_push_sql() {
    let mut q = Sql::empty();
    q.push_sql(sql("SELECT 1").tagged("health"));
    assert_eq!(q.tag_name(), Some("health"));

    q.tag("other");
    assert_eq!(q.tag_name(), Some("other"));
}

#[test]
fn compiled_query_serializes() {
    let compiled = sql("SELECT * FROM t WHERE a = ? AND b = ?")
        .bind(1)
        .bind(Value::Null)
        .compile()
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "sql": "SELECT * FROM t WHERE a = $1 AND b = $2",
            "params": [1, null]
        })
    );
    assert_eq!(compiled.to_string(), "SELECT * FROM t WHERE a = $1 AND b = $2");
}

#[test]
fn strips_comments_and_parens_before_keyword() {
    let s = strip_sql_prefix("  -- note\n/* x */ (( select 1))");
    assert!(starts_with_keyword(s, "SELECT"));
    assert!(!starts_with_keyword("UPDATE t", "SELECT"));
    assert_eq!(strip_sql_prefix("-- only a comment"), "");
}

#[tokio::test]
async fn fetch_one_multi_rows_returns_first_row() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let row = sql("SELECT n FROM (VALUES (1), (2)) AS t(n) ORDER BY n")
        .fetch_one(&client)
        .await
        .unwrap();
    let n: i32 = row.get(0);
    assert_eq!(n, 1);
}

#[tokio::test]
async fn fetch_one_strict_zero_rows_is_not_found() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let err = sql("SELECT 1 WHERE FALSE")
        .fetch_one_strict(&client)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn fetch_one_strict_multi_rows_is_too_many_rows() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let err = sql("SELECT n FROM (VALUES (1), (2)) AS t(n)")
        .fetch_one_strict(&client)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FluentError::TooManyRows {
            expected: 1,
            got: 2
        }
    ));
}

#[tokio::test]
async fn bound_params_reach_the_server() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let n: i64 = sql("SELECT ?::int8 + ?::int8")
        .bind(40)
        .bind(2)
        .fetch_scalar_one(&client)
        .await
        .unwrap();
    assert_eq!(n, 42);

    let found = sql("SELECT 1 WHERE 'x' = ?")
        .bind("x")
        .exists(&client)
        .await
        .unwrap();
    assert!(found);
}
