//! End-to-end builder scenarios through the public API. No database needed.

use pgfluent::{
    Combinator, Condition, ErrorKind, Expr, FluentError, JoinKind, Value, delete, insert, select,
    sql, update,
};

#[test]
fn simple_select() {
    let mut q = select();
    q.table("users")
        .unwrap()
        .select(["id", "name"])
        .where_("active", true)
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.sql(), "SELECT id, name FROM users WHERE active = $1");
    assert_eq!(compiled.params(), &[Value::Bool(true)]);
}

#[test]
fn join_with_and() {
    let mut q = select();
    q.select(["x.id"])
        .from_as("a", "x")
        .unwrap()
        .inner_join("b", "y", "x.id = y.a_id")
        .unwrap()
        .where_("x.status", "open")
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT x.id FROM a AS x INNER JOIN b AS y ON x.id = y.a_id WHERE x.status = $1"
    );
    assert_eq!(compiled.params(), &[Value::from("open")]);
}

#[test]
fn insert_multi_row() {
    let mut q = insert("t");
    q.rows([[("col", 1)], [("col", 2)]]).unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.sql(), "INSERT INTO t(col) VALUES($1), ($2)");
    assert_eq!(compiled.params(), &[Value::Int(1), Value::Int(2)]);
}

#[test]
fn missing_join_condition_fails_at_compile_time() {
    let mut q = select();
    q.select(["*"])
        .from("a")
        .unwrap()
        .join(JoinKind::Inner, "b", Some("y"), None)
        .unwrap();

    let err = q.compile().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compilation);
    assert!(matches!(err, FluentError::NoJoinConditions(ref alias) if alias == "y"));
}

#[test]
fn escaped_placeholder_is_kept_literally() {
    let mut q = select();
    q.select(["*"])
        .table("people")
        .unwrap()
        .where_(r"name ILIKE 'What\?'", ())
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT * FROM people WHERE name ILIKE 'What?'"
    );
    assert!(compiled.params().is_empty());
}

#[test]
fn positional_order_runs_through_sub_queries() {
    let mut sub = select();
    sub.select(["x"]).where_("y", 3).unwrap();

    let mut q = select();
    q.select([Expr::value(1)])
        .table("t")
        .unwrap()
        .where_("a", 2)
        .unwrap()
        .where_("b", sub)
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT $1 FROM t WHERE (a = $2) AND (b IN (SELECT x WHERE y = $3))"
    );
    assert_eq!(
        compiled.params(),
        &[Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn recompilation_is_idempotent() {
    let mut q = select();
    q.select(["id"])
        .table("events")
        .unwrap()
        .where_("kind", Value::array(["click", "view"]))
        .unwrap()
        .limit(50);

    let first = q.compile().unwrap();
    let second = q.compile().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.sql(),
        "SELECT id FROM events WHERE kind IN ($1, $2) LIMIT $3"
    );
}

#[test]
fn duplicate_alias_is_rejected_before_compilation() {
    let mut q = select();
    q.from_as("a", "t").unwrap();
    let err = q.from_as("b", "t").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(matches!(err, FluentError::DuplicateAlias(ref alias) if alias == "t"));
}

#[test]
fn single_child_branches_never_add_parentheses() {
    let inner = Condition::or(["a = 1"]);
    let middle = Condition::and([inner]);

    let mut q = select();
    q.select(["*"]).table("t").unwrap();
    q.where_(middle, ()).unwrap();
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM t WHERE a = 1");
}

#[test]
fn multi_child_branches_parenthesize_every_leaf() {
    let mut either = Condition::new(Combinator::Or);
    either.add("a", 1).unwrap().add("b IS NULL", ()).unwrap();

    let mut q = select();
    q.select(["*"]).table("t").unwrap();
    q.where_(either, ()).unwrap();
    q.where_("c", None::<i64>).unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT * FROM t WHERE ((a = $1) OR (b IS NULL)) AND (c IS NULL)"
    );
    // The NULL comparison contributes no parameter.
    assert_eq!(compiled.params(), &[Value::Int(1)]);
}

#[test]
fn update_with_sql_expression_and_returning() {
    let mut q = update("accounts");
    q.set("balance", sql("balance - ?").bind(25_i64))
        .unwrap()
        .where_("id", 9_i64)
        .unwrap()
        .returning(["balance"]);

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "UPDATE accounts SET balance = balance - $1 WHERE id = $2 RETURNING balance"
    );
    assert_eq!(compiled.params(), &[Value::Int(25), Value::Int(9)]);
}

#[test]
fn delete_with_or_cursor() {
    let mut q = delete("sessions");
    q.where_or()
        .add("expires_at < now()", ())
        .unwrap()
        .add("user_id", Value::array([4, 5]))
        .unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.sql(),
        "DELETE FROM sessions WHERE (expires_at < now()) OR (user_id IN ($1, $2))"
    );
}

#[test]
fn empty_array_fails_fast() {
    let mut q = select();
    q.select(["*"])
        .table("t")
        .unwrap()
        .where_("id", Value::array(Vec::<i64>::new()))
        .unwrap();

    let err = q.compile().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Placeholder);
    assert!(matches!(err, FluentError::EmptyArray { .. }));
}

#[test]
fn compiled_query_is_plain_data() {
    let mut q = select();
    q.select(["id"]).table("t").unwrap().where_("a", "x").unwrap();

    let json = serde_json::to_value(q.compile().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "sql": "SELECT id FROM t WHERE a = $1", "params": ["x"] })
    );
}
