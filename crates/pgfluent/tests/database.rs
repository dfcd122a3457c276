//! Builder statements against a live database.
//!
//! Set `DATABASE_URL` (or put it in `.env`) to run these; without it every
//! test returns early.

use futures_core::Stream;
use pgfluent::{
    FluentError, FluentResult, FromRow, GenericClient, InstrumentedClient, MonitorConfig, RowExt,
    StatsMonitor, TransactionExt, Value, delete, insert, select, sql, update,
};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Row;

async fn try_connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
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

async fn create_accounts(client: &tokio_postgres::Client) {
    client
        .batch_execute(
            "CREATE TEMP TABLE accounts (
                id BIGSERIAL PRIMARY KEY,
                owner TEXT NOT NULL UNIQUE,
                balance BIGINT NOT NULL DEFAULT 0,
                active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        )
        .await
        .unwrap();
}

#[derive(Debug, PartialEq)]
struct Account {
    id: i64,
    owner: String,
    balance: i64,
}

impl FromRow for Account {
    fn from_row(row: &Row) -> FluentResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            owner: row.try_get_column("owner")?,
            balance: row.try_get_column("balance")?,
        })
    }
}

async fn count_owner(client: &impl GenericClient, owner: &str) -> i64 {
    let mut q = select();
    q.select(["count(*)"])
        .table("accounts")
        .unwrap()
        .where_("owner", owner)
        .unwrap();
    q.fetch_scalar_one(client).await.unwrap()
}

#[tokio::test]
async fn crud_round_trip() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    create_accounts(&client).await;

    let mut q = insert("accounts");
    q.rows([
        [("owner", Value::from("ann")), ("balance", Value::from(100_i64))],
        [("owner", Value::from("bob")), ("balance", Value::from(50_i64))],
    ])
    .unwrap()
    .returning(["id", "owner", "balance"]);
    let created: Vec<Account> = q.fetch_all_as(&client).await.unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].owner, "ann");

    let mut q = select();
    q.select(["id", "owner", "balance"])
        .table("accounts")
        .unwrap()
        .where_("balance >= ?", 60_i64)
        .unwrap()
        .where_("active", true)
        .unwrap()
        .order_by(["id"]);
    let rich: Vec<Account> = q.fetch_all_as(&client).await.unwrap();
    assert_eq!(rich, vec![Account { id: created[0].id, owner: "ann".into(), balance: 100 }]);

    let mut q = update("accounts");
    q.set("balance", sql("balance + ?").bind(5_i64))
        .unwrap()
        .where_("owner", Value::array(["ann", "bob"]))
        .unwrap();
    assert_eq!(q.execute(&client).await.unwrap(), 2);

    let mut stmt = delete("accounts").bind_to(&client);
    stmt.query_mut().unwrap().where_("owner", "bob").unwrap();
    assert_eq!(stmt.execute().await.unwrap(), 1);
    assert!(matches!(
        stmt.query_mut(),
        Err(FluentError::CantMutateAfterExecute)
    ));

    let mut q = select();
    q.select(["id", "owner", "balance"]).table("accounts").unwrap();
    let only: Account = q.fetch_one_as(&client).await.unwrap();
    assert_eq!(only.balance, 105);
}

#[tokio::test]
async fn tuples_map_by_position() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut q = select();
    q.select([sql("?::int8").bind(7_i64), sql("?::text").bind("seven")]);
    let (n, word): (i64, String) = q.fetch_one_as(&client).await.unwrap();
    assert_eq!((n, word.as_str()), (7, "seven"));
}

#[tokio::test]
async fn unique_violation_is_classified() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    create_accounts(&client).await;

    let mut q = insert("accounts");
    q.values([("owner", "dup")]).unwrap();
    q.execute(&client).await.unwrap();

    let err = q.execute(&client).await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn driver_errors_carry_the_statement() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut q = select();
    q.select(["*"])
        .table("no_such_table")
        .unwrap()
        .where_("id", 1)
        .unwrap();
    match q.fetch_all(&client).await.unwrap_err() {
        FluentError::QueryFailed { sql, params, .. } => {
            assert_eq!(sql, "SELECT * FROM no_such_table WHERE id = $1");
            assert_eq!(params, vec![Value::Int(1)]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

async fn insert_then_fail(client: &mut tokio_postgres::Client) -> FluentResult<()> {
    pgfluent::transaction!(client, tx, {
        let mut q = insert("accounts");
        q.values([("owner", "carol")])?;
        q.execute(&tx).await?;
        Err::<(), FluentError>(FluentError::not_found("abort"))
    })
}

async fn insert_and_commit(client: &mut tokio_postgres::Client) -> FluentResult<u64> {
    pgfluent::transaction!(client, tx, {
        let mut q = insert("accounts");
        q.values([("owner", "dave")])?;
        let n = q.execute(&tx).await?;
        Ok::<u64, FluentError>(n)
    })
}

#[tokio::test]
async fn transaction_macro_commits_and_rolls_back() {
    let Some(mut client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    create_accounts(&client).await;

    let err = insert_then_fail(&mut client).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(count_owner(&client, "carol").await, 0);

    assert_eq!(insert_and_commit(&mut client).await.unwrap(), 1);
    assert_eq!(count_owner(&client, "dave").await, 1);
}

async fn nested_work(client: &mut tokio_postgres::Client) -> FluentResult<()> {
    pgfluent::transaction!(client, tx, {
        let mut q = insert("accounts");
        q.values([("owner", "erin")])?;
        q.execute(&tx).await?;

        let inner: FluentResult<()> = pgfluent::savepoint!(tx, "before_frank", sp, {
            let mut q = insert("accounts");
            q.values([("owner", "frank")])?;
            q.execute(&sp).await?;
            Err::<(), FluentError>(FluentError::not_found("frank rejected"))
        });
        assert!(inner.is_err());

        let sp = tx.open_savepoint_anon().await?;
        assert!(sp.name().starts_with("pgfluent_sp_"));
        let mut q = insert("accounts");
        q.values([("owner", "gail")])?;
        q.execute(&sp).await?;
        sp.release().await?;

        Ok::<(), FluentError>(())
    })
}

#[tokio::test]
async fn savepoints_roll_back_independently() {
    let Some(mut client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    create_accounts(&client).await;

    nested_work(&mut client).await.unwrap();
    assert_eq!(count_owner(&client, "erin").await, 1);
    assert_eq!(count_owner(&client, "frank").await, 0);
    assert_eq!(count_owner(&client, "gail").await, 1);
}

#[tokio::test]
async fn instrumented_client_times_out() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let stats = Arc::new(StatsMonitor::new());
    let instrumented = InstrumentedClient::new(&client)
        .with_config(MonitorConfig::new().with_query_timeout(Duration::from_millis(50)))
        .with_monitor_arc(stats.clone());

    let n: i64 = sql("SELECT ?::int8").bind(1_i64).fetch_scalar_one(&instrumented).await.unwrap();
    assert_eq!(n, 1);

    let err = instrumented
        .query("SELECT pg_sleep(2)", &[])
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let stats = stats.stats();
    assert_eq!(stats.total_queries, 2);
    assert_eq!(stats.timed_out_queries, 1);
}

#[tokio::test]
async fn rows_can_be_streamed() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut q = select();
    q.select(["n"])
        .table_as(sql("generate_series(1, ?::int8)").bind(5_i64), "n")
        .unwrap();

    let mut stream = q.stream(&client).await.unwrap();
    let mut total = 0_i64;
    while let Some(row) =
        std::future::poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await
    {
        let n: i64 = row.unwrap().try_get_index(0).unwrap();
        total += n;
    }
    assert_eq!(total, 15);
}
