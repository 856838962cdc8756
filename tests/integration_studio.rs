use rusqlite::Connection;
use serde_json::json;
use sql_studio_desktop_lib::models::{
    CellPhase, ColumnMetadata, ConnectSqlitePayload, DismissalDuration, ExecuteQueryPayload, ForeignKeyRef,
    MountForeignKeyCellPayload, RecordDismissedPayload, UpgradeTrigger,
};
use sql_studio_desktop_lib::notices::Notice;
use sql_studio_desktop_lib::StudioCore;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

fn seed_shop(path: &Path) {
    let conn = Connection::open(path).expect("open shop");
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE orders (
           id INTEGER PRIMARY KEY,
           customer_id INTEGER REFERENCES customers(id),
           customer_name TEXT
         );
         INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'O''Brien');
         INSERT INTO orders (id, customer_id, customer_name) VALUES (10, 1, 'Ada'), (11, 2, 'O''Brien');",
    )
    .expect("seed shop");
}

fn order_metadata() -> Vec<ColumnMetadata> {
    vec![
        ColumnMetadata {
            name: "id".to_string(),
            result_name: None,
            foreign_key: None,
        },
        ColumnMetadata {
            name: "customer_id".to_string(),
            result_name: Some("Buyer".to_string()),
            foreign_key: Some(ForeignKeyRef {
                table: "customers".to_string(),
                column: "id".to_string(),
                schema: None,
            }),
        },
        ColumnMetadata {
            name: "customer_name".to_string(),
            result_name: None,
            foreign_key: Some(ForeignKeyRef {
                table: "customers".to_string(),
                column: "name".to_string(),
                schema: None,
            }),
        },
    ]
}

fn mount(cell_key: &str, field_key: &str, value: serde_json::Value) -> MountForeignKeyCellPayload {
    MountForeignKeyCellPayload {
        cell_key: cell_key.to_string(),
        field_key: field_key.to_string(),
        value,
        metadata: order_metadata(),
        connection_id: Some("closed-session-from-an-old-render".to_string()),
    }
}

#[tokio::test]
async fn expanding_a_foreign_key_cell_loads_the_referenced_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = dir.path().join("shop.sqlite");
    seed_shop(&shop);

    let (sender, _notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(dir.path().join("app"), Arc::new(sender)).expect("core");
    core.connect_sqlite(ConnectSqlitePayload {
        name: "shop".to_string(),
        path: shop.to_string_lossy().to_string(),
    })
    .await
    .expect("connect");

    let mounted = core.mount_foreign_key_cell(mount("10:buyer", "buyer", json!(1))).await;
    assert_eq!(mounted.phase, CellPhase::Collapsed);
    assert_eq!(mounted.foreign_key.as_ref().map(|fk| fk.table.as_str()), Some("customers"));

    let expanded = core.toggle_foreign_key_cell("10:buyer").await.expect("toggle");
    assert_eq!(expanded.phase, CellPhase::Loaded);
    let data = expanded.data.expect("data");
    assert_eq!(data.columns, vec!["id", "name"]);
    assert_eq!(data.total_count, Some(1));
    assert_eq!(data.related_rows.len(), 1);
    assert_eq!(data.related_rows[0].get("name"), Some(&json!("Ada")));

    let collapsed = core.toggle_foreign_key_cell("10:buyer").await.expect("collapse");
    assert_eq!(collapsed.phase, CellPhase::Collapsed);
    assert!(collapsed.data.is_some());
}

#[tokio::test]
async fn quoted_text_values_match_their_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = dir.path().join("shop.sqlite");
    seed_shop(&shop);

    let (sender, _notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(dir.path().join("app"), Arc::new(sender)).expect("core");
    core.connect_sqlite(ConnectSqlitePayload {
        name: "shop".to_string(),
        path: shop.to_string_lossy().to_string(),
    })
    .await
    .expect("connect");

    core.mount_foreign_key_cell(mount("11:name", "CUSTOMER_NAME", json!("O'Brien"))).await;
    let expanded = core.toggle_foreign_key_cell("11:name").await.expect("toggle");
    let data = expanded.data.expect("data");
    assert!(data.error.is_none(), "unexpected error: {:?}", data.error);
    assert_eq!(data.related_rows[0].get("id"), Some(&json!(2)));
}

#[tokio::test]
async fn missing_tables_are_reported_on_the_cell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = dir.path().join("shop.sqlite");
    seed_shop(&shop);

    let (sender, mut notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(dir.path().join("app"), Arc::new(sender)).expect("core");
    core.connect_sqlite(ConnectSqlitePayload {
        name: "shop".to_string(),
        path: shop.to_string_lossy().to_string(),
    })
    .await
    .expect("connect");

    let mut payload = mount("x", "ghost", json!(1));
    payload.metadata.push(ColumnMetadata {
        name: "ghost".to_string(),
        result_name: None,
        foreign_key: Some(ForeignKeyRef {
            table: "ghosts".to_string(),
            column: "id".to_string(),
            schema: None,
        }),
    });
    core.mount_foreign_key_cell(payload).await;
    let expanded = core.toggle_foreign_key_cell("x").await.expect("toggle");
    assert_eq!(expanded.phase, CellPhase::Errored);
    assert!(expanded.data.expect("data").error.expect("error").contains("no such table"));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn disconnected_studio_reports_no_active_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = dir.path().join("shop.sqlite");
    seed_shop(&shop);

    let (sender, mut notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(dir.path().join("app"), Arc::new(sender)).expect("core");
    let connection = core
        .connect_sqlite(ConnectSqlitePayload {
            name: "shop".to_string(),
            path: shop.to_string_lossy().to_string(),
        })
        .await
        .expect("connect");
    core.disconnect(&connection.id).await.expect("disconnect");

    core.mount_foreign_key_cell(mount("10:buyer", "buyer", json!(1))).await;
    let expanded = core.toggle_foreign_key_cell("10:buyer").await.expect("toggle");
    assert_eq!(expanded.phase, CellPhase::Unavailable);
    assert!(expanded.data.is_none());
    assert_eq!(notices.try_recv().expect("notice").title, "No active connection");

    // A fresh connection lets the same cell load after collapsing and re-expanding.
    core.connect_sqlite(ConnectSqlitePayload {
        name: "shop again".to_string(),
        path: shop.to_string_lossy().to_string(),
    })
    .await
    .expect("reconnect");
    core.toggle_foreign_key_cell("10:buyer").await.expect("collapse");
    let expanded = core.toggle_foreign_key_cell("10:buyer").await.expect("expand");
    assert_eq!(expanded.phase, CellPhase::Loaded);
}

#[tokio::test]
async fn execute_query_uses_default_limit_when_unset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = dir.path().join("shop.sqlite");
    seed_shop(&shop);

    let (sender, _notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(dir.path().join("app"), Arc::new(sender)).expect("core");
    let connection = core
        .connect_sqlite(ConnectSqlitePayload {
            name: "shop".to_string(),
            path: shop.to_string_lossy().to_string(),
        })
        .await
        .expect("connect");
    assert_eq!(core.list_connections().await.len(), 1);

    let result = core
        .execute_query(ExecuteQueryPayload {
            session_id: connection.session_id.clone(),
            query: "SELECT id FROM orders ORDER BY id".to_string(),
            limit: Some(0),
        })
        .await
        .expect("execute");
    assert!(result.success);
    assert_eq!(result.data.expect("data").rows, vec![vec![json!(10)], vec![json!(11)]]);

    let limited = core
        .execute_query(ExecuteQueryPayload {
            session_id: connection.session_id,
            query: "SELECT id FROM orders ORDER BY id".to_string(),
            limit: Some(1),
        })
        .await
        .expect("execute");
    assert_eq!(limited.data.expect("data").rows.len(), 1);
}

#[tokio::test]
async fn upgrade_prompt_state_persists_across_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app_dir = dir.path().join("app");
    {
        let (sender, _notices) = mpsc::unbounded_channel::<Notice>();
        let core = StudioCore::new(app_dir.clone(), Arc::new(sender)).expect("core");
        assert!(core.should_show_upgrade_prompt(UpgradeTrigger::Export).expect("check"));
        core.record_upgrade_prompt_shown(UpgradeTrigger::Export).expect("shown");
        core.record_upgrade_prompt_dismissed(RecordDismissedPayload {
            trigger: UpgradeTrigger::MultiDevice,
            duration: Some(DismissalDuration::Permanent),
        })
        .expect("dismissed");
    }

    let (sender, _notices) = mpsc::unbounded_channel::<Notice>();
    let core = StudioCore::new(app_dir, Arc::new(sender)).expect("reopen");
    assert!(!core.should_show_upgrade_prompt(UpgradeTrigger::Export).expect("check"));
    assert!(!core.should_show_upgrade_prompt(UpgradeTrigger::MultiDevice).expect("check"));

    let metrics = core.upgrade_prompt_metrics().expect("metrics");
    assert_eq!(metrics.total_shown, 1);
    assert_eq!(metrics.total_dismissed, 1);
    assert!((metrics.dismiss_rate - 1.0).abs() < f64::EPSILON);

    core.clear_upgrade_prompt_dismissals().expect("clear");
    assert!(core.should_show_upgrade_prompt(UpgradeTrigger::MultiDevice).expect("check"));
    assert!(!core.should_show_upgrade_prompt(UpgradeTrigger::Export).expect("check"));

    core.reset_upgrade_prompt_history().expect("reset");
    for trigger in UpgradeTrigger::ALL {
        assert!(core.should_show_upgrade_prompt(trigger).expect("check"));
    }
}
