// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use hugin_core::{BoardService, Description, InMemoryBoard, SortKey, XmlMetadataReader};
use hugin_monitor::{DryRunBoard, MonitorConfig, RunMonitor};
use tempfile::TempDir;

use common::{HOST, PAIRED_INDEXED, recording_notifier, touch, write_run};

#[tokio::test]
async fn test_dry_run_pass_leaves_board_untouched() {
    let data = TempDir::new().unwrap();
    write_run(data.path(), "120106_SN12345_0144_AABC123CXX", PAIRED_INDEXED, "HighOutput");
    let stalled = write_run(data.path(), "120107_SN12345_0145_BDEF456CXX", PAIRED_INDEXED, "HighOutput");
    touch(
        &stalled.join("Basecalling_Netcopy_complete_Read1.txt"),
        Utc::now() - Duration::days(3),
    );

    let inner = InMemoryBoard::with_boards(&["Runs"]).await;
    inner
        .seed_card("Runs", "Sequencing", "120107_SN12345_0145_BDEF456CXX", "", None)
        .await;
    let config = MonitorConfig::default()
        .with_run_folders([data.path()])
        .with_run_board("Runs")
        .with_host(HOST);
    let (sink, notifier) = recording_notifier();
    let monitor = RunMonitor::new(
        Arc::new(config),
        Arc::new(DryRunBoard::new(inner.clone())),
        Arc::new(XmlMetadataReader),
        notifier,
    );

    let summary = monitor.run_pass(Utc::now()).await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.failed, 0);

    assert!(inner.mutations().await.is_empty());
    assert!(inner.comments("120107_SN12345_0145_BDEF456CXX").await.is_empty());
    assert_eq!(
        inner.card_names("Runs", "Sequencing").await,
        vec!["120107_SN12345_0145_BDEF456CXX"]
    );
    // notifications are not board mutations and still go out
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn test_dry_run_placeholders() {
    let inner = InMemoryBoard::with_boards(&["Runs"]).await;
    let board = DryRunBoard::new(inner.clone());
    let runs = board.find_board("Runs").await.unwrap().unwrap();

    let list = board.get_or_create_list(&runs, "Processing").await.unwrap();
    assert!(list.id.starts_with("dry-run-"));
    assert!(board.list_cards(&list).await.unwrap().is_empty());

    let card = board
        .create_card(&list, "run-a", &Description::new())
        .await
        .unwrap();
    assert_eq!(card.list, list);
    board.sort_cards_in_list(&list, SortKey::Alphabetical).await.unwrap();

    assert!(board.into_inner().mutations().await.is_empty());
    assert!(inner.list_names("Runs").await.is_empty());
}
