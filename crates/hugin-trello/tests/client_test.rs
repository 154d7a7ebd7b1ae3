// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! TrelloClient against a mocked REST API.

use chrono::{TimeZone, Utc};
use hugin_core::{BoardError, BoardRef, BoardService, Card, Description, ListRef, SortKey};
use hugin_trello::{TrelloClient, TrelloConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TrelloClient {
    TrelloClient::new(TrelloConfig::new("the-key", "the-token").with_api_url(server.uri())).unwrap()
}

fn board() -> BoardRef {
    BoardRef {
        id: "b1".into(),
        name: "Runs".into(),
    }
}

fn list(id: &str, name: &str) -> ListRef {
    ListRef {
        id: id.into(),
        name: name.into(),
        board_id: "b1".into(),
    }
}

fn card(id: &str, name: &str, list: ListRef) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        board_id: "b1".into(),
        list,
        description: String::new(),
        due: None,
        closed: false,
        members: Vec::new(),
    }
}

#[tokio::test]
async fn test_find_board_sends_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/members/me/boards"))
        .and(query_param("key", "the-key"))
        .and(query_param("token", "the-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "b0", "name": "Projects", "closed": false},
            {"id": "b1", "name": "Runs", "closed": false}
        ])))
        .mount(&server)
        .await;

    let client = client(&server);
    let found = client.find_board("Runs").await.unwrap();
    assert_eq!(found, Some(board()));
    assert_eq!(client.find_board("Missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_get_or_create_list_creates_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/boards/b1/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "l1", "name": "Sequencing", "idBoard": "b1", "closed": false, "pos": 1}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/lists"))
        .and(body_partial_json(json!({"name": "Jan 2012", "idBoard": "b1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            {"id": "l9", "name": "Jan 2012", "idBoard": "b1", "closed": false, "pos": 9}
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let existing = client.get_or_create_list(&board(), "Sequencing").await.unwrap();
    assert_eq!(existing.id, "l1");

    let created = client.get_or_create_list(&board(), "Jan 2012").await.unwrap();
    assert_eq!(created, list("l9", "Jan 2012"));
}

#[tokio::test]
async fn test_get_card_by_name_prefers_open_card() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/boards/b1/cards/all"))
        .and(query_param("members", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "old", "name": "RUN", "closed": true, "idList": "l1", "idBoard": "b1", "due": null},
            {"id": "new", "name": "RUN", "closed": false, "idList": "l2", "idBoard": "b1",
             "desc": "- Setup: 2x101", "due": "2012-01-06T15:00:00.000Z",
             "members": [{"id": "m1", "username": "alice"}]},
            {"id": "other", "name": "OTHER", "closed": false, "idList": "l1", "idBoard": "b1"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/boards/b1/lists"))
        .and(query_param("filter", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "l1", "name": "Sequencing", "idBoard": "b1"},
            {"id": "l2", "name": "First read", "idBoard": "b1"}
        ])))
        .mount(&server)
        .await;

    let found = client(&server)
        .get_card_by_name(&board(), "RUN")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "new");
    assert_eq!(found.list.name, "First read");
    assert_eq!(found.members, vec!["alice"]);
    assert_eq!(found.metadata().get_joined("Setup").as_deref(), Some("2x101"));
    assert_eq!(found.due, Some(Utc.with_ymd_and_hms(2012, 1, 6, 15, 0, 0).unwrap()));
}

#[tokio::test]
async fn test_get_card_by_name_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/boards/b1/cards/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let found = client(&server).get_card_by_name(&board(), "RUN").await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_create_card_sends_encoded_description() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cards"))
        .and(body_partial_json(json!({
            "idList": "l1",
            "name": "RUN",
            "desc": "- Setup: 2x101"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            {"id": "c1", "name": "RUN", "desc": "- Setup: 2x101", "idList": "l1", "idBoard": "b1"}
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut description = Description::default();
    description.insert("Setup", "2x101");

    let created = client(&server)
        .create_card(&list("l1", "Sequencing"), "RUN", &description)
        .await
        .unwrap();
    assert_eq!(created.id, "c1");
    assert_eq!(created.list.name, "Sequencing");
}

#[tokio::test]
async fn test_set_due_uses_millisecond_utc() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cards/c1"))
        .and(body_partial_json(json!({"due": "2012-01-06T15:00:00.000Z"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
        .expect(1)
        .mount(&server)
        .await;

    let target = card("c1", "RUN", list("l1", "Sequencing"));
    client(&server)
        .set_due(&target, Utc.with_ymd_and_hms(2012, 1, 6, 15, 0, 0).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_errors_map_to_board_errors() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cards/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("The requested resource was not found."))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/cards/locked"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let client = client(&server);
    let sequencing = list("l1", "Sequencing");

    let err = client
        .set_closed(&card("gone", "RUN", sequencing.clone()), true)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::NotFound(_)));

    let err = client
        .add_comment(&card("locked", "RUN", sequencing.clone()), "hello")
        .await;
    // comments go through POST, so the PUT mock does not match and wiremock answers 404
    assert!(matches!(err, Err(BoardError::NotFound(_))));

    let err = client
        .set_closed(&card("locked", "RUN", sequencing), true)
        .await
        .unwrap_err();
    match err {
        BoardError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sort_cards_only_writes_when_out_of_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists/sorted/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "name": "A.Adams_12_01", "idList": "sorted", "idBoard": "b1", "pos": 1},
            {"id": "b", "name": "B.Brown_12_01", "idList": "sorted", "idBoard": "b1", "pos": 2}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lists/mixed/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "s", "name": "A.Smith_12_01", "idList": "mixed", "idBoard": "b1", "pos": 1},
            {"id": "d", "name": "Z.Doe_12_01", "idList": "mixed", "idBoard": "b1", "pos": 2}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/cards/d"))
        .and(body_partial_json(json!({"pos": 1024.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/cards/s"))
        .and(body_partial_json(json!({"pos": 2048.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client
        .sort_cards_in_list(&list("sorted", "Handed over"), SortKey::LastName)
        .await
        .unwrap();
    client
        .sort_cards_in_list(&list("mixed", "Handed over"), SortKey::LastName)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_change_board_copies_then_closes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cards"))
        .and(body_partial_json(json!({
            "idList": "p1",
            "idCardSource": "c1",
            "keepFromSource": "all"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            {"id": "copy", "name": "RUN", "idList": "p1", "idBoard": "b2", "desc": "- Setup: 2x101"}
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/cards/c1"))
        .and(body_partial_json(json!({"closed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
        .expect(1)
        .mount(&server)
        .await;

    let target_board = BoardRef {
        id: "b2".into(),
        name: "Projects".into(),
    };
    let target_list = ListRef {
        id: "p1".into(),
        name: "bcbb analysis".into(),
        board_id: "b2".into(),
    };
    let source = card("c1", "RUN", list("l1", "Handed over"));

    let copy = client(&server)
        .change_board(&source, &target_board, &target_list)
        .await
        .unwrap();
    assert_eq!(copy.id, "copy");
    assert_eq!(copy.board_id, "b2");
    assert_eq!(copy.list, target_list);
}
