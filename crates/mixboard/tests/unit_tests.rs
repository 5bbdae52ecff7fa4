//! Unit tests for mixboard

use chrono::{TimeZone, Utc};
use mixboard::{
    Board, ConnectionManager, ConnectionState, DecodeError, Error, ItemType, MemoryStorage,
    NewRequest, PushMessage, Request, RequestStorage, SendFailure, ValidationError,
    ViewerConnection,
};
use std::collections::HashSet;
use uuid::Uuid;

fn candidate(name: &str, adjustment: i64) -> NewRequest {
    NewRequest::new(name, ItemType::Instrument, "Keys", adjustment)
}

fn request_at(millis: i64) -> Request {
    Request {
        id: Uuid::new_v4(),
        requester_name: "Ana".to_string(),
        item_type: ItemType::Singer,
        item_name: "Lead vocal".to_string(),
        adjustment: 2,
        timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
    }
}

fn new_board() -> Board<MemoryStorage> {
    Board::new(MemoryStorage::new(), ConnectionManager::default())
}

// ============== Validation Tests ==============

#[test]
fn test_validate_accepts_range_edges() {
    assert!(candidate("Ana", -12).validate().is_ok());
    assert!(candidate("Ana", 12).validate().is_ok());
    assert!(candidate("Ana", 1).validate().is_ok());
}

#[test]
fn test_validate_rejects_zero() {
    assert_eq!(candidate("Ana", 0).validate(), Err(ValidationError::ZeroAdjustment));
}

#[test]
fn test_validate_rejects_out_of_range() {
    let err = candidate("Ana", 13).validate().unwrap_err();
    assert!(matches!(err, ValidationError::AdjustmentOutOfRange { value: 13, .. }));
    assert!(err.to_string().contains("between -12 and 12"));

    let err = candidate("Ana", -100).validate().unwrap_err();
    assert!(matches!(err, ValidationError::AdjustmentOutOfRange { value: -100, .. }));
}

#[test]
fn test_validate_rejects_blank_name() {
    assert_eq!(candidate("   ", 3).validate(), Err(ValidationError::EmptyRequesterName));
}

#[test]
fn test_validate_rejects_unknown_item_type() {
    let mut c = candidate("Ana", 3);
    c.item_type = "drummer".to_string();
    assert_eq!(
        c.validate(),
        Err(ValidationError::UnknownItemType("drummer".to_string()))
    );
}

// ============== Wire Format Tests ==============

#[test]
fn test_request_json_shape() {
    let json = serde_json::to_value(request_at(1_714_594_503_123)).unwrap();
    assert_eq!(json["requesterName"], "Ana");
    assert_eq!(json["itemType"], "singer");
    assert_eq!(json["itemName"], "Lead vocal");
    assert_eq!(json["adjustment"], 2);
    assert_eq!(json["timestamp"], "2024-05-01T20:15:03.123Z");
}

#[test]
fn test_new_request_from_client_json() {
    let body = r#"{"requesterName":"Ben","itemType":"instrument","itemName":"Bass","adjustment":-4}"#;
    let c: NewRequest = serde_json::from_str(body).unwrap();
    assert_eq!(c.validate(), Ok((ItemType::Instrument, -4)));
}

#[test]
fn test_push_message_tags() {
    let clear = PushMessage::Clear.encode();
    assert_eq!(clear, r#"{"type":"clear"}"#);

    let new = PushMessage::NewRequest { request: request_at(0) };
    let json: serde_json::Value = serde_json::from_str(&new.encode()).unwrap();
    assert_eq!(json["type"], "new-request");
    assert_eq!(json["request"]["timestamp"], "1970-01-01T00:00:00.000Z");

    let initial = PushMessage::Initial { requests: vec![] };
    assert_eq!(initial.kind(), "initial");
}

#[test]
fn test_decode_initial_with_offset_timestamp() {
    let raw = format!(
        r#"{{"type":"initial","requests":[{{"id":"{}","requesterName":"Ana","itemType":"singer","itemName":"Lead","adjustment":5,"timestamp":"2024-05-01T22:15:03.123+02:00"}}]}}"#,
        Uuid::new_v4()
    );
    match PushMessage::decode(raw.as_bytes()).unwrap() {
        PushMessage::Initial { requests } => {
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].timestamp.timestamp_millis(), 1_714_594_503_123);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn test_decode_rejects_unknown_type() {
    let err = PushMessage::decode(br#"{"type":"update","request":{}}"#).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "update"));
}

#[test]
fn test_decode_rejects_missing_type() {
    assert!(matches!(
        PushMessage::decode(br#"{"requests":[]}"#),
        Err(DecodeError::MissingType)
    ));
    assert!(matches!(PushMessage::decode(b"[1,2]"), Err(DecodeError::MissingType)));
}

#[test]
fn test_decode_rejects_garbage_and_bad_payload() {
    assert!(matches!(PushMessage::decode(b"not json"), Err(DecodeError::Malformed(_))));

    let err = PushMessage::decode(br#"{"type":"new-request"}"#).unwrap_err();
    assert!(matches!(err, DecodeError::Invalid { ref kind, .. } if kind == "new-request"));

    let err = PushMessage::decode(
        br#"{"type":"initial","requests":[{"id":"x","timestamp":1700000000}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::Invalid { .. }));
}

// ============== MemoryStorage Tests ==============

#[tokio::test]
async fn test_memory_storage_unique_ids() {
    let storage = MemoryStorage::new();
    let mut ids = HashSet::new();
    for i in 1..=12 {
        let request = storage.append(candidate("Ana", i)).await.unwrap();
        assert!(ids.insert(request.id));
    }
    assert_eq!(storage.len().await.unwrap(), 12);
}

#[tokio::test]
async fn test_memory_storage_rejects_without_storing() {
    let storage = MemoryStorage::new();
    storage.append(candidate("Ana", 2)).await.unwrap();

    for bad in [0, 13, -13] {
        let err = storage.append(candidate("Ana", bad)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
    assert_eq!(storage.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_memory_storage_newest_first() {
    let storage = MemoryStorage::new();
    let r1 = request_at(1);
    let r2 = request_at(2);
    let r3 = request_at(3);

    // Insert out of order; ordering follows timestamps
    storage.insert(r2.clone()).await.unwrap();
    storage.insert(r3.clone()).await.unwrap();
    storage.insert(r1.clone()).await.unwrap();

    let ids: Vec<Uuid> = storage.list_all().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![r3.id, r2.id, r1.id]);
}

#[tokio::test]
async fn test_memory_storage_equal_timestamps_follow_insertion() {
    let storage = MemoryStorage::new();
    let a = request_at(5);
    let b = request_at(5);
    storage.insert(a.clone()).await.unwrap();
    storage.insert(b.clone()).await.unwrap();

    let ids: Vec<Uuid> = storage.list_all().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn test_memory_storage_clear() {
    let storage = MemoryStorage::new();
    storage.append(candidate("Ana", 1)).await.unwrap();
    storage.append(candidate("Ben", -1)).await.unwrap();

    storage.clear().await.unwrap();
    assert!(storage.list_all().await.unwrap().is_empty());

    // Clearing an empty store is fine
    storage.clear().await.unwrap();
    assert_eq!(storage.len().await.unwrap(), 0);
}

// ============== ViewerConnection Tests ==============

#[tokio::test]
async fn test_viewer_connection_states() {
    let (conn, rx) = ViewerConnection::new(4, Some("1.2.3.4".to_string()), None);
    assert_eq!(conn.state(), ConnectionState::Connecting);
    assert_eq!(conn.metadata.client_ip.as_deref(), Some("1.2.3.4"));

    drop(rx);
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!conn.is_active());
    assert_eq!(conn.try_send(PushMessage::Clear), Err(SendFailure::Closed));
}

#[tokio::test]
async fn test_viewer_connection_full_queue() {
    let (conn, _rx) = ViewerConnection::new(1, None, None);
    assert!(conn.try_send(PushMessage::Clear).is_ok());
    assert_eq!(conn.try_send(PushMessage::Clear), Err(SendFailure::Full));
}

// ============== ConnectionManager Tests ==============

#[tokio::test]
async fn test_connection_manager_register_unregister() {
    let manager = ConnectionManager::new(8);
    let (conn, _rx) = ViewerConnection::new(8, None, None);
    let id = conn.id.clone();

    manager.register(conn.clone());
    assert_eq!(manager.connection_count(), 1);

    assert!(manager.unregister(&id));
    assert_eq!(manager.connection_count(), 0);
    assert_eq!(conn.state(), ConnectionState::Closed);

    // Second removal is a no-op
    assert!(!manager.unregister(&id));
}

#[tokio::test]
async fn test_connection_manager_publish_to_all() {
    let manager = ConnectionManager::new(8);
    let (c1, mut rx1) = ViewerConnection::new(8, None, None);
    let (c2, mut rx2) = ViewerConnection::new(8, None, None);
    manager.register(c1);
    manager.register(c2);

    assert_eq!(manager.publish(&PushMessage::Clear), 2);
    assert_eq!(rx1.try_recv().unwrap(), PushMessage::Clear);
    assert_eq!(rx2.try_recv().unwrap(), PushMessage::Clear);
}

#[tokio::test]
async fn test_connection_manager_publish_prunes_closed() {
    let manager = ConnectionManager::new(8);
    let (alive, mut rx_alive) = ViewerConnection::new(8, None, None);
    let (dead, rx_dead) = ViewerConnection::new(8, None, None);
    manager.register(alive);
    manager.register(dead);
    drop(rx_dead);

    assert_eq!(manager.publish(&PushMessage::Clear), 1);
    assert_eq!(manager.connection_count(), 1);
    assert!(rx_alive.try_recv().is_ok());
}

#[tokio::test]
async fn test_connection_manager_evicts_full_viewer() {
    let manager = ConnectionManager::new(1);
    let (slow, mut rx_slow) = ViewerConnection::new(1, None, None);
    let (fast, mut rx_fast) = ViewerConnection::new(4, None, None);
    manager.register(slow);
    manager.register(fast);

    assert_eq!(manager.publish(&PushMessage::Clear), 2);
    let _ = rx_fast.try_recv();

    // Slow viewer never drained its queue
    assert_eq!(manager.publish(&PushMessage::Clear), 1);
    assert_eq!(manager.connection_count(), 1);
    assert!(rx_fast.try_recv().is_ok());

    // Evicted stream yields what was queued, then ends
    assert_eq!(rx_slow.recv().await, Some(PushMessage::Clear));
    assert_eq!(rx_slow.recv().await, None);
}

#[tokio::test]
async fn test_connection_manager_preserves_order() {
    let manager = ConnectionManager::new(8);
    let (conn, mut rx) = ViewerConnection::new(8, None, None);
    manager.register(conn);

    let r1 = request_at(1);
    let r2 = request_at(2);
    manager.publish(&PushMessage::NewRequest { request: r1.clone() });
    manager.publish(&PushMessage::Clear);
    manager.publish(&PushMessage::NewRequest { request: r2.clone() });

    assert_eq!(rx.try_recv().unwrap(), PushMessage::NewRequest { request: r1 });
    assert_eq!(rx.try_recv().unwrap(), PushMessage::Clear);
    assert_eq!(rx.try_recv().unwrap(), PushMessage::NewRequest { request: r2 });
}

#[tokio::test]
async fn test_connection_manager_cleanup_dead_connections() {
    let manager = ConnectionManager::default();
    let (conn, rx) = ViewerConnection::new(8, None, None);
    manager.register(conn);

    drop(rx);
    assert_eq!(manager.cleanup_dead_connections(), 1);
    assert_eq!(manager.connection_count(), 0);
}

// ============== Board Tests ==============

#[tokio::test]
async fn test_board_snapshot_then_live() {
    let board = new_board();
    let r1 = board.submit(candidate("Ana", 1)).await.unwrap();
    let r2 = board.submit(candidate("Ben", 2)).await.unwrap();

    let (info, mut viewer) = board.connect(None, None).await.unwrap();
    assert_eq!(info.snapshot_len, 2);

    match viewer.recv().await.unwrap() {
        PushMessage::Initial { requests } => {
            let ids: Vec<Uuid> = requests.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![r2.id, r1.id]);
        }
        other => panic!("expected initial, got {other:?}"),
    }

    let r3 = board.submit(candidate("Cy", -3)).await.unwrap();
    assert_eq!(
        viewer.recv().await.unwrap(),
        PushMessage::NewRequest { request: r3 }
    );
    assert!(viewer.try_recv().is_err());
}

#[tokio::test]
async fn test_board_rejected_submit_is_not_published() {
    let board = new_board();
    let (_info, mut viewer) = board.connect(None, None).await.unwrap();
    let _ = viewer.recv().await;

    let err = board.submit(candidate("Ana", 0)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::ZeroAdjustment)));
    assert!(viewer.try_recv().is_err());
    assert!(board.requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_board_clear_reaches_every_viewer() {
    let board = new_board();
    board.submit(candidate("Ana", 4)).await.unwrap();

    let (_a, mut viewer_a) = board.connect(None, None).await.unwrap();
    let (_b, mut viewer_b) = board.connect(None, None).await.unwrap();
    let _ = viewer_a.recv().await;
    let _ = viewer_b.recv().await;

    board.clear().await.unwrap();
    assert_eq!(viewer_a.recv().await.unwrap(), PushMessage::Clear);
    assert_eq!(viewer_b.recv().await.unwrap(), PushMessage::Clear);
    assert!(board.requests().await.unwrap().is_empty());

    // A viewer joining after the clear starts empty
    let (_c, mut viewer_c) = board.connect(None, None).await.unwrap();
    assert_eq!(
        viewer_c.recv().await.unwrap(),
        PushMessage::Initial { requests: vec![] }
    );
}

#[tokio::test]
async fn test_board_disconnect_is_idempotent() {
    let board = new_board();
    let (info, _viewer) = board.connect(None, None).await.unwrap();
    assert_eq!(board.connections().connection_count(), 1);

    board.disconnect(&info.connection_id);
    board.disconnect(&info.connection_id);
    assert_eq!(board.connections().connection_count(), 0);

    // Publishing with nobody connected is not an error
    board.submit(candidate("Ana", 1)).await.unwrap();
}

#[tokio::test]
async fn test_board_concurrent_submits_and_connects_never_miss() {
    let board = new_board();
    let mut writers = Vec::new();
    for i in 0..20 {
        let board = board.clone();
        writers.push(tokio::spawn(async move {
            board.submit(candidate("Ana", (i % 12) + 1)).await.unwrap()
        }));
    }

    let (_info, mut viewer) = board.connect(None, None).await.unwrap();

    let mut submitted = HashSet::new();
    for w in writers {
        submitted.insert(w.await.unwrap().id);
    }

    let mut seen = HashSet::new();
    while let Ok(message) = viewer.try_recv() {
        match message {
            PushMessage::Initial { requests } => {
                for r in requests {
                    assert!(seen.insert(r.id));
                }
            }
            PushMessage::NewRequest { request } => assert!(seen.insert(request.id)),
            PushMessage::Clear => panic!("nobody cleared"),
        }
    }
    assert_eq!(seen, submitted);
}
