// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::event::MessageSeverity;
use gyre_core::{CyclePoint, TaskId, TaskStatus};
use gyre_engine::{OperatorCommand, StopMode};
use proptest::prelude::*;

fn task_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

fn task_id() -> impl Strategy<Value = TaskId> {
    (task_name(), -1000i64..1000).prop_map(|(name, p)| TaskId::new(name, CyclePoint::Integer(p)))
}

fn request() -> impl Strategy<Value = Request> {
    prop_oneof![
        Just(Request::Ping),
        task_id().prop_map(|id| Request::Message {
            id,
            severity: MessageSeverity::Normal,
            message: "started".to_string(),
        }),
        task_id().prop_map(|task| Request::Query { query: Query::Show { task } }),
        Just(Request::Query { query: Query::Status }),
        Just(Request::Command { command: OperatorCommand::Pause }),
        Just(Request::Command { command: OperatorCommand::Stop { mode: StopMode::Now } }),
        task_id().prop_map(|t| Request::Command {
            command: OperatorCommand::Hold { tasks: vec![t], after: None }
        }),
    ]
}

proptest! {
    #[test]
    fn request_frames_round_trip(req in request()) {
        let frame = encode(&req).unwrap();
        // 4-byte BE length prefix + payload.
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        prop_assert_eq!(len, frame.len() - 4);
        let back: Request = decode(&frame[4..]).unwrap();
        prop_assert_eq!(back, req);
    }
}

#[test]
fn response_round_trip() {
    let responses = vec![
        Response::Ok,
        Response::error("no such task"),
        Response::Tasks {
            tasks: vec![TaskEntry {
                id: TaskId::new("foo", CyclePoint::Integer(1)),
                status: TaskStatus::Running,
                is_held: false,
                submit_num: 2,
            }],
        },
        Response::Checkpoints {
            checkpoints: vec![CheckpointEntry {
                id: 0,
                event: "latest".to_string(),
                time: "2010-01-01T00:00:00Z".to_string(),
            }],
        },
    ];
    for response in responses {
        let frame = encode(&response).unwrap();
        let back: Response = decode(&frame[4..]).unwrap();
        assert_eq!(back, response);
    }
}

#[tokio::test]
async fn async_read_write_round_trip() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    write_message(&mut a, &Request::Ping).await.unwrap();
    let req: Request = read_message(&mut b).await.unwrap();
    assert_eq!(req, Request::Ping);
}

#[tokio::test]
async fn closed_stream_is_a_typed_error() {
    let (a, mut b) = tokio::io::duplex(16);
    drop(a);
    let err = read_message::<Request>(&mut b).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
}
