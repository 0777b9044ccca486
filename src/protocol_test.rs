use super::*;
use crate::stroke::ToolKind;
use serde_json::json;

fn sample_stroke() -> Stroke {
    Stroke::new(Uuid::new_v4(), ToolKind::Brush, "#45B7D1", 3.0)
        .with_points(vec![PointSample::new(1.0, 2.0, 3.0)])
}

#[test]
fn client_message_event_tags() {
    let cases = [
        (ClientMessage::StrokeStart { stroke: sample_stroke() }, "stroke:start"),
        (
            ClientMessage::StrokeUpdate { stroke_id: Uuid::new_v4(), points: vec![] },
            "stroke:update",
        ),
        (ClientMessage::StrokeEnd { stroke_id: Uuid::new_v4() }, "stroke:end"),
        (ClientMessage::Undo, "undo"),
        (ClientMessage::Redo, "redo"),
        (ClientMessage::CursorMove { x: 1.0, y: 2.0 }, "cursor:move"),
    ];

    for (msg, tag) in cases {
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value.get("event").and_then(|v| v.as_str()), Some(tag));
        let restored: ClientMessage = serde_json::from_value(value).expect("deserialize");
        assert_eq!(restored, msg);
    }
}

#[test]
fn server_message_round_trips() {
    let user_id = Uuid::new_v4();
    let cases = [
        ServerMessage::Connected { user_id, color: "#FFD166".into() },
        ServerMessage::StrokeStart { stroke: sample_stroke() },
        ServerMessage::StrokeUpdate {
            stroke_id: Uuid::new_v4(),
            points: vec![PointSample::new(4.0, 5.0, 6.0)],
        },
        ServerMessage::StrokeEnd { stroke_id: Uuid::new_v4() },
        ServerMessage::CanvasRebuild { strokes: vec![sample_stroke()] },
        ServerMessage::UsersList {
            users: vec![SessionUser { user_id, color: "#98D8C8".into() }],
        },
        ServerMessage::UserJoined { user_id, color: "#C197FF".into() },
        ServerMessage::UserLeft { user_id },
        ServerMessage::CursorUpdate { user_id, x: 9.0, y: 8.0, color: "#FF6B6B".into() },
        ServerMessage::Error { message: "malformed message".into() },
    ];

    for msg in cases {
        let json = serde_json::to_string(&msg).expect("serialize");
        let restored: ServerMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, msg);
    }
}

#[test]
fn parse_rejects_malformed_payloads() {
    let err = parse_client_message("not json").expect_err("should reject");
    assert!(matches!(err, ProtocolError::Malformed(_)));

    let err = parse_client_message(r#"{"event":"no:such:event"}"#).expect_err("should reject");
    assert!(matches!(err, ProtocolError::Malformed(_)));
}

#[test]
fn parse_accepts_undo_without_payload() {
    let msg = parse_client_message(r#"{"event":"undo"}"#).expect("parse");
    assert_eq!(msg, ClientMessage::Undo);
}

#[test]
fn stroke_start_nests_the_full_stroke() {
    let stroke = sample_stroke();
    let raw = json!({"event": "stroke:start", "stroke": stroke});
    let msg: ClientMessage = serde_json::from_value(raw).expect("deserialize");
    let ClientMessage::StrokeStart { stroke: parsed } = msg else {
        panic!("expected stroke:start");
    };
    assert_eq!(parsed, stroke);
}

#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
}

impl SessionEvents for Recorder {
    fn on_stroke_start(&mut self, stroke: Stroke) {
        self.calls.push(format!("start:{}", stroke.stroke_id));
    }
    fn on_stroke_update(&mut self, stroke_id: StrokeId, points: Vec<PointSample>) {
        self.calls.push(format!("update:{stroke_id}:{}", points.len()));
    }
    fn on_stroke_end(&mut self, stroke_id: StrokeId) {
        self.calls.push(format!("end:{stroke_id}"));
    }
    fn on_canvas_rebuild(&mut self, strokes: Vec<Stroke>) {
        self.calls.push(format!("rebuild:{}", strokes.len()));
    }
    fn on_users_list(&mut self, users: Vec<SessionUser>) {
        self.calls.push(format!("users:{}", users.len()));
    }
    fn on_user_joined(&mut self, user_id: Uuid, _color: String) {
        self.calls.push(format!("joined:{user_id}"));
    }
    fn on_user_left(&mut self, user_id: Uuid) {
        self.calls.push(format!("left:{user_id}"));
    }
    fn on_cursor_update(&mut self, user_id: Uuid, _x: f64, _y: f64, _color: String) {
        self.calls.push(format!("cursor:{user_id}"));
    }
}

#[test]
fn dispatch_routes_to_named_methods() {
    let mut recorder = Recorder::default();
    let stroke = sample_stroke();
    let id = stroke.stroke_id;

    dispatch(&mut recorder, ServerMessage::StrokeStart { stroke });
    dispatch(
        &mut recorder,
        ServerMessage::StrokeUpdate { stroke_id: id, points: vec![PointSample::new(0.0, 0.0, 0.0)] },
    );
    dispatch(&mut recorder, ServerMessage::StrokeEnd { stroke_id: id });
    dispatch(&mut recorder, ServerMessage::CanvasRebuild { strokes: vec![] });

    assert_eq!(
        recorder.calls,
        vec![
            format!("start:{id}"),
            format!("update:{id}:1"),
            format!("end:{id}"),
            "rebuild:0".to_string(),
        ]
    );
}

#[test]
fn dispatch_ignores_connection_level_messages() {
    let mut recorder = Recorder::default();
    dispatch(
        &mut recorder,
        ServerMessage::Connected { user_id: Uuid::new_v4(), color: "#000".into() },
    );
    dispatch(&mut recorder, ServerMessage::Error { message: "x".into() });
    assert!(recorder.calls.is_empty());
}
