#![allow(clippy::float_cmp)]

use wire::{Envelope, HistoryRow, Point, RoomUser, ShapeMessage, ShapePayload};

use super::*;
use crate::input::{Gesture, Tool};

// =============================================================
// Helpers
// =============================================================

const ROOM: &str = "7";

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> ShapePayload {
    ShapePayload::Rect { x, y, width: w, height: h }
}

fn message_for(shape: &ShapePayload) -> String {
    ShapeMessage::new(shape.clone()).encode().expect("encode")
}

fn row(id: i64, shape: &ShapePayload) -> HistoryRow {
    HistoryRow { id, message: message_for(shape), author: None }
}

fn echo(id: i64, shape: &ShapePayload, token: Option<&str>) -> Envelope {
    Envelope::Chat {
        id: Some(id),
        room_id: ROOM.into(),
        message: message_for(shape),
        client_msg_id: token.map(str::to_owned),
    }
}

/// Token carried by the chat a `create_local` call emitted.
fn sent_token(actions: &[Action]) -> String {
    actions
        .iter()
        .find_map(|a| match a {
            Action::Send(Envelope::Chat { client_msg_id: Some(token), .. }) => Some(token.clone()),
            _ => None,
        })
        .expect("create emits a tagged chat")
}

fn ids(engine: &Engine) -> Vec<ShapeId> {
    engine.shapes().iter().map(|r| r.id).collect()
}

fn persist_deletes(actions: &[Action]) -> Vec<ShapeId> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::PersistDelete { id } => Some(*id),
            _ => None,
        })
        .collect()
}

fn network_actions(actions: &[Action]) -> usize {
    actions.iter().filter(|a| !matches!(a, Action::RenderNeeded)).count()
}

// =============================================================
// Session
// =============================================================

#[test]
fn join_and_leave_target_own_room() {
    let engine = Engine::new(ROOM);
    assert_eq!(engine.join(), vec![Action::Send(Envelope::JoinRoom { room_id: ROOM.into() })]);
    assert_eq!(engine.leave(), vec![Action::Send(Envelope::LeaveRoom { room_id: ROOM.into() })]);
}

#[test]
fn clear_discards_everything() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 10.0, 10.0));
    engine.create_local(rect(0.0, 0.0, 10.0, 10.0));
    engine.apply_envelope(&Envelope::RoomUsers { users: vec![RoomUser { id: "u".into(), name: "U".into() }] });
    engine.begin_drag(pt(5.0, 5.0), 0.0);

    engine.clear();
    assert!(engine.shapes().is_empty());
    assert!(engine.presence().is_empty());
    assert_eq!(engine.selection(), None);
    assert!(matches!(engine.input, Gesture::Idle));

    // Placeholder numbering restarts.
    engine.create_local(rect(0.0, 0.0, 1.0, 1.0));
    assert_eq!(ids(&engine), vec![-1]);
}

// =============================================================
// load_history
// =============================================================

#[test]
fn history_is_reversed_to_draw_order() {
    let mut engine = Engine::new(ROOM);
    let a = rect(0.0, 0.0, 1.0, 1.0);
    let b = rect(5.0, 5.0, 1.0, 1.0);
    let actions = engine.load_history(vec![row(2, &b), row(1, &a)]);
    assert_eq!(actions, vec![Action::RenderNeeded]);
    assert_eq!(ids(&engine), vec![1, 2]);
    assert_eq!(engine.shape(1).map(|r| r.shape.clone()), Some(a));
}

#[test]
fn history_skips_rows_that_are_not_shapes() {
    let mut engine = Engine::new(ROOM);
    let a = rect(0.0, 0.0, 1.0, 1.0);
    let junk = HistoryRow { id: 3, message: "hello there".into(), author: None };
    engine.load_history(vec![junk, row(1, &a)]);
    assert_eq!(ids(&engine), vec![1]);
}

#[test]
fn history_round_trip_matches_confirmed_list() {
    // A session that created and confirmed shapes reloads the same list.
    let mut first = Engine::new(ROOM);
    let shapes = [rect(0.0, 0.0, 5.0, 5.0), rect(10.0, 0.0, 5.0, 5.0), rect(20.0, 0.0, 5.0, 5.0)];
    let mut stored = Vec::new();
    for (n, shape) in shapes.iter().enumerate() {
        let token = sent_token(&first.create_local(shape.clone()));
        let id = 100 + i64::try_from(n).expect("small");
        first.apply_envelope(&echo(id, shape, Some(&token)));
        stored.push(row(id, shape));
    }
    stored.reverse();

    let mut second = Engine::new(ROOM);
    second.load_history(stored);
    assert_eq!(second.shapes(), first.shapes());
}

#[test]
fn history_keeps_pending_placeholders_on_top() {
    let mut engine = Engine::new(ROOM);
    let local = rect(0.0, 0.0, 3.0, 3.0);
    engine.create_local(local.clone());
    engine.load_history(vec![row(9, &rect(1.0, 1.0, 1.0, 1.0))]);
    assert_eq!(ids(&engine), vec![9, -1]);
}

// =============================================================
// create_local / confirmation
// =============================================================

#[test]
fn create_local_assigns_negative_ids_and_sends_tagged_chat() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(10.0, 10.0, 50.0, 20.0);
    let actions = engine.create_local(shape.clone());
    engine.create_local(rect(0.0, 0.0, 1.0, 1.0));
    assert_eq!(ids(&engine), vec![-1, -2]);

    let Some(Action::Send(Envelope::Chat { id, room_id, message, client_msg_id })) = actions.first() else {
        panic!("expected chat first, got {actions:?}");
    };
    assert_eq!(*id, None);
    assert_eq!(room_id, ROOM);
    assert_eq!(ShapeMessage::decode(message).expect("message").shape, shape);
    assert!(client_msg_id.is_some());
    assert_eq!(actions.last(), Some(&Action::RenderNeeded));
}

#[test]
fn tokens_are_unique_per_creation() {
    let mut engine = Engine::new(ROOM);
    let a = sent_token(&engine.create_local(rect(0.0, 0.0, 1.0, 1.0)));
    let b = sent_token(&engine.create_local(rect(0.0, 0.0, 1.0, 1.0)));
    assert_ne!(a, b);
}

#[test]
fn echo_confirms_placeholder_without_duplicating() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(10.0, 10.0, 50.0, 20.0);
    let token = sent_token(&engine.create_local(shape.clone()));

    let actions = engine.apply_envelope(&echo(101, &shape, Some(&token)));
    assert_eq!(actions, vec![Action::RenderNeeded]);
    assert_eq!(ids(&engine), vec![101]);
    assert!(engine.shape(101).is_some_and(|r| r.pending.is_none()));
}

#[test]
fn second_echo_with_same_token_is_noop() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(0.0, 0.0, 5.0, 5.0);
    let token = sent_token(&engine.create_local(shape.clone()));
    engine.apply_envelope(&echo(101, &shape, Some(&token)));

    assert!(engine.apply_envelope(&echo(101, &shape, Some(&token))).is_empty());
    assert_eq!(ids(&engine), vec![101]);
}

#[test]
fn on_create_confirmed_with_unknown_token_is_noop() {
    let mut engine = Engine::new(ROOM);
    engine.create_local(rect(0.0, 0.0, 5.0, 5.0));
    assert!(engine.on_create_confirmed("nope", 5).is_empty());
    assert_eq!(ids(&engine), vec![-1]);
}

#[test]
fn on_create_confirmed_rejects_non_positive_id() {
    let mut engine = Engine::new(ROOM);
    let token = sent_token(&engine.create_local(rect(0.0, 0.0, 5.0, 5.0)));
    assert!(engine.on_create_confirmed(&token, 0).is_empty());
    assert_eq!(ids(&engine), vec![-1]);
    assert_eq!(engine.on_create_confirmed(&token, 4), vec![Action::RenderNeeded]);
    assert_eq!(ids(&engine), vec![4]);
}

#[test]
fn confirmation_targets_the_right_record_after_deletes() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 1.0, 1.0));
    let first = rect(100.0, 0.0, 1.0, 1.0);
    let second = rect(200.0, 0.0, 1.0, 1.0);
    let t1 = sent_token(&engine.create_local(first.clone()));
    let t2 = sent_token(&engine.create_local(second.clone()));
    engine.on_remote_delete(1);

    engine.apply_envelope(&echo(31, &second, Some(&t2)));
    engine.apply_envelope(&echo(30, &first, Some(&t1)));
    assert_eq!(ids(&engine), vec![30, 31]);
    assert_eq!(engine.shape(31).map(|r| r.shape.clone()), Some(second));
}

#[test]
fn echo_for_erased_placeholder_is_not_resurrected() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(0.0, 0.0, 10.0, 10.0);
    let token = sent_token(&engine.create_local(shape.clone()));
    engine.erase_at(pt(5.0, 5.0), 0.0);
    assert!(engine.shapes().is_empty());

    assert!(engine.apply_envelope(&echo(77, &shape, Some(&token))).is_empty());
    assert!(engine.shapes().is_empty());
}

#[test]
fn placeholder_moved_while_pending_is_persisted_on_confirmation() {
    let mut engine = Engine::new(ROOM);
    let token = sent_token(&engine.create_local(rect(0.0, 0.0, 10.0, 10.0)));
    engine.begin_drag(pt(5.0, 5.0), 0.0);
    engine.drag_to(pt(25.0, 5.0));
    assert!(engine.end_drag().is_empty());

    let actions = engine.on_create_confirmed(&token, 12);
    assert_eq!(
        actions,
        vec![
            Action::PersistUpdate { id: 12, shape: rect(20.0, 0.0, 10.0, 10.0) },
            Action::RenderNeeded,
        ]
    );
    assert_eq!(engine.selection(), Some(12));
}

#[test]
fn confirmation_follows_an_active_drag() {
    let mut engine = Engine::new(ROOM);
    let token = sent_token(&engine.create_local(rect(0.0, 0.0, 10.0, 10.0)));
    engine.begin_drag(pt(5.0, 5.0), 0.0);
    engine.on_create_confirmed(&token, 50);
    engine.drag_to(pt(15.0, 5.0));

    assert_eq!(
        engine.end_drag(),
        vec![Action::PersistUpdate { id: 50, shape: rect(10.0, 0.0, 10.0, 10.0) }]
    );
}

// =============================================================
// Remote changes
// =============================================================

#[test]
fn remote_chat_without_our_token_is_created() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(1.0, 2.0, 3.0, 4.0);
    assert_eq!(engine.apply_envelope(&echo(5, &shape, Some("someone-else"))), vec![Action::RenderNeeded]);
    assert_eq!(engine.apply_envelope(&echo(6, &shape, None)), vec![Action::RenderNeeded]);
    assert_eq!(ids(&engine), vec![5, 6]);
}

#[test]
fn remote_create_is_idempotent() {
    let mut engine = Engine::new(ROOM);
    let shape = rect(0.0, 0.0, 1.0, 1.0);
    engine.apply_envelope(&echo(5, &shape, None));
    assert!(engine.apply_envelope(&echo(5, &shape, None)).is_empty());
    assert_eq!(engine.shapes().len(), 1);
}

#[test]
fn remote_chat_with_bad_message_is_ignored() {
    let mut engine = Engine::new(ROOM);
    let env = Envelope::Chat { id: Some(5), room_id: ROOM.into(), message: "hi".into(), client_msg_id: None };
    assert!(engine.apply_envelope(&env).is_empty());
    assert!(engine.shapes().is_empty());
}

#[test]
fn envelopes_for_other_rooms_are_ignored() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(5, rect(0.0, 0.0, 1.0, 1.0));
    let env = Envelope::Delete { room_id: "8".into(), shape_id: 5 };
    assert!(engine.apply_envelope(&env).is_empty());
    assert_eq!(ids(&engine), vec![5]);
}

#[test]
fn remote_update_replaces_in_place() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 1.0, 1.0));
    engine.on_remote_create(2, rect(0.0, 0.0, 1.0, 1.0));
    let moved = ShapePayload::Circle { center_x: 3.0, center_y: 3.0, radius: 2.0 };
    let env = Envelope::Update { room_id: ROOM.into(), shape_id: 1, shape: moved.clone() };
    assert_eq!(engine.apply_envelope(&env), vec![Action::RenderNeeded]);
    assert_eq!(ids(&engine), vec![1, 2]);
    assert_eq!(engine.shape(1).map(|r| r.shape.clone()), Some(moved));
}

#[test]
fn remote_update_for_unknown_id_is_noop() {
    let mut engine = Engine::new(ROOM);
    assert!(engine.on_remote_update(9, rect(0.0, 0.0, 1.0, 1.0)).is_empty());
    assert!(engine.shapes().is_empty());
}

#[test]
fn remote_delete_is_idempotent() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(101, rect(0.0, 0.0, 1.0, 1.0));
    let env = Envelope::Delete { room_id: ROOM.into(), shape_id: 101 };
    assert_eq!(engine.apply_envelope(&env), vec![Action::RenderNeeded]);
    assert!(engine.apply_envelope(&env).is_empty());
    assert!(engine.shapes().is_empty());
}

#[test]
fn remote_changes_never_touch_local_placeholders() {
    let mut engine = Engine::new(ROOM);
    let first = engine.create_local(rect(0.0, 0.0, 10.0, 10.0));
    engine.create_local(rect(20.0, 20.0, 10.0, 10.0));
    assert_eq!(ids(&engine), vec![-1, -2]);

    let other = rect(90.0, 90.0, 1.0, 1.0);
    let update = Envelope::Update { room_id: ROOM.into(), shape_id: -1, shape: other };
    assert!(engine.apply_envelope(&update).is_empty());
    let delete = Envelope::Delete { room_id: ROOM.into(), shape_id: -1 };
    assert!(engine.apply_envelope(&delete).is_empty());
    assert!(engine.apply_envelope(&Envelope::Delete { room_id: ROOM.into(), shape_id: 0 }).is_empty());

    assert_eq!(ids(&engine), vec![-1, -2]);
    assert_eq!(engine.shape(-1).map(|r| r.shape.clone()), Some(rect(0.0, 0.0, 10.0, 10.0)));

    let token = sent_token(&first);
    engine.apply_envelope(&echo(101, &rect(0.0, 0.0, 10.0, 10.0), Some(&token)));
    assert_eq!(ids(&engine), vec![101, -2]);
}

#[test]
fn remote_delete_clears_selection_and_drag() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(3, rect(0.0, 0.0, 10.0, 10.0));
    engine.begin_drag(pt(5.0, 5.0), 0.0);
    assert_eq!(engine.selection(), Some(3));

    engine.on_remote_delete(3);
    assert_eq!(engine.selection(), None);
    assert!(matches!(engine.input, Gesture::Idle));
    assert!(engine.drag_to(pt(50.0, 50.0)).is_empty());
}

#[test]
fn room_users_replace_presence() {
    let mut engine = Engine::new(ROOM);
    let users = vec![RoomUser { id: "u1".into(), name: "Ada".into() }];
    assert!(engine.apply_envelope(&Envelope::RoomUsers { users: users.clone() }).is_empty());
    assert_eq!(engine.presence(), users.as_slice());
    engine.apply_envelope(&Envelope::RoomUsers { users: vec![] });
    assert!(engine.presence().is_empty());
}

#[test]
fn join_and_leave_envelopes_are_ignored() {
    let mut engine = Engine::new(ROOM);
    assert!(engine.apply_envelope(&Envelope::JoinRoom { room_id: ROOM.into() }).is_empty());
    assert!(engine.apply_envelope(&Envelope::LeaveRoom { room_id: ROOM.into() }).is_empty());
}

// =============================================================
// Move / drag
// =============================================================

#[test]
fn move_shape_is_local_only() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 1.0, 1.0));
    assert_eq!(engine.move_shape(1, 4.0, -2.0), vec![Action::RenderNeeded]);
    assert_eq!(engine.shape(1).map(|r| r.shape.clone()), Some(rect(4.0, -2.0, 1.0, 1.0)));
    assert!(engine.move_shape(99, 1.0, 1.0).is_empty());
}

#[test]
fn drag_picks_last_drawn_shape() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 100.0, 100.0));
    engine.on_remote_create(2, rect(10.0, 10.0, 10.0, 10.0));
    assert_eq!(engine.begin_drag(pt(15.0, 15.0), 0.0), Some(2));
    assert_eq!(engine.begin_drag(pt(500.0, 500.0), 0.0), None);
    assert_eq!(engine.selection(), None);
}

#[test]
fn drag_of_confirmed_shape_commits_persist_update() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(8, rect(0.0, 0.0, 10.0, 10.0));
    engine.begin_drag(pt(5.0, 5.0), 0.0);
    assert_eq!(engine.drag_to(pt(6.0, 7.0)), vec![Action::RenderNeeded]);
    engine.drag_to(pt(10.0, 10.0));

    assert_eq!(engine.end_drag(), vec![Action::PersistUpdate { id: 8, shape: rect(5.0, 5.0, 10.0, 10.0) }]);
    assert!(engine.end_drag().is_empty());
}

#[test]
fn click_without_movement_commits_nothing() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(8, rect(0.0, 0.0, 10.0, 10.0));
    engine.begin_drag(pt(5.0, 5.0), 0.0);
    engine.drag_to(pt(5.0, 5.0));
    assert!(engine.end_drag().is_empty());
}

#[test]
fn persisted_update_is_announced_with_current_shape() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(8, rect(0.0, 0.0, 10.0, 10.0));
    engine.move_shape(8, 1.0, 1.0);
    assert_eq!(
        engine.on_update_persisted(8),
        vec![Action::Send(Envelope::Update { room_id: ROOM.into(), shape_id: 8, shape: rect(1.0, 1.0, 10.0, 10.0) })]
    );
}

#[test]
fn persisted_update_for_removed_shape_is_noop() {
    let engine = Engine::new(ROOM);
    assert!(engine.on_update_persisted(8).is_empty());
}

// =============================================================
// Erase
// =============================================================

#[test]
fn erase_over_pending_and_confirmed_issues_one_delete() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(55, rect(0.0, 0.0, 100.0, 100.0));
    engine.create_local(rect(40.0, 40.0, 20.0, 20.0));

    let actions = engine.erase_at(pt(50.0, 50.0), 0.0);
    assert!(engine.shapes().is_empty());
    assert_eq!(persist_deletes(&actions), vec![55]);
    assert_eq!(network_actions(&actions), 1);
}

#[test]
fn erase_of_only_pending_shape_needs_no_network() {
    let mut engine = Engine::new(ROOM);
    engine.create_local(rect(0.0, 0.0, 10.0, 10.0));
    let actions = engine.erase_at(pt(5.0, 5.0), 0.0);
    assert_eq!(actions, vec![Action::RenderNeeded]);
}

#[test]
fn erase_issues_one_delete_per_confirmed_hit() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 10.0, 10.0));
    engine.on_remote_create(2, rect(0.0, 0.0, 10.0, 10.0));
    engine.on_remote_create(3, rect(50.0, 50.0, 10.0, 10.0));
    let actions = engine.erase_at(pt(5.0, 5.0), 0.0);
    assert_eq!(persist_deletes(&actions), vec![2, 1]);
    assert_eq!(ids(&engine), vec![3]);
}

#[test]
fn erase_on_empty_space_does_nothing() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 10.0, 10.0));
    assert!(engine.erase_at(pt(500.0, 500.0), 0.0).is_empty());
}

#[test]
fn persisted_delete_is_announced() {
    let engine = Engine::new(ROOM);
    assert_eq!(
        engine.on_delete_persisted(55),
        vec![Action::Send(Envelope::Delete { room_id: ROOM.into(), shape_id: 55 })]
    );
}

// =============================================================
// Pointer handlers
// =============================================================

#[test]
fn rect_tool_drag_creates_shape() {
    let mut engine = Engine::new(ROOM);
    engine.set_tool(Tool::Rect);
    assert!(engine.on_pointer_down(pt(10.0, 10.0)).is_empty());
    engine.on_pointer_move(pt(30.0, 20.0));
    let actions = engine.on_pointer_up(pt(60.0, 30.0));

    assert_eq!(actions.len(), 2);
    assert_eq!(engine.shape(-1).map(|r| r.shape.clone()), Some(rect(10.0, 10.0, 50.0, 20.0)));
}

#[test]
fn pencil_tool_records_path() {
    let mut engine = Engine::new(ROOM);
    engine.set_tool(Tool::Pencil);
    engine.on_pointer_down(pt(0.0, 0.0));
    engine.on_pointer_move(pt(1.0, 1.0));
    engine.on_pointer_move(pt(2.0, 2.0));
    engine.on_pointer_up(pt(2.0, 2.0));

    assert_eq!(
        engine.shape(-1).map(|r| r.shape.clone()),
        Some(ShapePayload::Pencil { points: vec![pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0)] })
    );
}

#[test]
fn select_tool_drags_and_commits() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(4, rect(0.0, 0.0, 10.0, 10.0));
    engine.on_pointer_down(pt(5.0, 5.0));
    engine.on_pointer_move(pt(8.0, 5.0));
    let actions = engine.on_pointer_up(pt(10.0, 5.0));

    assert_eq!(
        actions,
        vec![Action::RenderNeeded, Action::PersistUpdate { id: 4, shape: rect(5.0, 0.0, 10.0, 10.0) }]
    );
}

#[test]
fn eraser_tool_erases_along_the_stroke() {
    let mut engine = Engine::new(ROOM);
    engine.on_remote_create(1, rect(0.0, 0.0, 10.0, 10.0));
    engine.on_remote_create(2, rect(100.0, 0.0, 10.0, 10.0));
    engine.set_tool(Tool::Eraser);

    assert_eq!(persist_deletes(&engine.on_pointer_down(pt(5.0, 5.0))), vec![1]);
    assert_eq!(persist_deletes(&engine.on_pointer_move(pt(105.0, 5.0))), vec![2]);
    assert!(engine.on_pointer_up(pt(105.0, 5.0)).is_empty());
    assert!(engine.on_pointer_move(pt(5.0, 5.0)).is_empty());
}

#[test]
fn set_tool_abandons_gesture() {
    let mut engine = Engine::new(ROOM);
    engine.set_tool(Tool::Circle);
    engine.on_pointer_down(pt(0.0, 0.0));
    engine.set_tool(Tool::Select);
    assert!(engine.on_pointer_up(pt(50.0, 50.0)).is_empty());
    assert!(engine.shapes().is_empty());
}
