use uuid::Uuid;
use wire::{Envelope, HistoryRow, Point, RoomUser, ShapeMessage, ShapePayload};

use crate::consts::{ERASER_TOLERANCE, FIRST_PLACEHOLDER_ID, SELECT_TOLERANCE};
use crate::doc::{Confirmation, DocStore, ShapeId, ShapeRecord};
use crate::hit;
use crate::input::{Gesture, Tool, UiState, shape_from_drag};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Instructions returned from engine operations for the host to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write this envelope to the relay socket.
    Send(Envelope),
    /// Store the new geometry of a confirmed shape. On success the host calls
    /// [`Engine::on_update_persisted`].
    PersistUpdate { id: ShapeId, shape: ShapePayload },
    /// Delete a confirmed shape from storage. On success the host calls
    /// [`Engine::on_delete_persisted`].
    PersistDelete { id: ShapeId },
    /// The shape list changed.
    RenderNeeded,
}

/// Client-side shape store for one room.
///
/// Local edits apply immediately. Creations carry a placeholder id and a
/// correlation token until the relay echoes them back with a storage id.
pub struct Engine {
    room_id: String,
    pub doc: DocStore,
    pub ui: UiState,
    pub input: Gesture,
    presence: Vec<RoomUser>,
    next_placeholder: ShapeId,
}

impl Engine {
    #[must_use]
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            doc: DocStore::new(),
            ui: UiState::default(),
            input: Gesture::Idle,
            presence: Vec::new(),
            next_placeholder: FIRST_PLACEHOLDER_ID,
        }
    }

    // --- Session ---

    /// Announce this session to the room.
    #[must_use]
    pub fn join(&self) -> Vec<Action> {
        vec![Action::Send(Envelope::JoinRoom { room_id: self.room_id.clone() })]
    }

    #[must_use]
    pub fn leave(&self) -> Vec<Action> {
        vec![Action::Send(Envelope::LeaveRoom { room_id: self.room_id.clone() })]
    }

    /// Replace the list with the room's stored shapes. `rows` arrive newest
    /// first; rows whose message is not a shape are skipped.
    pub fn load_history(&mut self, rows: Vec<HistoryRow>) -> Vec<Action> {
        let records = rows
            .into_iter()
            .rev()
            .filter(|row| row.id > 0)
            .filter_map(|row| match ShapeMessage::decode(&row.message) {
                Ok(msg) => Some(ShapeRecord::confirmed(row.id, msg.shape)),
                Err(_) => None,
            })
            .collect();
        self.doc.load_snapshot(records);
        self.forget_missing();
        vec![Action::RenderNeeded]
    }

    /// Discard everything at session teardown.
    pub fn clear(&mut self) {
        self.doc.clear();
        self.ui.selected_id = None;
        self.input = Gesture::Idle;
        self.presence.clear();
        self.next_placeholder = FIRST_PLACEHOLDER_ID;
    }

    // --- Local edits ---

    /// Add a shape drawn here. It shows immediately under a placeholder id
    /// and is sent to the relay tagged with a fresh correlation token.
    pub fn create_local(&mut self, shape: ShapePayload) -> Vec<Action> {
        let Ok(message) = ShapeMessage::new(shape.clone()).encode() else {
            return Vec::new();
        };
        let id = self.next_placeholder;
        self.next_placeholder -= 1;
        let token = Uuid::new_v4().to_string();
        self.doc.push(ShapeRecord::placeholder(id, shape, token.clone()));
        vec![
            Action::Send(Envelope::Chat {
                id: None,
                room_id: self.room_id.clone(),
                message,
                client_msg_id: Some(token),
            }),
            Action::RenderNeeded,
        ]
    }

    /// Translate a shape in place. Local only.
    pub fn move_shape(&mut self, id: ShapeId, dx: f64, dy: f64) -> Vec<Action> {
        match self.doc.get_mut(id) {
            Some(record) => {
                record.shape.translate(dx, dy);
                vec![Action::RenderNeeded]
            }
            None => Vec::new(),
        }
    }

    /// Start dragging the top-most shape under `pt`. Returns its id.
    pub fn begin_drag(&mut self, pt: Point, tolerance: f64) -> Option<ShapeId> {
        let id = hit::top_hit(&self.doc, pt, tolerance);
        self.ui.selected_id = id;
        self.input = match id {
            Some(id) => Gesture::Dragging { id, last: pt, moved: false },
            None => Gesture::Idle,
        };
        id
    }

    /// Follow the pointer with the dragged shape.
    pub fn drag_to(&mut self, pt: Point) -> Vec<Action> {
        let Gesture::Dragging { id, last, moved } = &mut self.input else {
            return Vec::new();
        };
        let (dx, dy) = (pt.x - last.x, pt.y - last.y);
        *last = pt;
        if dx == 0.0 && dy == 0.0 {
            return Vec::new();
        }
        *moved = true;
        let id = *id;
        let actions = self.move_shape(id, dx, dy);
        if actions.is_empty() {
            self.input = Gesture::Idle;
        }
        actions
    }

    /// Finish a drag. A moved confirmed shape is sent to storage; a moved
    /// placeholder is remembered so its confirmation can catch storage up.
    pub fn end_drag(&mut self) -> Vec<Action> {
        let Gesture::Dragging { id, moved, .. } = std::mem::take(&mut self.input) else {
            return Vec::new();
        };
        if !moved {
            return Vec::new();
        }
        let Some(record) = self.doc.get_mut(id) else {
            return Vec::new();
        };
        if record.is_placeholder() {
            record.edited_while_pending = true;
            return Vec::new();
        }
        vec![Action::PersistUpdate { id, shape: record.shape.clone() }]
    }

    /// Remove every shape under `pt`, top-most first. Confirmed shapes are
    /// also deleted from storage, each independently.
    pub fn erase_at(&mut self, pt: Point, tolerance: f64) -> Vec<Action> {
        let hits = hit::hits_at(&self.doc, pt, tolerance);
        if hits.is_empty() {
            return Vec::new();
        }
        let mut actions = Vec::new();
        for id in hits {
            if self.doc.remove(id).is_some() && id > 0 {
                actions.push(Action::PersistDelete { id });
            }
        }
        self.forget_missing();
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Storage completions ---

    /// Storage accepted new geometry: tell the room.
    #[must_use]
    pub fn on_update_persisted(&self, id: ShapeId) -> Vec<Action> {
        match self.doc.get(id) {
            Some(record) => vec![Action::Send(Envelope::Update {
                room_id: self.room_id.clone(),
                shape_id: id,
                shape: record.shape.clone(),
            })],
            None => Vec::new(),
        }
    }

    /// Storage deleted a shape: tell the room.
    #[must_use]
    pub fn on_delete_persisted(&self, id: ShapeId) -> Vec<Action> {
        vec![Action::Send(Envelope::Delete { room_id: self.room_id.clone(), shape_id: id })]
    }

    // --- Relay input ---

    /// Route one inbound envelope.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Vec<Action> {
        if let Some(room) = envelope.room_id()
            && room != self.room_id
        {
            return Vec::new();
        }
        match envelope {
            Envelope::Chat { id: Some(id), message, client_msg_id, .. } if *id > 0 => {
                if let Some(token) = client_msg_id {
                    match self.doc.confirm(token, *id) {
                        Confirmation::Confirmed { placeholder, id, edited } => {
                            return self.confirmed(placeholder, id, edited);
                        }
                        Confirmation::Retired => return Vec::new(),
                        Confirmation::Unknown => {}
                    }
                }
                match ShapeMessage::decode(message) {
                    Ok(msg) => self.on_remote_create(*id, msg.shape),
                    Err(_) => Vec::new(),
                }
            }
            Envelope::Update { shape_id, shape, .. } => self.on_remote_update(*shape_id, shape.clone()),
            Envelope::Delete { shape_id, .. } => self.on_remote_delete(*shape_id),
            Envelope::RoomUsers { users } => {
                self.presence.clone_from(users);
                Vec::new()
            }
            Envelope::Chat { .. } | Envelope::JoinRoom { .. } | Envelope::LeaveRoom { .. } => Vec::new(),
        }
    }

    /// The relay assigned `id` to the creation tagged `token`.
    pub fn on_create_confirmed(&mut self, token: &str, id: ShapeId) -> Vec<Action> {
        if id <= 0 {
            return Vec::new();
        }
        match self.doc.confirm(token, id) {
            Confirmation::Confirmed { placeholder, id, edited } => self.confirmed(placeholder, id, edited),
            Confirmation::Retired | Confirmation::Unknown => Vec::new(),
        }
    }

    /// Another participant created a shape.
    pub fn on_remote_create(&mut self, id: ShapeId, shape: ShapePayload) -> Vec<Action> {
        if id <= 0 || !self.doc.push(ShapeRecord::confirmed(id, shape)) {
            return Vec::new();
        }
        vec![Action::RenderNeeded]
    }

    /// Another participant moved a confirmed shape. Placeholder ids are local
    /// to each client, so non-positive ids never match.
    pub fn on_remote_update(&mut self, id: ShapeId, shape: ShapePayload) -> Vec<Action> {
        if id <= 0 {
            return Vec::new();
        }
        match self.doc.get_mut(id) {
            Some(record) => {
                record.shape = shape;
                vec![Action::RenderNeeded]
            }
            None => Vec::new(),
        }
    }

    pub fn on_remote_delete(&mut self, id: ShapeId) -> Vec<Action> {
        if id <= 0 || self.doc.remove(id).is_none() {
            return Vec::new();
        }
        self.forget_missing();
        vec![Action::RenderNeeded]
    }

    // --- Pointer input ---

    /// Set the active tool, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.input = Gesture::Idle;
    }

    pub fn on_pointer_down(&mut self, pt: Point) -> Vec<Action> {
        match self.ui.tool {
            Tool::Select => {
                self.begin_drag(pt, SELECT_TOLERANCE);
                Vec::new()
            }
            Tool::Eraser => {
                self.input = Gesture::Erasing;
                self.erase_at(pt, ERASER_TOLERANCE)
            }
            tool @ (Tool::Rect | Tool::Circle | Tool::Triangle | Tool::Pencil) => {
                self.input = Gesture::Drawing { tool, start: pt, path: vec![pt] };
                Vec::new()
            }
        }
    }

    pub fn on_pointer_move(&mut self, pt: Point) -> Vec<Action> {
        if let Gesture::Drawing { path, .. } = &mut self.input {
            path.push(pt);
            return Vec::new();
        }
        match self.input {
            Gesture::Dragging { .. } => self.drag_to(pt),
            Gesture::Erasing => self.erase_at(pt, ERASER_TOLERANCE),
            Gesture::Idle | Gesture::Drawing { .. } => Vec::new(),
        }
    }

    pub fn on_pointer_up(&mut self, pt: Point) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            Gesture::Idle | Gesture::Erasing => Vec::new(),
            dragging @ Gesture::Dragging { .. } => {
                self.input = dragging;
                let mut actions = self.drag_to(pt);
                actions.extend(self.end_drag());
                actions
            }
            Gesture::Drawing { tool, start, mut path } => {
                if path.last() != Some(&pt) {
                    path.push(pt);
                }
                match shape_from_drag(tool, start, pt, &path) {
                    Some(shape) => self.create_local(shape),
                    None => Vec::new(),
                }
            }
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Shapes in draw order.
    #[must_use]
    pub fn shapes(&self) -> &[ShapeRecord] {
        self.doc.records()
    }

    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&ShapeRecord> {
        self.doc.get(id)
    }

    /// Last presence list received for the room.
    #[must_use]
    pub fn presence(&self) -> &[RoomUser] {
        &self.presence
    }

    #[must_use]
    pub fn selection(&self) -> Option<ShapeId> {
        self.ui.selected_id
    }

    /// Follow a placeholder to its storage id.
    fn confirmed(&mut self, placeholder: ShapeId, id: ShapeId, edited: bool) -> Vec<Action> {
        if self.ui.selected_id == Some(placeholder) {
            self.ui.selected_id = Some(id);
        }
        if let Gesture::Dragging { id: dragged, .. } = &mut self.input
            && *dragged == placeholder
        {
            *dragged = id;
        }
        let mut actions = Vec::new();
        if edited && let Some(record) = self.doc.get(id) {
            actions.push(Action::PersistUpdate { id, shape: record.shape.clone() });
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Drop selection and drag state that point at removed shapes.
    fn forget_missing(&mut self) {
        if self.ui.selected_id.is_some_and(|id| !self.doc.contains(id)) {
            self.ui.selected_id = None;
        }
        if self.input.dragged_id().is_some_and(|id| !self.doc.contains(id)) {
            self.input = Gesture::Idle;
        }
    }
}
