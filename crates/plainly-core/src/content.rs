//! Page-side word replacement.
//!
//! A `Document` is the host page reduced to what replacement needs: a run of
//! text nodes, the marker elements inserted so far, and the live selection.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::bus::Envelope;
use crate::error::ContentError;
use crate::message::{ActionMessage, ActionResponse};

/// Wait before the highlight starts fading.
pub const FADE_DELAY: Duration = Duration::from_millis(100);

pub const MARKER_CLASS: &str = "simplified-word";
pub const HIGHLIGHT: &str = "#e6ffe6";
pub const FADE_TRANSITION: &str = "background-color 2s";

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Inline element wrapping a replacement word.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: u64,
    pub class: String,
    pub text: String,
    /// Tooltip, `Original: <replaced text>`
    pub title: String,
    pub background: String,
    pub padding: String,
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Marker(Marker),
}

/// A selected range inside one text node, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub node: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    selection: Option<Selection>,
    next_marker_id: u64,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            nodes: vec![Node::Text(text.to_string())],
            ..Self::default()
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Visible text with markers rendered as their replacement.
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.as_str(),
                Node::Marker(marker) => marker.text.as_str(),
            })
            .collect()
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Marker(marker) => Some(marker),
            Node::Text(_) => None,
        })
    }

    pub fn marker_mut(&mut self, id: u64) -> Option<&mut Marker> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Marker(marker) if marker.id == id => Some(marker),
            _ => None,
        })
    }

    /// Select `start..end` of text node `node`. Returns false for an invalid range.
    pub fn select(&mut self, node: usize, start: usize, end: usize) -> bool {
        let valid = match self.nodes.get(node) {
            Some(Node::Text(text)) => start < end && end <= text.chars().count(),
            _ => false,
        };
        if valid {
            self.selection = Some(Selection { node, start, end });
        }
        valid
    }

    /// Select the first occurrence of `needle` in any text node.
    pub fn select_text(&mut self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }

        let found = self.nodes.iter().enumerate().find_map(|(idx, node)| match node {
            Node::Text(text) => text.find(needle).map(|byte| {
                let start = text[..byte].chars().count();
                (idx, start, start + needle.chars().count())
            }),
            Node::Marker(_) => None,
        });

        match found {
            Some((node, start, end)) => self.select(node, start, end),
            None => false,
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Text of the live selection, empty when nothing is selected.
    pub fn selected_text(&self) -> String {
        let Some(sel) = self.selection else {
            return String::new();
        };
        match self.nodes.get(sel.node) {
            Some(Node::Text(text)) => text.chars().skip(sel.start).take(sel.end - sel.start).collect(),
            _ => String::new(),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Delete the selected range and insert a marker in its place.
    /// Returns the new marker's id.
    fn replace_selection(&mut self, replacement: &str, original: &str) -> Option<u64> {
        let sel = self.selection?;
        let Some(Node::Text(text)) = self.nodes.get(sel.node) else {
            return None;
        };

        let start = char_to_byte_index(text, sel.start);
        let end = char_to_byte_index(text, sel.end);
        let before = text[..start].to_string();
        let after = text[end..].to_string();

        let id = self.next_marker_id;
        self.next_marker_id += 1;
        let marker = Node::Marker(Marker {
            id,
            class: MARKER_CLASS.to_string(),
            text: replacement.to_string(),
            title: format!("Original: {}", original),
            background: HIGHLIGHT.to_string(),
            padding: "0 2px".to_string(),
            transition: None,
        });

        let mut spliced = Vec::with_capacity(3);
        if !before.is_empty() {
            spliced.push(Node::Text(before));
        }
        spliced.push(marker);
        if !after.is_empty() {
            spliced.push(Node::Text(after));
        }
        self.nodes.splice(sel.node..=sel.node, spliced);

        Some(id)
    }
}

/// Per-page listener for `replaceWord` pushes.
#[derive(Clone)]
pub struct ContentScript {
    document: Arc<Mutex<Document>>,
}

impl ContentScript {
    pub fn new(document: Arc<Mutex<Document>>) -> Self {
        Self { document }
    }

    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.document)
    }

    /// Answer `replaceWord`; every other action is left for other listeners.
    pub async fn handle(&self, message: &ActionMessage) -> Option<ActionResponse> {
        let ActionMessage::ReplaceWord { simplified_word, original_text } = message else {
            return None;
        };

        let response = match self.replace_word(simplified_word, original_text.as_deref()).await {
            Ok(()) => ActionResponse::ok(),
            Err(err) => ActionResponse::failure(err.to_string()),
        };
        Some(response)
    }

    /// Replace the live selection with `replacement`.
    ///
    /// When `original` is given the live selection must still match it.
    pub async fn replace_word(&self, replacement: &str, original: Option<&str>) -> Result<(), ContentError> {
        let mut doc = self.document.lock().await;
        let selected = doc.selected_text();

        if selected.is_empty() || replacement.is_empty() {
            return Err(ContentError::NothingToReplace);
        }
        if original.is_some_and(|text| text != selected) {
            return Err(ContentError::SelectionChanged);
        }

        let id = doc
            .replace_selection(replacement, &selected)
            .ok_or(ContentError::NothingToReplace)?;
        doc.clear_selection();
        drop(doc);

        debug!(marker = id, "Replaced selection with simplified word");
        self.schedule_fade(id);
        Ok(())
    }

    fn schedule_fade(&self, id: u64) {
        let document = Arc::clone(&self.document);
        tokio::spawn(async move {
            tokio::time::sleep(FADE_DELAY).await;
            if let Some(marker) = document.lock().await.marker_mut(id) {
                marker.transition = Some(FADE_TRANSITION.to_string());
                marker.background = "transparent".to_string();
            }
        });
    }

    /// Answer messages delivered to this page until the bus closes.
    pub async fn serve(self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(Envelope { message, reply }) = rx.recv().await {
            match self.handle(&message).await {
                Some(response) => reply.send(response),
                None => reply.dismiss(),
            }
        }
    }
}
