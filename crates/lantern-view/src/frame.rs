//! Line-delimited JSON framing for running a view over stdio.
//!
//! A shell hosting the view writes one [`InputFrame`] per line: posted
//! messages tagged with their origin, and the user gestures the surface
//! captured. The view answers with [`OutputFrame`]s: outbound protocol
//! messages and every surface operation.

use lantern_protocol::{Envelope, InboundFrame, ProtocolError, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::surface::{Surface, SurfaceOp};
use crate::view::View;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputFrame {
    /// A message posted into the view.
    Message { origin: String, data: Value },
    DragStart { card_id: String },
    Drop { container_id: String },
    DragEnd,
    OpenEditor { card_id: String },
    EditField { field: String, value: String },
    SaveEdit,
    CancelEdit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputFrame {
    /// A message posted to the parent.
    Message { target_origin: String, data: Envelope },
    Surface { op: SurfaceOp },
}

/// [`Transport`] that writes protocol messages as output frames.
pub struct FrameTransport {
    tx: mpsc::UnboundedSender<OutputFrame>,
    target_origin: String,
}

impl FrameTransport {
    pub fn new(tx: mpsc::UnboundedSender<OutputFrame>, target_origin: impl Into<String>) -> Self {
        Self {
            tx,
            target_origin: target_origin.into(),
        }
    }
}

impl Transport for FrameTransport {
    fn has_parent(&self) -> bool {
        true
    }

    fn post(&self, message: Envelope) -> Result<(), ProtocolError> {
        self.tx
            .send(OutputFrame::Message {
                target_origin: self.target_origin.clone(),
                data: message,
            })
            .map_err(|_| ProtocolError::TransportClosed)
    }
}

impl<S: Surface + 'static> View<S> {
    /// Apply one input frame.
    ///
    /// Gesture continuations are left running; their outcome surfaces as
    /// status operations.
    pub async fn dispatch(&self, frame: InputFrame) {
        match frame {
            InputFrame::Message { origin, data } => {
                self.handle_frame(&InboundFrame::new(origin, data)).await;
            }
            InputFrame::DragStart { card_id } => {
                self.drag_start(&card_id);
            }
            InputFrame::Drop { container_id } => {
                self.drop_on(&container_id);
            }
            InputFrame::DragEnd => self.drag_end(),
            InputFrame::OpenEditor { card_id } => {
                self.open_editor(&card_id);
            }
            InputFrame::EditField { field, value } => {
                self.edit_field(&field, &value);
            }
            InputFrame::SaveEdit => {
                self.save_edit();
            }
            InputFrame::CancelEdit => self.cancel_edit(),
        }
    }
}

/// Feed input frames to `view` until `reader` reaches EOF.
///
/// Malformed lines are logged and skipped.
pub async fn read_loop<R, S>(reader: R, view: &View<S>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Surface + 'static,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InputFrame>(line) {
            Ok(frame) => view.dispatch(frame).await,
            Err(e) => tracing::warn!(error = %e, "Skipping malformed input frame"),
        }
    }
    tracing::debug!("Input closed");
    Ok(())
}

/// Write output frames as JSON lines until every sender is gone.
pub async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<OutputFrame>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let mut line = serde_json::to_vec(&frame).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Wrap surface operations as output frames.
pub async fn forward_ops(
    mut ops: mpsc::UnboundedReceiver<SurfaceOp>,
    out: mpsc::UnboundedSender<OutputFrame>,
) {
    while let Some(op) = ops.recv().await {
        if out.send(OutputFrame::Surface { op }).is_err() {
            break;
        }
    }
}
