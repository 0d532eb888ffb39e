//! The renderer bus over newline-delimited JSON.
//!
//! One loop owns the [`Session`]. It reads renderer messages line by line,
//! reacts to index refreshes and file-watcher events, and writes queued host
//! messages in order after every step.

use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use codeflow_core::link::relative_label;
use codeflow_core::{
    CodeflowError, Config, EditorSurface, HostMessage, RendererChannel, RendererMessage, Result,
    Session,
};

use crate::error::HostError;
use crate::watcher::SelfWrites;

/// Something that happened outside the renderer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The diagram index was invalidated.
    IndexRefreshed,
    /// Diagram-like files changed on disk.
    FilesChanged(Vec<PathBuf>),
}

/// [`RendererChannel`] backed by the loop's outbound queue.
struct QueueChannel(UnboundedSender<HostMessage>);

impl RendererChannel for QueueChannel {
    fn post(&mut self, message: HostMessage) -> Result<()> {
        self.0.send(message).map_err(|_| CodeflowError::ChannelClosed)
    }
}

pub struct Bus {
    session: Session,
    outbox: UnboundedReceiver<HostMessage>,
    events_tx: UnboundedSender<BusEvent>,
    events: UnboundedReceiver<BusEvent>,
    self_writes: SelfWrites,
}

impl Bus {
    pub fn new(
        root: Option<PathBuf>,
        config: &Config,
        editor: Box<dyn EditorSurface + Send>,
    ) -> Self {
        let (outbox_tx, outbox) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        let mut session = Session::new(root, config, Box::new(QueueChannel(outbox_tx)), editor);
        let refreshed = events_tx.clone();
        session.index_mut().subscribe(move |_| {
            let _ = refreshed.send(BusEvent::IndexRefreshed);
        });

        Self {
            session,
            outbox,
            events_tx,
            events,
            self_writes: SelfWrites::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sender for events produced outside the loop, e.g. by the watcher.
    pub fn events(&self) -> UnboundedSender<BusEvent> {
        self.events_tx.clone()
    }

    /// Serves until `reader` reaches end of input.
    pub async fn run<R, W>(&mut self, reader: R, writer: &mut W) -> Result<(), HostError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line),
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event),
            }
            self.drain_events();
            self.flush(writer).await?;
        }
        self.drain_events();
        self.flush(writer).await
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let message = match RendererMessage::from_json(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error:% = err; "Ignoring malformed renderer message");
                return;
            }
        };
        debug!(message:? = message; "Renderer message");

        let result = match message {
            RendererMessage::SaveDiag { data } => self
                .session
                .save_diagram(data)
                .map(|path| self.self_writes.record(path)),
            other => self.session.dispatch(other),
        };
        if let Err(err) = result {
            self.report(&err);
        }
    }

    fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::IndexRefreshed => {
                if self.session.root().is_none() {
                    return;
                }
                if let Err(err) = self.session.push_listing() {
                    self.report(&err);
                }
            }
            BusEvent::FilesChanged(paths) => {
                let external: Vec<PathBuf> = paths
                    .into_iter()
                    .filter(|path| !self.self_writes.is_recent(path))
                    .collect();
                if external.is_empty() {
                    return;
                }
                if let Some(root) = self.session.root().map(Path::to_path_buf) {
                    for label in external.iter().filter_map(|p| relative_label(&root, p)) {
                        if self.session.index_mut().forget_saved(&label) {
                            debug!(label = label.as_str(); "Saved diagram changed on disk");
                        }
                    }
                }
                debug!(paths = external.len(); "Workspace changed on disk");
                self.session.index_mut().refresh();
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn report(&mut self, err: &CodeflowError) {
        error!(kind:? = err.kind(), error:% = err; "Renderer request failed");
        if let Err(err) = self.session.report(err) {
            error!(error:% = err; "Cannot report failure to renderer");
        }
    }

    async fn flush<W>(&mut self, writer: &mut W) -> Result<(), HostError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut wrote = false;
        while let Ok(message) = self.outbox.try_recv() {
            let mut line = message.to_json()?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            wrote = true;
        }
        if wrote {
            writer.flush().await?;
        }
        Ok(())
    }
}
