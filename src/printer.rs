//! Serialized terminal output.
//!
//! Every print is turned into a [`PrintResource`] and pushed onto one FIFO
//! queue. A single writer thread owns the real output streams and writes the
//! resources one by one, so output coming from the loop and from handlers never
//! interleaves. [`Printer::wait`] is the barrier the loop uses before showing
//! the next prompt.

use std::fmt::Display;
use std::io::{self, Result as IoResult, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::warn;

pub const ERROR_MARKER: &str = "\x1b[91m[-]\x1b[0m";
pub const STATUS_MARKER: &str = "\x1b[94m[*]\x1b[0m";
pub const SUCCESS_MARKER: &str = "\x1b[92m[+]\x1b[0m";

/// Which stream a resource goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Stdout,
    Stderr,
}

/// One deferred print: items joined by `sep`, followed by `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintResource {
    items: Vec<String>,
    sep: String,
    end: String,
    destination: Destination,
}

impl PrintResource {
    /// Creates a resource printed to stdout, space separated, ending in a newline.
    ///
    /// # Arguments
    /// * `items` - Anything displayable. Each item is rendered right away.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        Self {
            items: items.into_iter().map(|i| i.to_string()).collect(),
            sep: " ".to_string(),
            end: "\n".to_string(),
            destination: Destination::Stdout,
        }
    }

    pub fn sep(mut self, sep: impl Into<String>) -> Self {
        self.sep = sep.into();
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = end.into();
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// # Returns
    /// The exact text written: the items joined by `sep`, then `end`.
    pub fn render(&self) -> String {
        let mut out = self.items.join(&self.sep);
        out.push_str(&self.end);
        out
    }

    fn with_marker(mut self, marker: &str) -> Self {
        self.items.insert(0, marker.to_string());
        self
    }
}

/// The streams owned by the writer thread.
pub struct Sink {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl Sink {
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The process's standard output and error.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }

    /// Both destinations into one in-memory buffer.
    pub fn buffer(buffer: &SharedBuffer) -> Self {
        Self::new(buffer.clone(), buffer.clone())
    }

    /// Writes one rendered resource to its destination and flushes it.
    ///
    /// # Arguments
    /// * `resource` - What to write and where.
    fn write(&mut self, resource: &PrintResource) -> IoResult<()> {
        let target = match resource.destination {
            Destination::Stdout => &mut self.stdout,
            Destination::Stderr => &mut self.stderr,
        };
        target.write_all(resource.render().as_bytes())?;
        target.flush()
    }
}

/// Thread-safe growable byte buffer, for capturing output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Return the contents and empty the buffer.
    pub fn take(&self) -> String {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let out = String::from_utf8_lossy(&buf).into_owned();
        buf.clear();
        out
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

enum Message {
    Print(PrintResource),
    Barrier(Sender<()>),
}

/// Handle to the output queue. Cheap to clone and usable from any thread.
#[derive(Debug, Clone)]
pub struct Printer {
    queue: Sender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Print(resource) => f.debug_tuple("Print").field(resource).finish(),
            Message::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

impl Printer {
    /// Start the writer thread over `sink`.
    ///
    /// The thread lives until the last handle is dropped.
    pub fn spawn(sink: Sink) -> IoResult<Self> {
        let (queue, rx) = mpsc::channel();
        thread::Builder::new()
            .name("retort-printer".to_string())
            .spawn(move || run_writer(rx, sink))?;
        Ok(Self { queue })
    }

    pub fn stdio() -> IoResult<Self> {
        Self::spawn(Sink::stdio())
    }

    /// Enqueue a resource without blocking.
    pub fn put(&self, resource: PrintResource) {
        if self.queue.send(Message::Print(resource)).is_err() {
            warn!("printer thread is gone, dropping output");
        }
    }

    /// Block until everything enqueued before this call has been written.
    pub fn wait(&self) {
        let (done, reached) = mpsc::channel();
        if self.queue.send(Message::Barrier(done)).is_err() {
            return;
        }
        let _ = reached.recv();
    }

    /// Enqueue `items` for stdout, separated by spaces.
    ///
    /// # Arguments
    /// * `items` - Anything displayable, e.g. `["sum:", "42"]` or `args.iter()`.
    pub fn print<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.put(PrintResource::new(items));
    }

    pub fn info<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.print(items);
    }

    /// Like [`Printer::print`], prefixed with [`ERROR_MARKER`].
    pub fn error<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.put(PrintResource::new(items).with_marker(ERROR_MARKER));
    }

    pub fn status<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.put(PrintResource::new(items).with_marker(STATUS_MARKER));
    }

    pub fn success<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.put(PrintResource::new(items).with_marker(SUCCESS_MARKER));
    }

    /// An empty line.
    pub fn newline(&self) {
        self.print(std::iter::empty::<&str>());
    }
}

/// Body of the writer thread: drains the queue in order until every sender
/// is dropped.
///
/// # Arguments
/// * `rx` - The receiving end of the printer queue.
/// * `sink` - Where print messages are written. Barriers are acknowledged
///   once everything queued before them has been written.
fn run_writer(rx: Receiver<Message>, mut sink: Sink) {
    for message in rx {
        match message {
            Message::Print(resource) => {
                if let Err(err) = sink.write(&resource) {
                    warn!(error = %err, "failed to write output");
                }
            }
            Message::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
