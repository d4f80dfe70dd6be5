//! Debounced search and paging for list views.
//!
//! [`SearchState`] holds the page position and the search term and decides
//! when a list query is due. [`SearchController`] drives it from a tokio
//! task: keystrokes arm a debounce timer, and a query is emitted once the
//! input has been quiet for the whole window and the term differs from the
//! last one issued. Page changes are emitted immediately.

use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::models::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Monotonic per controller; lets a list view drop stale responses.
    pub seq: u64,
    pub page: u32,
    pub size: u32,
    pub search: String,
}

impl ListQuery {
    /// Query-string pairs for the gateway. `search` is omitted when empty.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        if !self.search.is_empty() {
            params.push(("search", self.search.clone()));
        }
        params
    }
}

#[derive(Debug, Clone)]
pub struct SearchState {
    term: String,
    /// Last term that went through [`settle`](Self::settle). Starts empty,
    /// the term of the initial unfiltered list.
    settled: String,
    page: u32,
    size: u32,
    seq: u64,
}

impl SearchState {
    pub fn new(size: u32) -> Self {
        SearchState {
            term: String::new(),
            settled: String::new(),
            page: 0,
            size,
            seq: 0,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The query for the current position; used on view entry and after
    /// create/update/delete. A term still inside its debounce window goes
    /// out at the current page and is settled (back to page 0) later.
    pub fn refresh(&mut self) -> ListQuery {
        self.issue()
    }

    /// Records raw text. Nothing is issued until [`settle`](Self::settle).
    pub fn input(&mut self, text: &str) {
        self.term = text.to_string();
    }

    /// Called once the debounce window has passed without new input.
    pub fn settle(&mut self) -> Option<ListQuery> {
        if self.settled == self.term {
            return None;
        }
        self.settled = self.term.clone();
        self.page = 0;
        Some(self.issue())
    }

    pub fn page_change(&mut self, page: u32, size: u32) -> ListQuery {
        self.page = page;
        self.size = size;
        self.issue()
    }

    fn issue(&mut self) -> ListQuery {
        self.seq += 1;
        ListQuery {
            seq: self.seq,
            page: self.page,
            size: self.size,
            search: self.term.clone(),
        }
    }
}

#[derive(Debug)]
enum Event {
    Input(String),
    Page { page: u32, size: u32 },
    Refresh,
}

/// Input side of a running [`SearchController`].
#[derive(Debug, Clone)]
pub struct SearchHandle {
    tx: UnboundedSender<Event>,
}

impl SearchHandle {
    pub fn on_input(&self, text: impl Into<String>) {
        self.send(Event::Input(text.into()));
    }

    pub fn on_page_change(&self, page: u32, size: u32) {
        self.send(Event::Page { page, size });
    }

    pub fn refresh(&self) {
        self.send(Event::Refresh);
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("search controller stopped; event dropped");
        }
    }
}

pub struct SearchController {
    state: SearchState,
    debounce: Duration,
    events: UnboundedReceiver<Event>,
    queries: UnboundedSender<ListQuery>,
}

impl SearchController {
    /// Starts a controller task. The first query (page 0, no search) is
    /// emitted right away. The task ends when every handle is dropped or
    /// the query receiver goes away.
    pub fn spawn(
        page_size: u32,
        debounce: Duration,
    ) -> (SearchHandle, UnboundedReceiver<ListQuery>, JoinHandle<()>) {
        let (tx, events) = mpsc::unbounded_channel();
        let (queries, rx) = mpsc::unbounded_channel();
        let controller = SearchController {
            state: SearchState::new(page_size),
            debounce,
            events,
            queries,
        };
        let task = tokio::spawn(controller.run());
        (SearchHandle { tx }, rx, task)
    }

    async fn run(mut self) {
        let first = self.state.refresh();
        if !self.emit(first) {
            return;
        }
        let mut deadline: Option<Instant> = None;
        loop {
            let armed = deadline;
            let timer = async move {
                match armed {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                event = self.events.recv() => {
                    let query = match event {
                        None => break,
                        Some(Event::Input(text)) => {
                            self.state.input(&text);
                            deadline = Some(Instant::now() + self.debounce);
                            None
                        }
                        Some(Event::Page { page, size }) => Some(self.state.page_change(page, size)),
                        Some(Event::Refresh) => Some(self.state.refresh()),
                    };
                    if let Some(q) = query {
                        if !self.emit(q) {
                            break;
                        }
                    }
                }
                _ = timer => {
                    deadline = None;
                    if let Some(q) = self.state.settle() {
                        if !self.emit(q) {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn emit(&self, query: ListQuery) -> bool {
        tracing::debug!(seq = query.seq, page = query.page, size = query.size, search = %query.search, "list query");
        self.queries.send(query).is_ok()
    }
}

/// State of one paginated list view.
#[derive(Debug, Clone)]
pub struct PagedList<T> {
    items: Vec<T>,
    total: u64,
    issued: u64,
    applied: u64,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        PagedList {
            items: Vec::new(),
            total: 0,
            issued: 0,
            applied: 0,
        }
    }
}

impl<T> PagedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, query: &ListQuery) {
        self.issued = self.issued.max(query.seq);
    }

    /// Installs a response. Returns false, leaving state alone, when a
    /// newer response has already been applied.
    pub fn apply(&mut self, seq: u64, page: Page<T>) -> bool {
        if seq < self.applied {
            tracing::debug!(seq, applied = self.applied, "stale list response ignored");
            return false;
        }
        self.applied = seq;
        self.items = page.content;
        self.total = page.total_elements;
        true
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.applied < self.issued
    }
}
