//! Operations that record what ran, and when, into the execution params.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::bail;
use opgraph::dag::DependencyGraph;
use opgraph::exec::Operation;
use opgraph::types::{BufferUse, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started(NodeId),
    Finished(NodeId),
}

/// Execution params for [`RecordingOperation`]: an ordered event log plus a
/// high-water mark of concurrently running operations.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    events: Mutex<Vec<Event>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ExecutionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn start(&self, node: NodeId) {
        self.events.lock().unwrap().push(Event::Started(node));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn finish(&self, node: NodeId) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Finished(node));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Node ids in the order they started.
    pub fn started(&self) -> Vec<NodeId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(id) => Some(id),
                Event::Finished(_) => None,
            })
            .collect()
    }

    /// Sorted ids of nodes that started.
    pub fn started_set(&self) -> Vec<NodeId> {
        let mut ids = self.started();
        ids.sort_unstable();
        ids
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Panics unless every node started at most once and only after all of its
    /// in-edges had finished.
    pub fn assert_respects(&self, graph: &DependencyGraph) {
        let events = self.events();
        let mut finished_at: HashMap<NodeId, usize> = HashMap::new();
        let mut started_at: HashMap<NodeId, usize> = HashMap::new();
        for (pos, e) in events.iter().enumerate() {
            match *e {
                Event::Started(id) => {
                    assert!(
                        started_at.insert(id, pos).is_none(),
                        "node {id} started twice: {events:?}"
                    );
                }
                Event::Finished(id) => {
                    finished_at.insert(id, pos);
                }
            }
        }

        for (&id, &start) in &started_at {
            for &dep in &graph.nodes()[id].in_edges {
                let dep_done = finished_at.get(&dep).copied();
                assert!(
                    matches!(dep_done, Some(done) if done < start),
                    "node {id} started before dependency {dep} finished: {events:?}"
                );
            }
        }
    }
}

/// Meeting point for operations that must be running at the same time.
///
/// `arrive` blocks until all parties arrived or the timeout passes, so a
/// schedule that serialises the parties fails the test instead of hanging.
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    arrived: Mutex<usize>,
    cv: Condvar,
    met: AtomicBool,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Arc<Self> {
        Arc::new(Self {
            parties,
            arrived: Mutex::new(0),
            cv: Condvar::new(),
            met: AtomicBool::new(false),
        })
    }

    fn arrive(&self, timeout: Duration) {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        if *arrived >= self.parties {
            self.met.store(true, Ordering::SeqCst);
            self.cv.notify_all();
            return;
        }
        let _ = self
            .cv
            .wait_timeout_while(arrived, timeout, |n| *n < self.parties)
            .unwrap();
    }

    /// Whether all parties were present at once.
    pub fn met(&self) -> bool {
        self.met.load(Ordering::SeqCst)
    }
}

/// Configurable test operation logging into [`ExecutionLog`].
#[derive(Debug, Clone)]
pub struct RecordingOperation {
    id: NodeId,
    name: String,
    uses: Option<Vec<BufferUse>>,
    delay: Duration,
    fail: bool,
    panic: bool,
    rendezvous: Option<Arc<Rendezvous>>,
}

impl RecordingOperation {
    /// `id` must match the operation's position in the sequence.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: format!("op{id}"),
            uses: Some(Vec::new()),
            delay: Duration::ZERO,
            fail: false,
            panic: false,
            rendezvous: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn reads(mut self, buffer: &str) -> Self {
        self.uses.get_or_insert_with(Vec::new).push(BufferUse::read(buffer));
        self
    }

    pub fn writes(mut self, buffer: &str) -> Self {
        self.uses.get_or_insert_with(Vec::new).push(BufferUse::write(buffer));
        self
    }

    pub fn uses(mut self, uses: Vec<BufferUse>) -> Self {
        self.uses = Some(uses);
        self
    }

    pub fn unknown_uses(mut self) -> Self {
        self.uses = None;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn rendezvous(mut self, r: &Arc<Rendezvous>) -> Self {
        self.rendezvous = Some(Arc::clone(r));
        self
    }

    pub fn boxed(self) -> Box<dyn Operation<ExecutionLog>> {
        Box::new(self)
    }
}

impl Operation<ExecutionLog> for RecordingOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer_uses(&self) -> Option<&[BufferUse]> {
        self.uses.as_deref()
    }

    fn execute(&self, log: &ExecutionLog) -> anyhow::Result<()> {
        log.start(self.id);
        if let Some(r) = &self.rendezvous {
            r.arrive(Duration::from_secs(5));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        log.finish(self.id);

        if self.panic {
            panic!("{} panicked on purpose", self.name);
        }
        if self.fail {
            bail!("{} failed on purpose", self.name);
        }
        Ok(())
    }
}

/// One recording operation per entry of `uses`, ids in order.
pub fn ops_from_uses(uses: &[Vec<BufferUse>]) -> Vec<Box<dyn Operation<ExecutionLog>>> {
    uses.iter()
        .enumerate()
        .map(|(id, u)| RecordingOperation::new(id).uses(u.clone()).boxed())
        .collect()
}
