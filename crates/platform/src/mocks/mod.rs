//! Mock implementations for testing
//!
//! This module provides in-memory implementations of all platform traits
//! for use in unit and integration tests and in the host simulator.
//! [`MemoryStorage`] supports per-operation fault injection, which is how
//! power loss in the middle of a persist is simulated.

#![cfg(any(test, feature = "std"))]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::external_ram::{check_range, ExternalRam, RamError};
use crate::panel::{PanelBus, PanelError};
use crate::power::{EntropySource, PowerMonitor, SleepScheduler, WakeSource};
use crate::storage::{DirEntry, File, Storage};

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Storage operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageOp {
    /// [`Storage::mount`]
    Mount,
    /// [`Storage::open_file`]
    Open,
    /// [`Storage::create_file`]
    Create,
    /// [`File::read`]
    Read,
    /// [`File::write`]
    Write,
    /// [`File::flush`]
    Flush,
    /// [`Storage::remove`]
    Remove,
    /// [`Storage::rename`]
    Rename,
    /// [`Storage::read_dir`]
    ReadDir,
}

/// Errors produced by [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStorageError {
    /// No entry at the given path.
    #[error("no such file or directory")]
    NotFound,
    /// A file was used where a directory is required.
    #[error("not a directory")]
    NotADirectory,
    /// A directory was used where a file is required.
    #[error("is a directory")]
    IsADirectory,
    /// Rename target already exists.
    #[error("target already exists")]
    AlreadyExists,
    /// Failure injected with [`MemoryStorage::fail`].
    #[error("injected {0:?} failure")]
    Injected(StorageOp),
}

#[derive(Clone)]
enum Node {
    Dir { hidden: bool },
    File { data: Rc<RefCell<Vec<u8>>>, hidden: bool },
}

#[derive(Default)]
struct Faults {
    grace: BTreeMap<StorageOp, u32>,
    remaining: BTreeMap<StorageOp, u32>,
    calls: BTreeMap<StorageOp, u32>,
    write_budget: Option<usize>,
}

impl Faults {
    fn hit(&mut self, op: StorageOp) -> Result<(), MemoryStorageError> {
        let calls = self.calls.entry(op).or_insert(0);
        *calls = calls.saturating_add(1);
        if let Some(n) = self.grace.get_mut(&op).filter(|n| **n > 0) {
            *n = n.saturating_sub(1);
            return Ok(());
        }
        match self.remaining.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n = n.saturating_sub(1);
                Err(MemoryStorageError::Injected(op))
            }
            _ => Ok(()),
        }
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len().saturating_add(1));
    out.push('/');
    out.push_str(trimmed);
    out
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// In-memory filesystem.
///
/// Every entry occupies a directory slot, handed out like FAT does: the
/// lowest slot left free in the parent. The slot is the entry's locator and
/// listings come in slot order. Removing an entry leaves its slot empty, so
/// the locators of its siblings never change.
pub struct MemoryStorage {
    nodes: BTreeMap<String, Node>,
    slots: BTreeMap<String, u16>,
    faults: Rc<RefCell<Faults>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Empty card with only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::from("/"), Node::Dir { hidden: false });
        Self { nodes, slots: BTreeMap::new(), faults: Rc::new(RefCell::new(Faults::default())) }
    }

    /// Create directory `path` and any missing parents.
    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        self.ensure_dir(&path, false);
        self
    }

    /// Create a hidden directory.
    pub fn add_hidden_dir(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        self.ensure_dir(&path, true);
        self
    }

    /// Create file `path` with `contents`, creating missing parents.
    pub fn add_file(&mut self, path: &str, contents: &[u8]) -> &mut Self {
        self.insert_file(path, contents, false);
        self
    }

    /// Create a file carrying the filesystem's hidden attribute.
    pub fn add_hidden_file(&mut self, path: &str, contents: &[u8]) -> &mut Self {
        self.insert_file(path, contents, true);
        self
    }

    /// Current contents of file `path`.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.get(&normalize(path)) {
            Some(Node::File { data, .. }) => Some(data.borrow().clone()),
            _ => None,
        }
    }

    /// Whether `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(&normalize(path))
    }

    /// Make the next `times` calls of `op` fail.
    pub fn fail(&mut self, op: StorageOp, times: u32) -> &mut Self {
        self.faults.borrow_mut().remaining.insert(op, times);
        self
    }

    /// Let the next `successes` calls of `op` through, then fail `times`.
    pub fn fail_after(&mut self, op: StorageOp, successes: u32, times: u32) -> &mut Self {
        let mut faults = self.faults.borrow_mut();
        faults.grace.insert(op, successes);
        faults.remaining.insert(op, times);
        drop(faults);
        self
    }

    /// Make every call of `op` fail from now on.
    pub fn fail_always(&mut self, op: StorageOp) -> &mut Self {
        self.fail(op, u32::MAX)
    }

    /// Accept only `bytes` more written bytes in total, then report the
    /// card as full by accepting zero bytes per write.
    pub fn limit_writes(&mut self, bytes: usize) -> &mut Self {
        self.faults.borrow_mut().write_budget = Some(bytes);
        self
    }

    /// Number of times `op` has been attempted.
    pub fn calls(&self, op: StorageOp) -> u32 {
        self.faults.borrow().calls.get(&op).copied().unwrap_or(0)
    }

    fn ensure_dir(&mut self, path: &str, hidden: bool) {
        if path != "/" {
            let parent = String::from(parent_of(path));
            self.ensure_dir(&parent, false);
        }
        if !self.nodes.contains_key(path) {
            self.claim_slot(path);
            self.nodes.insert(String::from(path), Node::Dir { hidden });
        }
    }

    fn insert_file(&mut self, path: &str, contents: &[u8], hidden: bool) {
        let path = normalize(path);
        let parent = String::from(parent_of(&path));
        self.ensure_dir(&parent, false);
        self.put_file(path, Rc::new(RefCell::new(contents.to_vec())), hidden);
    }

    /// Store a file node, keeping the slot of an entry it replaces.
    fn put_file(&mut self, path: String, data: Rc<RefCell<Vec<u8>>>, hidden: bool) {
        if !self.slots.contains_key(&path) {
            self.claim_slot(&path);
        }
        self.nodes.insert(path, Node::File { data, hidden });
    }

    /// Give `path` the lowest slot no sibling occupies.
    fn claim_slot(&mut self, path: &str) {
        if path == "/" {
            return;
        }
        let parent = parent_of(path);
        let used: BTreeSet<u16> = self
            .slots
            .iter()
            .filter(|(p, _)| p.as_str() != path && parent_of(p) == parent)
            .map(|(_, slot)| *slot)
            .collect();
        let slot = (0..=u16::MAX).find(|s| !used.contains(s)).unwrap_or(u16::MAX);
        self.slots.insert(String::from(path), slot);
    }

    /// Slot of `path`, if it has one.
    pub fn slot_of(&self, path: &str) -> Option<u16> {
        self.slots.get(&normalize(path)).copied()
    }

    fn listing(&self, dir: &str) -> Result<Vec<DirEntry>, MemoryStorageError> {
        let dir = normalize(dir);
        match self.nodes.get(&dir) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(MemoryStorageError::NotADirectory),
            None => return Err(MemoryStorageError::NotFound),
        }
        let mut entries: Vec<DirEntry> = self
            .nodes
            .iter()
            .filter(|(path, _)| path.as_str() != dir && parent_of(path) == dir)
            .filter_map(|(path, node)| {
                let slot = self.slots.get(path).copied()?;
                let (is_dir, hidden) = match node {
                    Node::Dir { hidden } => (true, *hidden),
                    Node::File { hidden, .. } => (false, *hidden),
                };
                Some(DirEntry::new(slot, name_of(path), is_dir, hidden))
            })
            .collect();
        entries.sort_by_key(|e| e.locator);
        Ok(entries)
    }
}

/// An open [`MemoryStorage`] file.
pub struct MemoryFile {
    data: Rc<RefCell<Vec<u8>>>,
    pos: usize,
    faults: Rc<RefCell<Faults>>,
}

impl File for MemoryFile {
    type Error = MemoryStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Read)?;
        let data = self.data.borrow();
        let available = data.get(self.pos..).unwrap_or(&[]);
        let n = available.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), available.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let accepted = {
            let mut faults = self.faults.borrow_mut();
            faults.hit(StorageOp::Write)?;
            match faults.write_budget.as_mut() {
                Some(budget) => {
                    let n = buf.len().min(*budget);
                    *budget = budget.saturating_sub(n);
                    n
                }
                None => buf.len(),
            }
        };
        let buf = buf.get(..accepted).unwrap_or(&[]);
        let mut data = self.data.borrow_mut();
        let end = self.pos.saturating_add(buf.len());
        if data.len() < end {
            data.resize(end, 0);
        }
        if let Some(dst) = data.get_mut(self.pos..end) {
            dst.copy_from_slice(buf);
        }
        self.pos = end;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Flush)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX);
        Ok(pos)
    }

    fn size(&self) -> u64 {
        u64::try_from(self.data.borrow().len()).unwrap_or(u64::MAX)
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryStorageError;
    type File = MemoryFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Mount)
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Open)?;
        match self.nodes.get(&normalize(path)) {
            Some(Node::File { data, .. }) => {
                Ok(MemoryFile { data: Rc::clone(data), pos: 0, faults: Rc::clone(&self.faults) })
            }
            Some(Node::Dir { .. }) => Err(MemoryStorageError::IsADirectory),
            None => Err(MemoryStorageError::NotFound),
        }
    }

    async fn create_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Create)?;
        let path = normalize(path);
        match self.nodes.get(parent_of(&path)) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(MemoryStorageError::NotADirectory),
            None => return Err(MemoryStorageError::NotFound),
        }
        if let Some(Node::Dir { .. }) = self.nodes.get(&path) {
            return Err(MemoryStorageError::IsADirectory);
        }
        let data = Rc::new(RefCell::new(Vec::new()));
        self.put_file(path, Rc::clone(&data), false);
        Ok(MemoryFile { data, pos: 0, faults: Rc::clone(&self.faults) })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.contains(path))
    }

    async fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Remove)?;
        let path = normalize(path);
        match self.nodes.get(&path) {
            Some(Node::File { .. }) => {
                self.nodes.remove(&path);
                self.slots.remove(&path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(MemoryStorageError::IsADirectory),
            None => Err(MemoryStorageError::NotFound),
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        self.faults.borrow_mut().hit(StorageOp::Rename)?;
        let (from, to) = (normalize(from), normalize(to));
        if self.nodes.contains_key(&to) {
            return Err(MemoryStorageError::AlreadyExists);
        }
        let node = self.nodes.remove(&from).ok_or(MemoryStorageError::NotFound)?;
        self.slots.remove(&from);
        self.claim_slot(&to);
        self.nodes.insert(to, node);
        Ok(())
    }

    async fn read_dir<F>(&mut self, path: &str, mut visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>,
    {
        self.faults.borrow_mut().hit(StorageOp::ReadDir)?;
        for entry in self.listing(path)? {
            if visit(&entry).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn entry_at(&mut self, dir: &str, locator: u16) -> Result<Option<DirEntry>, Self::Error> {
        Ok(self.listing(dir)?.into_iter().find(|e| e.locator == locator))
    }
}

// ---------------------------------------------------------------------------
// RecordingPanel
// ---------------------------------------------------------------------------

/// One transaction seen by [`RecordingPanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Reset line pulsed.
    Reset,
    /// Command byte.
    Command(u8),
    /// Data bytes; consecutive `data` calls are merged.
    Data(Vec<u8>),
}

/// Behaviour of the emulated busy line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyLine {
    /// No busy pin wired.
    Absent,
    /// Settles at once: reads LOW after a POWER_OFF (0x02) command and
    /// HIGH (idle) after anything else, like an ACeP controller.
    Responsive,
    /// Always reads this level.
    Stuck(bool),
}

/// A [`PanelBus`] that records everything sent to it.
pub struct RecordingPanel {
    events: Vec<PanelEvent>,
    busy: BusyLine,
    last_command: Option<u8>,
    busy_polls: usize,
}

impl RecordingPanel {
    /// Panel with the given busy-line behaviour.
    pub fn new(busy: BusyLine) -> Self {
        Self { events: Vec::new(), busy, last_command: None, busy_polls: 0 }
    }

    /// Everything recorded so far.
    pub fn events(&self) -> &[PanelEvent] {
        &self.events
    }

    /// Only the command bytes, in order.
    pub fn commands(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PanelEvent::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Data sent after the `nth` occurrence of command `cmd`.
    pub fn data_after(&self, cmd: u8, nth: usize) -> Option<&[u8]> {
        let pos = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == PanelEvent::Command(cmd))
            .nth(nth)
            .map(|(i, _)| i)?;
        match self.events.get(pos.saturating_add(1)) {
            Some(PanelEvent::Data(d)) => Some(d.as_slice()),
            _ => None,
        }
    }

    /// How often the busy line was sampled.
    pub fn busy_polls(&self) -> usize {
        self.busy_polls
    }
}

impl PanelBus for RecordingPanel {
    async fn command(&mut self, cmd: u8) -> Result<(), PanelError> {
        self.last_command = Some(cmd);
        self.events.push(PanelEvent::Command(cmd));
        Ok(())
    }

    async fn data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        if let Some(PanelEvent::Data(prev)) = self.events.last_mut() {
            prev.extend_from_slice(data);
        } else {
            self.events.push(PanelEvent::Data(data.to_vec()));
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), PanelError> {
        self.events.push(PanelEvent::Reset);
        Ok(())
    }

    fn busy_level(&mut self) -> Result<Option<bool>, PanelError> {
        self.busy_polls = self.busy_polls.saturating_add(1);
        Ok(match self.busy {
            BusyLine::Absent => None,
            BusyLine::Responsive => Some(self.last_command != Some(0x02)),
            BusyLine::Stuck(level) => Some(level),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryRam
// ---------------------------------------------------------------------------

/// Heap-backed [`ExternalRam`] that counts bus transactions.
pub struct MemoryRam {
    bytes: Vec<u8>,
    reads: usize,
    writes: usize,
}

impl MemoryRam {
    /// Zero-filled memory of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { bytes: vec![0; capacity], reads: 0, writes: 0 }
    }

    /// Raw contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of read transactions.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of write transactions.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ExternalRam for MemoryRam {
    type Error = RamError;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        check_range::<core::convert::Infallible>(offset, buf.len(), self.bytes.len())?;
        let src = self
            .bytes
            .get(offset..offset.saturating_add(buf.len()))
            .ok_or(RamError::OutOfRange { offset, len: buf.len() })?;
        buf.copy_from_slice(src);
        self.reads = self.reads.saturating_add(1);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        check_range::<core::convert::Infallible>(offset, data.len(), self.bytes.len())?;
        let dst = self
            .bytes
            .get_mut(offset..offset.saturating_add(data.len()))
            .ok_or(RamError::OutOfRange { offset, len: data.len() })?;
        dst.copy_from_slice(data);
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<(), Self::Error> {
        check_range::<core::convert::Infallible>(offset, len, self.bytes.len())?;
        if let Some(dst) = self.bytes.get_mut(offset..offset.saturating_add(len)) {
            dst.fill(value);
        }
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

// ---------------------------------------------------------------------------
// Power, sleep, entropy, delay
// ---------------------------------------------------------------------------

/// Entropy source returning the same sample every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u32);

impl EntropySource for FixedEntropy {
    fn sample(&mut self) -> u32 {
        self.0
    }
}

/// Battery monitor reporting a fixed voltage.
#[derive(Debug, Clone, Copy)]
pub struct MockPower {
    /// Value returned by [`PowerMonitor::battery_voltage_mv`].
    pub voltage_mv: Option<u16>,
}

impl PowerMonitor for MockPower {
    fn battery_voltage_mv(&mut self) -> Option<u16> {
        self.voltage_mv
    }
}

/// Sleep scheduler that records sleep requests and returns.
#[derive(Debug, Clone)]
pub struct MockSleep {
    wake: WakeSource,
    requests: Vec<u64>,
}

impl MockSleep {
    /// Scheduler that reports `wake` as the wake reason.
    pub fn new(wake: WakeSource) -> Self {
        Self { wake, requests: Vec::new() }
    }

    /// Durations passed to every `deep_sleep` call.
    pub fn requests(&self) -> &[u64] {
        &self.requests
    }
}

impl SleepScheduler for MockSleep {
    fn wake_reason(&mut self) -> WakeSource {
        self.wake
    }

    async fn deep_sleep(&mut self, duration_us: u64) {
        self.requests.push(duration_us);
    }
}

/// Async delay that returns immediately and logs what was asked of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    millis: Vec<u32>,
    total_ns: u64,
}

impl RecordingDelay {
    /// New delay with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments of every `delay_ms` call.
    pub fn millis(&self) -> &[u32] {
        &self.millis
    }

    /// Sum of all requested delays in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns = self.total_ns.saturating_add(u64::from(ns));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.millis.push(ms);
        self.total_ns = self.total_ns.saturating_add(u64::from(ms).saturating_mul(1_000_000));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::storage::{read_full, write_all};

    #[tokio::test]
    async fn memory_storage_write_then_read() {
        let mut fs = MemoryStorage::new();
        let mut f = fs.create_file("/a.bin").await.unwrap();
        assert!(write_all(&mut f, b"abc").await.unwrap());
        f.flush().await.unwrap();
        drop(f);

        let mut f = fs.open_file("/a.bin").await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut f, &mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(fs.contents("a.bin").unwrap(), b"abc");
    }

    #[tokio::test]
    async fn injected_failures_are_counted_and_expire() {
        let mut fs = MemoryStorage::new();
        fs.fail(StorageOp::Mount, 2);
        assert!(fs.mount().await.is_err());
        assert!(fs.mount().await.is_err());
        assert!(fs.mount().await.is_ok());
        assert_eq!(fs.calls(StorageOp::Mount), 3);
    }

    #[tokio::test]
    async fn delayed_failures_start_after_the_grace_calls() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/a.bin", &[7; 8]).fail_after(StorageOp::Read, 1, 1);
        let mut f = fs.open_file("/a.bin").await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).await, Ok(4));
        assert_eq!(f.read(&mut buf).await, Err(MemoryStorageError::Injected(StorageOp::Read)));
        assert_eq!(f.read(&mut buf).await, Ok(4));
    }

    #[tokio::test]
    async fn listing_follows_slots_with_flags() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/photos/b.raw", b"")
            .add_file("/photos/a.raw", b"")
            .add_hidden_file("/photos/c.raw", b"")
            .add_dir("/photos/sub")
            .add_file("/photos/sub/deep.raw", b"");

        let mut names = Vec::new();
        fs.read_dir("/photos", |e| {
            names.push((e.name.as_str().to_owned(), e.locator, e.is_dir, e.is_hidden));
            ControlFlow::Continue(())
        })
        .await
        .unwrap();

        assert_eq!(
            names,
            [
                ("b.raw".to_owned(), 0, false, false),
                ("a.raw".to_owned(), 1, false, false),
                ("c.raw".to_owned(), 2, false, true),
                ("sub".to_owned(), 3, true, false),
            ]
        );
        let e = fs.entry_at("/photos/sub", 0).await.unwrap().unwrap();
        assert_eq!(e.name.as_str(), "deep.raw");
    }

    #[tokio::test]
    async fn removal_leaves_a_gap_that_the_next_file_fills() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/p/a.raw", b"a").add_file("/p/b.raw", b"b").add_file("/p/c.raw", b"c");
        fs.remove("/p/a.raw").await.unwrap();

        assert_eq!(fs.entry_at("/p", 0).await.unwrap(), None);
        assert_eq!(fs.entry_at("/p", 1).await.unwrap().unwrap().name.as_str(), "b.raw");
        assert_eq!(fs.entry_at("/p", 2).await.unwrap().unwrap().name.as_str(), "c.raw");

        // Rewriting a file keeps its slot; a new one takes the gap.
        fs.create_file("/p/c.raw").await.unwrap();
        fs.create_file("/p/d.raw").await.unwrap();
        assert_eq!(fs.slot_of("/p/c.raw"), Some(2));
        assert_eq!(fs.slot_of("/p/d.raw"), Some(0));
    }

    #[tokio::test]
    async fn rename_requires_free_target() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/a", b"1").add_file("/b", b"2");
        assert_eq!(fs.rename("/a", "/b").await, Err(MemoryStorageError::AlreadyExists));
        fs.remove("/b").await.unwrap();
        fs.rename("/a", "/b").await.unwrap();
        assert_eq!(fs.contents("/b").unwrap(), b"1");
        assert!(!fs.contains("/a"));
    }

    #[tokio::test]
    async fn panel_merges_consecutive_data() {
        let mut panel = RecordingPanel::new(BusyLine::Responsive);
        panel.command(0x10).await.unwrap();
        panel.data(&[1, 2]).await.unwrap();
        panel.data(&[3]).await.unwrap();
        panel.command(0x02).await.unwrap();
        assert_eq!(panel.data_after(0x10, 0), Some(&[1u8, 2, 3][..]));
        assert_eq!(panel.busy_level().unwrap(), Some(false));
        panel.command(0x04).await.unwrap();
        assert_eq!(panel.busy_level().unwrap(), Some(true));
        assert_eq!(panel.commands(), [0x10, 0x02, 0x04]);
    }

    #[test]
    fn memory_ram_bounds() {
        let mut ram = MemoryRam::new(4);
        ram.write_u8(3, 0xAB).unwrap();
        assert_eq!(ram.read_u8(3).unwrap(), 0xAB);
        assert!(ram.write_u8(4, 0).is_err());
        ram.fill(0, 4, 0x11).unwrap();
        assert_eq!(ram.bytes(), &[0x11; 4]);
    }
}
