use crate::profile_scope;
use crossbeam::channel::{self, Receiver, Sender};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::particles::Particles;
use crate::simulation::EnergyReport;
use crate::utils::to_array;

/// Read-only copy of the state handed out between steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: usize,
    pub time: f64,
    pub pos: Vec<[f64; 3]>,
    pub vel: Vec<[f64; 3]>,
    pub acc: Vec<[f64; 3]>,
    pub species: Vec<usize>,
    #[serde(default)]
    pub image: Vec<[i64; 3]>,
    pub energy: EnergyReport,
}

impl Snapshot {
    pub fn capture(step: usize, time: f64, particles: &Particles, energy: EnergyReport) -> Self {
        Self {
            step,
            time,
            pos: particles.pos.iter().map(|&p| to_array(p)).collect(),
            vel: particles.vel.iter().map(|&v| to_array(v)).collect(),
            acc: particles.acc.iter().map(|&a| to_array(a)).collect(),
            species: particles.species.clone(),
            image: particles.image.clone(),
            energy,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Json,
    Binary,
}

/// Receiver of periodic snapshots. Failures stay inside the sink.
pub trait CheckpointSink: Send {
    /// Hand over a snapshot. Must not wait for it to reach storage.
    fn dump(&mut self, snapshot: &Snapshot);

    /// Wait until every snapshot handed over so far has been dealt with.
    fn flush(&mut self) {}
}

/// Where and how snapshot files are written.
#[derive(Clone, Debug)]
struct SnapshotLayout {
    dir: PathBuf,
    format: SaveFormat,
    compress: bool,
}

impl SnapshotLayout {
    fn path_for(&self, step: usize) -> PathBuf {
        let ext = match self.format {
            SaveFormat::Json => "json",
            SaveFormat::Binary => "bin",
        };
        let name = if self.compress {
            format!("snapshot_{step:08}.{ext}.gz")
        } else {
            format!("snapshot_{step:08}.{ext}")
        };
        self.dir.join(name)
    }
}

#[derive(Debug, Default)]
struct WriterStats {
    written: AtomicUsize,
    failures: AtomicUsize,
}

enum WriterMsg {
    Write(Box<Snapshot>),
    Flush(Sender<()>),
}

/// Writes `snapshot_{step:08}.{json|bin}[.gz]` into a directory.
///
/// `dump` only queues the snapshot. A dedicated writer thread saves it,
/// retrying a failed write before counting it as lost.
pub struct FileCheckpoint {
    layout: SnapshotLayout,
    tx: Option<Sender<WriterMsg>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<WriterStats>,
}

impl FileCheckpoint {
    pub const RETRIES: usize = 2;

    pub fn new(dir: impl Into<PathBuf>, format: SaveFormat, compress: bool) -> std::io::Result<Self> {
        let layout = SnapshotLayout {
            dir: dir.into(),
            format,
            compress,
        };
        let stats = Arc::new(WriterStats::default());
        let (tx, rx) = channel::unbounded();
        let worker = {
            let layout = layout.clone();
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("checkpoint-writer".into())
                .spawn(move || write_loop(&layout, &rx, &stats))?
        };
        Ok(Self {
            layout,
            tx: Some(tx),
            worker: Some(worker),
            stats,
        })
    }

    pub fn path_for(&self, step: usize) -> PathBuf {
        self.layout.path_for(step)
    }

    /// Snapshots saved so far.
    pub fn written(&self) -> usize {
        self.stats.written.load(Ordering::Relaxed)
    }

    /// Snapshots dropped after exhausting the retries.
    pub fn failures(&self) -> usize {
        self.stats.failures.load(Ordering::Relaxed)
    }
}

fn write_loop(layout: &SnapshotLayout, rx: &Receiver<WriterMsg>, stats: &WriterStats) {
    for msg in rx.iter() {
        match msg {
            WriterMsg::Write(snapshot) => {
                let path = layout.path_for(snapshot.step);
                for attempt in 0..=FileCheckpoint::RETRIES {
                    match save_snapshot(&path, &snapshot, layout.format, layout.compress) {
                        Ok(()) => {
                            stats.written.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        Err(e) if attempt < FileCheckpoint::RETRIES => {
                            warn!("checkpoint {} failed ({e}), retrying", path.display());
                        }
                        Err(e) => {
                            error!("checkpoint {} failed: {e}", path.display());
                            stats.failures.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            WriterMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

impl CheckpointSink for FileCheckpoint {
    fn dump(&mut self, snapshot: &Snapshot) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(WriterMsg::Write(Box::new(snapshot.clone()))).is_err() {
            error!("checkpoint writer is gone, snapshot {} dropped", snapshot.step);
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn flush(&mut self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        let (ack_tx, ack_rx) = channel::bounded(1);
        if tx.send(WriterMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for FileCheckpoint {
    fn drop(&mut self) {
        // closing the channel ends the writer once the queue is drained
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("checkpoint writer panicked");
            }
        }
    }
}

/// Keeps snapshots in memory.
#[derive(Default)]
pub struct MemoryCheckpoint {
    pub snapshots: Vec<Snapshot>,
}

impl CheckpointSink for MemoryCheckpoint {
    fn dump(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }
}

fn to_io<E: std::error::Error + Send + Sync + 'static>(e: E) -> std::io::Error {
    std::io::Error::other(e)
}

pub fn save_snapshot<P: AsRef<Path>>(
    path: P,
    snapshot: &Snapshot,
    format: SaveFormat,
    compress: bool,
) -> std::io::Result<()> {
    profile_scope!("save_snapshot");
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // write beside the target, then rename over it
    let tmp_path = path.with_extension({
        let mut os = path.extension().map(|e| e.to_os_string()).unwrap_or_default();
        os.push(".tmp");
        os
    });
    {
        let file = std::fs::File::create(&tmp_path)?;
        let writer = BufWriter::new(file);
        match (format, compress) {
            (SaveFormat::Json, false) => {
                let mut writer = writer;
                serde_json::to_writer(&mut writer, snapshot).map_err(to_io)?;
                writer.flush()?;
            }
            (SaveFormat::Json, true) => {
                let mut encoder = GzEncoder::new(writer, Compression::fast());
                serde_json::to_writer(&mut encoder, snapshot).map_err(to_io)?;
                let mut writer = encoder.finish()?;
                writer.flush()?;
            }
            (SaveFormat::Binary, false) => {
                let mut writer = writer;
                bincode::serialize_into(&mut writer, snapshot).map_err(to_io)?;
                writer.flush()?;
            }
            (SaveFormat::Binary, true) => {
                let mut encoder = GzEncoder::new(writer, Compression::fast());
                bincode::serialize_into(&mut encoder, snapshot).map_err(to_io)?;
                let mut writer = encoder.finish()?;
                writer.flush()?;
            }
        }
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> std::io::Result<Snapshot> {
    profile_scope!("load_snapshot");
    let data = std::fs::read(path.as_ref())?;
    match maybe_decompress_gzip(&data)? {
        Some(decoded) => parse_snapshot_bytes(&decoded),
        None => parse_snapshot_bytes(&data),
    }
}

fn parse_snapshot_bytes(bytes: &[u8]) -> std::io::Result<Snapshot> {
    if let Ok(snapshot) = serde_json::from_slice::<Snapshot>(bytes) {
        return Ok(snapshot);
    }
    if let Ok(snapshot) = bincode::deserialize::<Snapshot>(bytes) {
        return Ok(snapshot);
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "failed to parse snapshot: not valid JSON or binary format",
    ))
}

fn maybe_decompress_gzip(data: &[u8]) -> std::io::Result<Option<Vec<u8>>> {
    if data.len() < 2 || data[0] != 0x1f || data[1] != 0x8b {
        return Ok(None);
    }

    let mut decoder = GzDecoder::new(Cursor::new(data));
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            step: 42,
            time: 0.42,
            pos: vec![[1.0, 2.0, 3.0], [0.5, 0.25, 0.125]],
            vel: vec![[0.0; 3]; 2],
            acc: vec![[-1.0, 0.0, 1.0]; 2],
            species: vec![0, 1],
            image: vec![[0, 1, -1]; 2],
            energy: EnergyReport::default(),
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plasma_md_io_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn every_format_reads_back() {
        let dir = scratch_dir("formats");
        let snap = sample();
        for format in [SaveFormat::Json, SaveFormat::Binary] {
            for compress in [false, true] {
                let mut sink = FileCheckpoint::new(&dir, format, compress).unwrap();
                sink.dump(&snap);
                sink.flush();
                assert_eq!(sink.written(), 1);
                let path = sink.path_for(42);
                assert!(path.exists());
                assert_eq!(load_snapshot(&path).unwrap(), snap);
            }
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_names_follow_step() {
        let sink = FileCheckpoint::new("out", SaveFormat::Binary, true).unwrap();
        assert_eq!(sink.path_for(7), PathBuf::from("out/snapshot_00000007.bin.gz"));
    }

    #[test]
    fn unwritable_directory_counts_failures_on_the_writer() {
        let dir = scratch_dir("blocked");
        std::fs::create_dir_all(&dir).unwrap();
        // a plain file where the snapshot directory should be
        let blocker = dir.join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut sink = FileCheckpoint::new(&blocker, SaveFormat::Json, false).unwrap();
        let mut snap = sample();
        for step in [1, 2, 3] {
            snap.step = step;
            sink.dump(&snap);
        }
        sink.flush();
        assert_eq!(sink.written(), 0);
        assert_eq!(sink.failures(), 3);
        drop(sink);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn dropping_the_sink_drains_the_queue() {
        let dir = scratch_dir("drain");
        let mut snap = sample();
        {
            let mut sink = FileCheckpoint::new(&dir, SaveFormat::Binary, false).unwrap();
            for step in 0..8 {
                snap.step = step;
                sink.dump(&snap);
            }
        }
        for step in 0..8 {
            assert!(dir.join(format!("snapshot_{step:08}.bin")).exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
