//! The polling loop itself. Watches three directories on a fixed interval,
//! in the style of `watchdog.observers.polling.PollingObserver` rather than
//! an OS-level inotify/kqueue watch - a full re-scan every tick, diffed
//! against the last-consumed checkpoint per source.

use std::path::{Path, PathBuf};

use router_integration::{Checkpoints, load_checkpoints, store_checkpoints};
use router_markets::{Order, Position, Signal, Trade};
use tracing::{debug, warn};

use crate::callback_file::{parse_order_line, parse_position_line, parse_trade_line};
use crate::error::ObserverError;
use crate::signal_file::{parse_signal_filename, parse_signal_line};

/// Where the observer looks for each kind of file, and where it persists
/// offsets.
#[derive(Debug, Clone)]
pub struct ObserverPaths {
    pub xq_signals_dir: PathBuf,
    pub order_callback_file: PathBuf,
    pub trade_callback_file: PathBuf,
    pub position_callback_file: PathBuf,
    pub checkpoints_path: PathBuf,
}

/// Position callback files are truncated once they accumulate this many
/// lines, matching the original's 2000-line cap.
pub const POSITION_TRUNCATE_LINES: usize = 2000;

/// Anything the observer can hand to the engine.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    Signal(Signal),
    Order(Order),
    Trade(Trade),
    Position(Position),
}

/// Reads whole-file contents and returns only the lines past
/// `already_consumed`, plus the new total line count.
fn read_new_lines(path: &Path, already_consumed: u64) -> std::io::Result<(Vec<String>, u64)> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), already_consumed)),
        Err(err) => return Err(err),
    };

    let all_lines: Vec<&str> = contents.lines().collect();
    let start = already_consumed as usize;
    if start > all_lines.len() {
        // File was truncated/reset underneath us; resume from scratch.
        return Ok((all_lines.into_iter().map(str::to_string).collect(), all_lines.len() as u64));
    }

    let new_lines = all_lines[start..].iter().map(|s| s.to_string()).collect();
    Ok((new_lines, all_lines.len() as u64))
}

/// Watches the signal, order, trade and position sources, resolving
/// strategy names to ids via `resolve_strategy_id`, and returns every new
/// event found this pass. Checkpoints are updated and persisted before
/// returning, so a crash between polls never replays already-seen lines.
pub struct Observer<'a> {
    pub paths: ObserverPaths,
    pub id_allocator: &'a router_integration::SignalIdAllocator,
    pub resolve_strategy_id: Box<dyn Fn(&str) -> Option<i64> + Send + Sync + 'a>,
    checkpoints: Checkpoints,
}

impl<'a> Observer<'a> {
    pub fn load(
        paths: ObserverPaths,
        id_allocator: &'a router_integration::SignalIdAllocator,
        resolve_strategy_id: impl Fn(&str) -> Option<i64> + Send + Sync + 'a,
    ) -> Result<Self, ObserverError> {
        let checkpoints = load_checkpoints(&paths.checkpoints_path)?;
        Ok(Self { paths, id_allocator, resolve_strategy_id: Box::new(resolve_strategy_id), checkpoints })
    }

    fn persist_checkpoints(&self) -> Result<(), ObserverError> {
        store_checkpoints(&self.paths.checkpoints_path, &self.checkpoints).map_err(ObserverError::from)
    }

    /// Resets every checkpoint to zero, used during the engine's twice-daily
    /// reset lifecycle.
    pub fn reset_checkpoints(&mut self) -> Result<(), ObserverError> {
        self.checkpoints = Checkpoints::default();
        self.persist_checkpoints()
    }

    fn poll_signal_directory(&mut self, events: &mut Vec<ObserverEvent>) -> Result<(), ObserverError> {
        let dir = match std::fs::read_dir(&self.paths.xq_signals_dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(ObserverError::Io { path: self.paths.xq_signals_dir.display().to_string(), source });
            }
        };

        for entry in dir.flatten() {
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Ok((sdate, strategy_name)) = parse_signal_filename(filename) else {
                warn!(filename, "skipping unrecognised signal filename");
                continue;
            };

            let checkpoint_key = format!("xq_signals::{filename}");
            let already_consumed = self.checkpoints.get(&checkpoint_key);
            let (new_lines, total) = read_new_lines(&path, already_consumed)
                .map_err(|source| ObserverError::Io { path: path.display().to_string(), source })?;

            let Some(strategy_id) = (self.resolve_strategy_id)(&strategy_name) else {
                debug!(strategy_name, "unknown strategy in signal filename, ignoring lines");
                self.checkpoints.set(checkpoint_key, total);
                continue;
            };

            for line in new_lines {
                match parse_signal_line(&line, strategy_id, sdate, self.id_allocator.next()) {
                    Ok(signal) => events.push(ObserverEvent::Signal(signal)),
                    Err(err) => warn!(%err, line, "failed to parse signal line, skipping"),
                }
            }

            self.checkpoints.set(checkpoint_key, total);
        }

        Ok(())
    }

    fn poll_order_callbacks(&mut self, events: &mut Vec<ObserverEvent>) -> Result<(), ObserverError> {
        let already_consumed = self.checkpoints.get("order_callbacks.orders");
        let (new_lines, total) = read_new_lines(&self.paths.order_callback_file, already_consumed)
            .map_err(|source| ObserverError::Io { path: self.paths.order_callback_file.display().to_string(), source })?;

        for line in new_lines {
            match parse_order_line(&line) {
                Ok(order) => events.push(ObserverEvent::Order(order)),
                Err(err) => warn!(%err, line, "failed to parse order callback line, skipping"),
            }
        }

        self.checkpoints.set("order_callbacks.orders", total);
        Ok(())
    }

    fn poll_trade_callbacks(&mut self, events: &mut Vec<ObserverEvent>) -> Result<(), ObserverError> {
        let already_consumed = self.checkpoints.get("order_callbacks.trades");
        let (new_lines, total) = read_new_lines(&self.paths.trade_callback_file, already_consumed)
            .map_err(|source| ObserverError::Io { path: self.paths.trade_callback_file.display().to_string(), source })?;

        for line in new_lines {
            match parse_trade_line(&line) {
                Ok(trade) => events.push(ObserverEvent::Trade(trade)),
                Err(err) => warn!(%err, line, "failed to parse trade callback line, skipping"),
            }
        }

        self.checkpoints.set("order_callbacks.trades", total);
        Ok(())
    }

    fn poll_position_callbacks(&mut self, events: &mut Vec<ObserverEvent>) -> Result<(), ObserverError> {
        let already_consumed = self.checkpoints.get("order_callbacks.positions");
        let (new_lines, mut total) = read_new_lines(&self.paths.position_callback_file, already_consumed)
            .map_err(|source| ObserverError::Io { path: self.paths.position_callback_file.display().to_string(), source })?;

        for line in &new_lines {
            match parse_position_line(line, 0) {
                Ok(Some(position)) => events.push(ObserverEvent::Position(position)),
                Ok(None) => {}
                Err(err) => warn!(%err, line, "failed to parse position callback line, skipping"),
            }
        }

        if total as usize > POSITION_TRUNCATE_LINES {
            if std::fs::write(&self.paths.position_callback_file, "").is_ok() {
                total = 0;
            }
        }

        self.checkpoints.set("order_callbacks.positions", total);
        Ok(())
    }

    /// Runs one poll pass over every source, returning the events discovered
    /// and persisting advanced checkpoints.
    pub fn poll_once(&mut self) -> Result<Vec<ObserverEvent>, ObserverError> {
        let mut events = Vec::new();
        self.poll_signal_directory(&mut events)?;
        self.poll_order_callbacks(&mut events)?;
        self.poll_trade_callbacks(&mut events)?;
        self.poll_position_callbacks(&mut events)?;
        self.persist_checkpoints()?;
        Ok(events)
    }
}

impl std::fmt::Debug for Observer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer").field("paths", &self.paths).finish_non_exhaustive()
    }
}
