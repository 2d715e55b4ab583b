//! Parallel batch driver.
//!
//! A batch runs in two phases over a rayon worker pool: first every rename
//! request is resaved from its old path to its new path (with self-identity
//! rewrites), then every designated reference-holding file is rewritten in
//! place through a sibling temp file. Failures are recorded per file and
//! never abort the batch; only explicit cancellation stops it, checked at
//! each task's entry.

use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rayon::prelude::*;
use talos_common::{ReadSeek, ReadSeekExt};
use talos_stream::{DestStream, StreamProfile};

use crate::binary::resave_binary_meta;
use crate::lua::resave_lua;
use crate::nfo::resave_level_info;
use crate::plain::copy_verbatim;
use crate::rename::{RenameMap, ResaveFile};
use crate::sniff::{sniff_format, PayloadFormat};
use crate::textmeta::resave_text_meta;
use crate::{Error, Result};

/// Sniff an unwrapped payload and apply the matching resaver.
pub fn resave_stream<W: Write>(
    mut reader: Box<dyn ReadSeek>,
    rel_path: &str,
    out: &mut W,
    renames: &RenameMap,
    new_asset_fn: Option<&str>,
) -> Result<()> {
    let head = reader.peek_at_most(16)?;
    match sniff_format(&head, rel_path) {
        PayloadFormat::BinaryMeta => resave_binary_meta(reader, out, renames, new_asset_fn),
        PayloadFormat::TextMeta => {
            resave_text_meta(BufReader::new(reader), out, renames, new_asset_fn)
        }
        PayloadFormat::LevelInfo => resave_level_info(BufReader::new(reader), out, renames),
        PayloadFormat::Lua => resave_lua(BufReader::new(reader), out, renames),
        PayloadFormat::Opaque => copy_verbatim(&mut reader, out).map(|_| ()),
    }
}

/// Events emitted by [`BatchDriver::run_with_events`].
#[derive(Clone, Debug)]
pub enum BatchEvent {
    /// A unit of work finished (success or failure).
    Progress { done: usize, total: usize },
    /// A rename resave failed.
    ResaveFailed { file: ResaveFile, message: String },
    /// A reference update failed.
    UpdateFailed { path: String, message: String },
    /// Both phases ran to completion (or cancellation).
    Completed,
}

/// Result of one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Units of work that ran (success or failure).
    pub completed: usize,
    /// Whether the batch was cancelled before finishing.
    pub cancelled: bool,
    /// Per-file failures from the rename phase.
    pub resave_errors: Vec<(ResaveFile, Error)>,
    /// Per-file failures from the reference-update phase.
    pub update_errors: Vec<(String, Error)>,
}

impl BatchOutcome {
    /// Whether every unit of work succeeded.
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.resave_errors.is_empty() && self.update_errors.is_empty()
    }
}

/// Runs rename batches against one game root with one stream profile.
pub struct BatchDriver {
    root: PathBuf,
    profile: StreamProfile,
}

impl BatchDriver {
    /// Driver for a game root and output profile.
    pub fn new(root: impl Into<PathBuf>, profile: StreamProfile) -> Self {
        Self {
            root: root.into(),
            profile,
        }
    }

    /// Game root this driver operates under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run both phases; `progress` is called once per finished unit.
    pub fn run<F>(
        &self,
        files: &[ResaveFile],
        references: &[String],
        cancel: &AtomicBool,
        mut progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(usize, usize) + Send,
    {
        let renames = RenameMap::from_files(files);
        let total = files.len() + references.len();
        let done = AtomicUsize::new(0);
        let progress = Mutex::new(&mut progress);
        let tick = || {
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            let mut progress = progress.lock();
            (*progress)(finished, total);
        };

        let resave_errors = Mutex::new(Vec::new());
        files.par_iter().for_each(|file| {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            if let Err(error) = self.resave_one(file, &renames) {
                let _ = fs::remove_file(self.root.join(&file.new_path));
                resave_errors.lock().push((file.clone(), error));
            }
            tick();
        });

        let update_errors = Mutex::new(Vec::new());
        references.par_iter().for_each(|rel_path| {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            if let Err(error) = self.update_one(rel_path, &renames) {
                update_errors.lock().push((rel_path.clone(), error));
            }
            tick();
        });

        let cancelled = cancel.load(Ordering::Relaxed);
        let resave_errors = resave_errors.into_inner();
        let update_errors = update_errors.into_inner();

        if !cancelled {
            // Deletion failures are deliberately ignored: the rename itself
            // succeeded and the stale original is harmless.
            for file in files {
                let failed = resave_errors.iter().any(|(f, _)| f == file);
                if file.delete_old && !failed && file.old_path != file.new_path {
                    let _ = fs::remove_file(self.root.join(&file.old_path));
                }
            }
        }

        BatchOutcome {
            completed: done.load(Ordering::Relaxed),
            cancelled,
            resave_errors,
            update_errors,
        }
    }

    /// [`run`](Self::run), reporting over a channel instead of a callback.
    pub fn run_with_events(
        &self,
        files: &[ResaveFile],
        references: &[String],
        cancel: &AtomicBool,
        events: Sender<BatchEvent>,
    ) -> BatchOutcome {
        let progress = events.clone();
        let outcome = self.run(files, references, cancel, move |done, total| {
            let _ = progress.send(BatchEvent::Progress { done, total });
        });

        for (file, error) in &outcome.resave_errors {
            let _ = events.send(BatchEvent::ResaveFailed {
                file: file.clone(),
                message: error.to_string(),
            });
        }
        for (path, error) in &outcome.update_errors {
            let _ = events.send(BatchEvent::UpdateFailed {
                path: path.clone(),
                message: error.to_string(),
            });
        }
        let _ = events.send(BatchEvent::Completed);
        outcome
    }

    fn resave_one(&self, file: &ResaveFile, renames: &RenameMap) -> Result<()> {
        let source = self.root.join(&file.old_path);
        let dest = self.root.join(&file.new_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let reader = talos_stream::open_file(&source)?;
        let mut out = DestStream::create(&dest, &file.new_path, self.profile)?;
        resave_stream(
            reader,
            &file.old_path,
            &mut out,
            renames,
            Some(&file.new_path),
        )?;
        out.finish()?;
        Ok(())
    }

    fn update_one(&self, rel_path: &str, renames: &RenameMap) -> Result<()> {
        let original = self.root.join(rel_path);
        let temp = sibling_temp_path(&original);

        let written = (|| -> Result<()> {
            let reader = talos_stream::open_file(&original)?;
            let mut out = DestStream::create(&temp, rel_path, self.profile)?;
            resave_stream(reader, rel_path, &mut out, renames, None)?;
            out.finish()?;
            Ok(())
        })();

        match written {
            Ok(()) => {
                if let Err(error) = fs::rename(&temp, &original) {
                    let _ = fs::remove_file(&temp);
                    return Err(error.into());
                }
                Ok(())
            }
            Err(error) => {
                let _ = fs::remove_file(&temp);
                Err(error)
            }
        }
    }
}

/// Temp path next to `original`, keeping the extension so the output
/// wrapper gating matches the original file.
fn sibling_temp_path(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("resave");
    let name = match original.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}~.{ext}"),
        None => format!("{stem}~"),
    };
    original.with_file_name(name)
}
