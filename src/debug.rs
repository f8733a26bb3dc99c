//! Observers for intermediate pipeline state.
//!
//! Stages report the buffer they just produced together with a verbosity
//! level: 1 for a stage result, 2 for key intermediates, 3 for every step.
//! Observers only ever see shared references, so they cannot change what a
//! stage computes.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};

/// A borrowed view of whatever buffer a stage step produced.
#[derive(Clone, Copy)]
pub enum Frame<'a> {
    Gray(&'a GrayImage),
    Rgb(&'a RgbImage),
    Image(&'a DynamicImage),
}

impl Frame<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Frame::Gray(img) => img.dimensions(),
            Frame::Rgb(img) => img.dimensions(),
            Frame::Image(img) => (img.width(), img.height()),
        }
    }

    fn save(&self, path: &Path) -> image::ImageResult<()> {
        match self {
            Frame::Gray(img) => img.save(path),
            Frame::Rgb(img) => img.save(path),
            Frame::Image(img) => img.save(path),
        }
    }
}

pub trait StageObserver {
    /// Highest level this observer wants to see; stages skip the call for
    /// anything above it.
    fn level(&self) -> u8;

    fn show(&mut self, level: u8, step: &str, frame: Frame<'_>);
}

/// Forward `frame` to `obs` if it asked for this level.
pub(crate) fn show(obs: &mut dyn StageObserver, level: u8, step: &str, frame: Frame<'_>) {
    if level <= obs.level() {
        obs.show(level, step, frame);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn level(&self) -> u8 {
        0
    }

    fn show(&mut self, _level: u8, _step: &str, _frame: Frame<'_>) {}
}

/// Logs every observed step as a `tracing` event.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    pub level: u8,
}

impl StageObserver for TracingObserver {
    fn level(&self) -> u8 {
        self.level
    }

    fn show(&mut self, level: u8, step: &str, frame: Frame<'_>) {
        let (width, height) = frame.dimensions();
        tracing::trace!(verbosity = level, step, width, height, "intermediate");
    }
}

/// Writes each observed step as a numbered PNG into a directory.
#[derive(Debug)]
pub struct DumpObserver {
    dir: PathBuf,
    level: u8,
    counter: usize,
    written: Vec<PathBuf>,
}

impl DumpObserver {
    pub fn new<P: AsRef<Path>>(dir: P, level: u8) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            level,
            counter: 0,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl StageObserver for DumpObserver {
    fn level(&self) -> u8 {
        self.level
    }

    fn show(&mut self, _level: u8, step: &str, frame: Frame<'_>) {
        let name = format!("{:03}_{}.png", self.counter, step.replace('/', "_"));
        self.counter += 1;
        let path = self.dir.join(name);
        match frame.save(&path) {
            Ok(()) => self.written.push(path),
            // never fails the stage
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to dump intermediate"),
        }
    }
}
