//! Shared helpers for end-to-end tests: a temporary project directory and
//! rule actions that count their invocations.

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use assert_fs::TempDir;
use camino::Utf8PathBuf;
use gantry::core::Config;
use gantry::core::TargetId;
use gantry::handlers::CookedTarget;

pub struct Project {
    root: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.root.path().to_str().unwrap())
    }

    pub fn store_path(&self) -> Utf8PathBuf {
        self.path()
            .join(gantry::DEFAULT_STORE_DIR_NAME)
            .join(gantry::STORE_FILE_NAME)
    }

    /// Identifier of an on-disk file target inside the project.
    pub fn file_target(&self, rel: &str) -> TargetId {
        TargetId::from(format!("{}/{rel}#", self.path()))
    }

    /// Identifier of an on-disk directory target inside the project.
    pub fn folder_target(&self, rel: &str) -> TargetId {
        TargetId::from(format!("{}/{rel}/", self.path()))
    }

    pub fn write(&self, rel: &str, contents: &str) {
        fs::write(self.path().join(rel), contents).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path().join(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path().join(rel).exists()
    }
}

pub type Counter = Rc<Cell<u32>>;

pub fn counter() -> Counter {
    Rc::new(Cell::new(0))
}

/// Rule action copying its single input file to its single output file.
pub fn copy_action(
    runs: &Counter,
) -> impl Fn(&[CookedTarget], &[CookedTarget], &Config) -> Result<()> + 'static {
    let runs = Rc::clone(runs);
    move |outputs, inputs, _config| {
        runs.set(runs.get() + 1);
        let input = inputs[0].as_path().context("expected on-disk input")?;
        let output = outputs[0].as_path().context("expected on-disk output")?;
        fs::copy(input, output)?;
        Ok(())
    }
}

/// Rule action concatenating all input files into its single output file.
pub fn concat_action(
    runs: &Counter,
) -> impl Fn(&[CookedTarget], &[CookedTarget], &Config) -> Result<()> + 'static {
    let runs = Rc::clone(runs);
    move |outputs, inputs, _config| {
        runs.set(runs.get() + 1);
        let mut contents = String::new();
        for input in inputs {
            let path = input.as_path().context("expected on-disk input")?;
            contents.push_str(&fs::read_to_string(path)?);
        }
        let output = outputs[0].as_path().context("expected on-disk output")?;
        fs::write(output, contents)?;
        Ok(())
    }
}

/// Rule action writing a marker to every on-disk output, ignoring inputs.
pub fn touch_action(
    runs: &Counter,
) -> impl Fn(&[CookedTarget], &[CookedTarget], &Config) -> Result<()> + 'static {
    let runs = Rc::clone(runs);
    move |outputs, _inputs, _config| {
        runs.set(runs.get() + 1);
        for output in outputs {
            if let Some(path) = output.as_path() {
                fs::write(path, "done")?;
            }
        }
        Ok(())
    }
}
