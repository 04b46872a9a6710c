use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::DashError;
use crate::task::{Status, Task};

const TASKS_FILE: &str = "tasks.data";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

/// Result of flipping a task's completion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub id: u64,
    pub previous: Status,
    #[serde(rename = "new_status")]
    pub current: Status,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")
                .with_context(|| format!("failed to create {}", tasks_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    pub fn next_id(&self, tasks: &[Task]) -> u64 {
        tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    #[tracing::instrument(skip(self, tasks, task), fields(id = task.id))]
    pub fn add_task(&self, mut tasks: Vec<Task>, task: Task) -> anyhow::Result<Vec<Task>> {
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(anyhow!("task id {} already exists", task.id));
        }
        tasks.push(task);
        tasks.sort_by_key(|t| t.id);
        self.save_tasks(&tasks)?;
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, now))]
    pub fn toggle_task(&self, id: u64, now: DateTime<Utc>) -> anyhow::Result<ToggleOutcome> {
        let mut tasks = self.load_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(DashError::TaskNotFound(id))?;

        let previous = task.status;
        let current = task.toggle(now);
        debug!(id, %previous, %current, "toggled task");

        self.save_tasks(&tasks)?;
        Ok(ToggleOutcome {
            id,
            previous,
            current,
        })
    }
}

/// One task per line; blank lines are skipped.
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let tasks = reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(
                serde_json::from_str::<Task>(text.trim())
                    .with_context(|| format!("{}:{}: malformed task", path.display(), idx + 1)),
            ),
            Err(err) => Some(Err(err.into())),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(file = %path.display(), count = tasks.len(), "read task file");
    Ok(tasks)
}

/// Writes beside the target, then renames over it.
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot stage a write in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        for task in tasks {
            serde_json::to_writer(&mut writer, task)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    staged
        .persist(path)
        .map_err(|err| anyhow!("cannot replace {}: {}", path.display(), err.error))?;
    debug!(file = %path.display(), count = tasks.len(), "wrote task file");
    Ok(())
}
