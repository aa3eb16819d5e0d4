use redb::ReadableTable;
use uuid::Uuid;

use super::{db_err, next_seq, owner_prefix, owner_upper_bound, task_key, Store, META, TASKS, TASK_INDEX, TASK_SEQ};
use crate::error::{PomoError, Result};
use crate::task::Task;
use crate::types::OwnerId;

impl Store {
    /// All tasks of `owner` in creation order.
    pub fn list_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>> {
        let lo = owner_prefix(owner);
        let hi = owner_upper_bound(owner);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TASKS).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.range(lo.as_slice()..hi.as_slice()).map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let task: Task = serde_json::from_slice(v.value())?;
            result.push(task);
        }
        Ok(result)
    }

    /// Create a task for `owner`. Fails with `Validation` on an empty or
    /// over-long description.
    pub fn add_task(&self, owner: &OwnerId, description: &str) -> Result<Task> {
        let task = Task::new(owner.clone(), description)?;
        let value = serde_json::to_vec(&task)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut meta = wt.open_table(META).map_err(db_err)?;
            let seq = next_seq(&mut meta, TASK_SEQ)?;

            let key = task_key(owner, seq);
            let mut tasks = wt.open_table(TASKS).map_err(db_err)?;
            tasks
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            let mut index = wt.open_table(TASK_INDEX).map_err(db_err)?;
            index
                .insert(task.id.as_bytes().as_slice(), key.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;

        tracing::debug!(owner = %owner, task = %task.id, "task added");
        Ok(task)
    }

    /// Set the completion flag of one of `owner`'s tasks.
    ///
    /// Fails with `TaskNotFound` when no such task exists (including a
    /// malformed id) and `TaskForbidden` when it belongs to someone else.
    pub fn set_task_completion(
        &self,
        owner: &OwnerId,
        task_id: &str,
        is_completed: bool,
    ) -> Result<Task> {
        let id = Uuid::parse_str(task_id)
            .map_err(|_| PomoError::TaskNotFound(task_id.to_string()))?;

        let wt = self.db.begin_write().map_err(db_err)?;
        let task = {
            let index = wt.open_table(TASK_INDEX).map_err(db_err)?;
            let key = index
                .get(id.as_bytes().as_slice())
                .map_err(db_err)?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| PomoError::TaskNotFound(task_id.to_string()))?;

            let mut tasks = wt.open_table(TASKS).map_err(db_err)?;
            let raw = tasks
                .get(key.as_slice())
                .map_err(db_err)?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| PomoError::TaskNotFound(task_id.to_string()))?;
            let mut task: Task = serde_json::from_slice(&raw)?;
            if &task.owner != owner {
                return Err(PomoError::TaskForbidden(task_id.to_string()));
            }

            task.is_completed = is_completed;
            let value = serde_json::to_vec(&task)?;
            tasks
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            task
        };
        wt.commit().map_err(db_err)?;
        Ok(task)
    }

    /// Delete every completed task of `owner`; returns how many were removed.
    pub fn delete_completed_tasks(&self, owner: &OwnerId) -> Result<usize> {
        let lo = owner_prefix(owner);
        let hi = owner_upper_bound(owner);

        let wt = self.db.begin_write().map_err(db_err)?;
        let deleted = {
            let mut tasks = wt.open_table(TASKS).map_err(db_err)?;
            let mut doomed: Vec<(Vec<u8>, Uuid)> = Vec::new();
            for entry in tasks.range(lo.as_slice()..hi.as_slice()).map_err(db_err)? {
                let (k, v) = entry.map_err(db_err)?;
                let task: Task = serde_json::from_slice(v.value())?;
                if task.is_completed {
                    doomed.push((k.value().to_vec(), task.id));
                }
            }

            let mut index = wt.open_table(TASK_INDEX).map_err(db_err)?;
            for (key, id) in &doomed {
                tasks.remove(key.as_slice()).map_err(db_err)?;
                index.remove(id.as_bytes().as_slice()).map_err(db_err)?;
            }
            doomed.len()
        };
        wt.commit().map_err(db_err)?;

        tracing::debug!(owner = %owner, deleted, "completed tasks cleared");
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
