use std::path::Path;

use swapforge_core::error::ForgeError;
use swapforge_core::types::{EditMode, TaskId, TaskStatus, UserId};

use crate::kv_store::KvStore;
use crate::model::{Task, TaskErrorInfo, TaskResult, User};
use crate::object_store::ObjectStore;
use crate::relational_store::RelationalStore;

/// Persistent store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   users              — UserId bytes     → bincode(User)
///   users_by_email     — lowercased email → UserId bytes
///   tasks              — TaskId bytes     → bincode(Task)
///   verification_codes — email bytes      → bincode(VerificationCode)
///   objects            — file_id bytes    → raw object bytes
///   kv                 — key bytes        → bincode((value, expires_at))
///   kv_lists           — "<list>\0<seq>"  → raw item bytes
///   kv_list_meta       — "<list>:head|tail" → u64 be bytes
///   kv_sets            — "<set>\0<member>" → i64 be timestamp bytes
pub struct ForgeDb {
    _db: sled::Db,
    users: sled::Tree,
    users_by_email: sled::Tree,
    tasks: sled::Tree,
    verification_codes: sled::Tree,
    objects: sled::Tree,
    kv: sled::Tree,
    kv_lists: sled::Tree,
    kv_list_meta: sled::Tree,
    kv_sets: sled::Tree,
}

impl ForgeDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ForgeError> {
        let db = sled::open(path).map_err(|e| ForgeError::Storage(e.to_string()))?;
        let users = open_tree(&db, "users")?;
        let users_by_email = open_tree(&db, "users_by_email")?;
        let tasks = open_tree(&db, "tasks")?;
        let verification_codes = open_tree(&db, "verification_codes")?;
        let objects = open_tree(&db, "objects")?;
        let kv = open_tree(&db, "kv")?;
        let kv_lists = open_tree(&db, "kv_lists")?;
        let kv_list_meta = open_tree(&db, "kv_list_meta")?;
        let kv_sets = open_tree(&db, "kv_sets")?;
        Ok(Self {
            _db: db,
            users,
            users_by_email,
            tasks,
            verification_codes,
            objects,
            kv,
            kv_lists,
            kv_list_meta,
            kv_sets,
        })
    }

    pub fn flush(&self) -> Result<(), ForgeError> {
        self._db.flush().map_err(|e| ForgeError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Verification codes ───────────────────────────────────────────────────

    pub fn get_verification_code(
        &self,
        email: &str,
    ) -> Result<Option<crate::model::VerificationCode>, ForgeError> {
        match self
            .verification_codes
            .get(email.as_bytes())
            .map_err(|e| ForgeError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| ForgeError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_verification_code(
        &self,
        code: &crate::model::VerificationCode,
    ) -> Result<(), ForgeError> {
        let bytes = bincode::serialize(code).map_err(|e| ForgeError::Serialization(e.to_string()))?;
        self.verification_codes
            .insert(code.email.as_bytes(), bytes)
            .map_err(|e| ForgeError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn open_tree(db: &sled::Db, name: &str) -> Result<sled::Tree, ForgeError> {
    db.open_tree(name).map_err(|e| ForgeError::Storage(e.to_string()))
}

fn storage_err(e: sled::Error) -> ForgeError {
    ForgeError::Storage(e.to_string())
}

fn ser_err(e: Box<bincode::ErrorKind>) -> ForgeError {
    ForgeError::Serialization(e.to_string())
}

// ── ObjectStore ──────────────────────────────────────────────────────────────

impl ObjectStore for ForgeDb {
    fn put_object(&self, file_id: &str, bytes: &[u8]) -> Result<(), ForgeError> {
        self.objects
            .insert(file_id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    fn get_object(&self, file_id: &str) -> Result<Option<Vec<u8>>, ForgeError> {
        self.objects
            .get(file_id.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage_err)
    }

    fn object_exists(&self, file_id: &str) -> bool {
        self.objects.contains_key(file_id.as_bytes()).unwrap_or(false)
    }
}

// ── KvStore ──────────────────────────────────────────────────────────────────

impl KvStore for ForgeDb {
    fn put_with_ttl(&self, key: &str, value: &[u8], ttl_secs: i64, now: i64) -> Result<(), ForgeError> {
        let expires_at = if ttl_secs > 0 { now + ttl_secs } else { 0 };
        let entry: (Vec<u8>, i64) = (value.to_vec(), expires_at);
        let bytes = bincode::serialize(&entry).map_err(ser_err)?;
        self.kv.insert(key.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    fn get(&self, key: &str, now: i64) -> Result<Option<Vec<u8>>, ForgeError> {
        match self.kv.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let (value, expires_at): (Vec<u8>, i64) =
                    bincode::deserialize(&bytes).map_err(ser_err)?;
                if expires_at != 0 && expires_at <= now {
                    self.kv.remove(key.as_bytes()).map_err(storage_err)?;
                    Ok(None)
                } else {
                    Ok(Some(value))
                }
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), ForgeError> {
        self.kv.remove(key.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn list_push(&self, list: &str, value: &[u8]) -> Result<(), ForgeError> {
        let tail = self.list_meta_next(list, "tail")?;
        let key = list_item_key(list, tail);
        self.kv_lists.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    fn list_pop_front(&self, list: &str) -> Result<Option<Vec<u8>>, ForgeError> {
        let head = self.list_meta_get(list, "head")?;
        let tail = self.list_meta_get(list, "tail")?;
        if head >= tail {
            return Ok(None);
        }
        let key = list_item_key(list, head);
        let value = self.kv_lists.remove(&key).map_err(storage_err)?.map(|v| v.to_vec());
        self.list_meta_set(list, "head", head + 1)?;
        Ok(value)
    }

    fn list_len(&self, list: &str) -> Result<u64, ForgeError> {
        let head = self.list_meta_get(list, "head")?;
        let tail = self.list_meta_get(list, "tail")?;
        Ok(tail.saturating_sub(head))
    }

    fn set_add(&self, set: &str, member: &[u8]) -> Result<(), ForgeError> {
        let key = set_member_key(set, member);
        let now = chrono::Utc::now().timestamp().to_be_bytes();
        self.kv_sets.insert(key, &now).map_err(storage_err)?;
        Ok(())
    }

    fn set_remove(&self, set: &str, member: &[u8]) -> Result<(), ForgeError> {
        let key = set_member_key(set, member);
        self.kv_sets.remove(key).map_err(storage_err)?;
        Ok(())
    }

    fn set_contains(&self, set: &str, member: &[u8]) -> Result<bool, ForgeError> {
        let key = set_member_key(set, member);
        self.kv_sets.contains_key(key).map_err(storage_err)
    }

    fn set_len(&self, set: &str) -> Result<u64, ForgeError> {
        let prefix = format!("{set}\0");
        Ok(self.kv_sets.scan_prefix(prefix.as_bytes()).count() as u64)
    }

    fn set_members_with_timestamps(&self, set: &str) -> Result<Vec<(Vec<u8>, i64)>, ForgeError> {
        let prefix = format!("{set}\0");
        let mut out = Vec::new();
        for item in self.kv_sets.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item.map_err(storage_err)?;
            let member = key[prefix.len()..].to_vec();
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&value);
            out.push((member, i64::from_be_bytes(arr)));
        }
        Ok(out)
    }
}

fn list_item_key(list: &str, seq: u64) -> Vec<u8> {
    let mut key = list.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn set_member_key(set: &str, member: &[u8]) -> Vec<u8> {
    let mut key = set.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(member);
    key
}

impl ForgeDb {
    fn list_meta_get(&self, list: &str, which: &str) -> Result<u64, ForgeError> {
        let key = format!("{list}:{which}");
        match self.kv_list_meta.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn list_meta_set(&self, list: &str, which: &str, value: u64) -> Result<(), ForgeError> {
        let key = format!("{list}:{which}");
        self.kv_list_meta
            .insert(key.as_bytes(), &value.to_be_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn list_meta_next(&self, list: &str, which: &str) -> Result<u64, ForgeError> {
        let current = self.list_meta_get(list, which)?;
        self.list_meta_set(list, which, current + 1)?;
        Ok(current)
    }
}

// ── RelationalStore ───────────────────────────────────────────────────────────

impl RelationalStore for ForgeDb {
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>, ForgeError> {
        match self
            .users
            .get(user_id.as_str().as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ForgeError> {
        let email = email.to_lowercase();
        match self
            .users_by_email
            .get(email.as_bytes())
            .map_err(storage_err)?
        {
            Some(id_bytes) => {
                let user_id = UserId::from_hex(String::from_utf8_lossy(&id_bytes).into_owned());
                self.get_user(&user_id)
            }
            None => Ok(None),
        }
    }

    fn put_user(&self, user: &User) -> Result<(), ForgeError> {
        let bytes = bincode::serialize(user).map_err(ser_err)?;
        self.users
            .insert(user.user_id.as_str().as_bytes(), bytes)
            .map_err(storage_err)?;
        self.users_by_email
            .insert(user.email.to_lowercase().as_bytes(), user.user_id.as_str().as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn try_debit(&self, user_id: &UserId, amount: i64) -> Result<bool, ForgeError> {
        let mut ok = false;
        self.users
            .fetch_and_update(user_id.as_str().as_bytes(), |existing| {
                let bytes = existing?;
                let mut user: User = bincode::deserialize(bytes).ok()?;
                if user.current_credits >= amount {
                    user.current_credits -= amount;
                    user.total_credits_used += amount;
                    ok = true;
                    bincode::serialize(&user).ok()
                } else {
                    ok = false;
                    Some(bytes.to_vec())
                }
            })
            .map_err(storage_err)?;
        Ok(ok)
    }

    fn credit(&self, user_id: &UserId, amount: i64) -> Result<(), ForgeError> {
        let mut err = None;
        self.users
            .fetch_and_update(user_id.as_str().as_bytes(), |existing| {
                let bytes = existing?;
                match bincode::deserialize::<User>(bytes) {
                    Ok(mut user) => {
                        user.current_credits += amount;
                        bincode::serialize(&user).ok()
                    }
                    Err(e) => {
                        err = Some(e);
                        Some(bytes.to_vec())
                    }
                }
            })
            .map_err(storage_err)?;
        if let Some(e) = err {
            return Err(ser_err(e));
        }
        Ok(())
    }

    fn insert_task(&self, task: &Task) -> Result<(), ForgeError> {
        self.put_task(task)
    }

    fn get_task(&self, task_id: &TaskId) -> Result<Option<Task>, ForgeError> {
        match self.tasks.get(task_id.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn put_task(&self, task: &Task) -> Result<(), ForgeError> {
        let bytes = bincode::serialize(task).map_err(ser_err)?;
        self.tasks
            .insert(task.task_id.as_str().as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: Option<u8>,
        current_step: Option<String>,
        result: Option<TaskResult>,
        error: Option<TaskErrorInfo>,
        processing_time: Option<i64>,
        now: i64,
    ) -> Result<bool, ForgeError> {
        let mut applied = false;
        let mut err = None;
        self.tasks
            .fetch_and_update(task_id.as_str().as_bytes(), |existing| {
                let bytes = existing?;
                let mut task: Task = match bincode::deserialize(bytes) {
                    Ok(t) => t,
                    Err(e) => {
                        err = Some(e);
                        return Some(bytes.to_vec());
                    }
                };
                if task.status.is_terminal() {
                    applied = false;
                    return Some(bytes.to_vec());
                }
                task.status = status;
                task.progress = match status {
                    TaskStatus::Done => 100,
                    _ => progress.unwrap_or(task.progress).min(100),
                };
                if let Some(step) = current_step {
                    task.current_step = step;
                }
                if result.is_some() {
                    task.result = result.clone();
                }
                if error.is_some() {
                    task.error = error.clone();
                }
                if let Some(pt) = processing_time {
                    task.processing_time = Some(pt);
                }
                task.updated_at = now;
                if status == TaskStatus::Done {
                    task.completed_at = Some(now);
                }
                if status == TaskStatus::Failed {
                    task.failed_at = Some(now);
                }
                applied = true;
                bincode::serialize(&task).ok()
            })
            .map_err(storage_err)?;
        if let Some(e) = err {
            return Err(ser_err(e));
        }
        Ok(applied)
    }

    fn mark_refunded_if_unset(&self, task_id: &TaskId) -> Result<bool, ForgeError> {
        let mut just_set = false;
        let mut err = None;
        self.tasks
            .fetch_and_update(task_id.as_str().as_bytes(), |existing| {
                let bytes = existing?;
                let mut task: Task = match bincode::deserialize(bytes) {
                    Ok(t) => t,
                    Err(e) => {
                        err = Some(e);
                        return Some(bytes.to_vec());
                    }
                };
                if task.already_refunded() {
                    just_set = false;
                    return Some(bytes.to_vec());
                }
                task.refunded = true;
                just_set = true;
                bincode::serialize(&task).ok()
            })
            .map_err(storage_err)?;
        if let Some(e) = err {
            return Err(ser_err(e));
        }
        Ok(just_set)
    }

    fn list_tasks(
        &self,
        user_id: &UserId,
        status: Option<TaskStatus>,
        mode: Option<EditMode>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Task>, ForgeError> {
        let mut matching = self.matching_tasks(user_id, status, mode)?;
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        Ok(matching.into_iter().skip(start).take(page_size as usize).collect())
    }

    fn count_tasks(
        &self,
        user_id: &UserId,
        status: Option<TaskStatus>,
        mode: Option<EditMode>,
    ) -> Result<u64, ForgeError> {
        Ok(self.matching_tasks(user_id, status, mode)?.len() as u64)
    }
}

impl ForgeDb {
    fn matching_tasks(
        &self,
        user_id: &UserId,
        status: Option<TaskStatus>,
        mode: Option<EditMode>,
    ) -> Result<Vec<Task>, ForgeError> {
        let mut out = Vec::new();
        for item in self.tasks.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let task: Task = bincode::deserialize(&bytes).map_err(ser_err)?;
            if task.user_id != *user_id {
                continue;
            }
            if let Some(s) = status {
                if task.status != s {
                    continue;
                }
            }
            if let Some(m) = mode {
                if task.mode != m {
                    continue;
                }
            }
            out.push(task);
        }
        Ok(out)
    }
}
