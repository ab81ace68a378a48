use crate::errors::StoreError;
use crate::models::{AiConversation, DailyRecord, Goal, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

/// The four relational tables, keyed by primary id.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Database {
    #[serde(default)]
    pub users: BTreeMap<Uuid, User>,
    #[serde(default)]
    pub goals: BTreeMap<Uuid, Goal>,
    #[serde(default)]
    pub daily_records: BTreeMap<Uuid, DailyRecord>,
    #[serde(default)]
    pub ai_conversations: BTreeMap<Uuid, AiConversation>,
}

impl Database {
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|user| user.email == email)
    }

    /// Goals owned by `user_id`, newest first.
    pub fn goals_for_user(&self, user_id: Uuid) -> Vec<&Goal> {
        let mut goals: Vec<&Goal> = self
            .goals
            .values()
            .filter(|goal| goal.user_id == user_id)
            .collect();
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        goals
    }

    pub fn owned_goal(&self, user_id: Uuid, goal_id: Uuid) -> Option<&Goal> {
        self.goals.get(&goal_id).filter(|goal| goal.user_id == user_id)
    }

    /// Records of the given goals, latest date first.
    pub fn records_for_goals(&self, goal_ids: &[Uuid]) -> Vec<&DailyRecord> {
        let mut records: Vec<&DailyRecord> = self
            .daily_records
            .values()
            .filter(|record| goal_ids.contains(&record.goal_id))
            .collect();
        records.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        records
    }

    /// Sum of a goal's record values, added in `records_for_goals` order.
    pub fn record_total(&self, goal_id: Uuid) -> f64 {
        self.records_for_goals(&[goal_id])
            .iter()
            .filter_map(|record| record.value)
            .sum()
    }

    pub fn record_by_submission(&self, goal_id: Uuid, submission_id: &str) -> Option<&DailyRecord> {
        self.daily_records.values().find(|record| {
            record.goal_id == goal_id && record.submission_id.as_deref() == Some(submission_id)
        })
    }

    /// Removes a goal together with its records. Returns the number of records dropped.
    pub fn delete_goal_cascade(&mut self, goal_id: Uuid) -> Option<(Goal, usize)> {
        let goal = self.goals.remove(&goal_id)?;
        let before = self.daily_records.len();
        self.daily_records.retain(|_, record| record.goal_id != goal_id);
        Some((goal, before - self.daily_records.len()))
    }

    /// Conversations owned by `user_id`, most recently active first.
    pub fn conversations_for_user(&self, user_id: Uuid) -> Vec<&AiConversation> {
        let mut conversations: Vec<&AiConversation> = self
            .ai_conversations
            .values()
            .filter(|conversation| conversation.user_id == user_id)
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        conversations
    }
}

/// Loads the database file. A missing file is an empty database; an
/// unreadable or corrupt one is an error so it is never overwritten.
pub async fn load_data(path: &Path) -> Result<Database, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<Database>(&bytes) {
            Ok(data) => {
                info!(
                    users = data.users.len(),
                    goals = data.goals.len(),
                    records = data.daily_records.len(),
                    "loaded data file"
                );
                Ok(data)
            }
            Err(err) => {
                error!("failed to parse data file {}: {err}", path.display());
                Err(err.into())
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Database::default()),
        Err(err) => {
            error!("failed to read data file {}: {err}", path.display());
            Err(err.into())
        }
    }
}

/// Writes through a sibling temp file so a crash never leaves a torn file.
pub async fn persist_data(path: &Path, data: &Database) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, GoalKind, GoalStatus};
    use chrono::{Duration, NaiveDate, Utc};

    fn goal(user_id: Uuid, offset_secs: i64) -> Goal {
        let created = Utc::now() + Duration::seconds(offset_secs);
        Goal {
            id: Uuid::new_v4(),
            user_id,
            title: format!("goal {offset_secs}"),
            description: None,
            category: Category::Health,
            kind: GoalKind::Quantitative {
                target_value: 10.0,
                current_value: 0.0,
                unit: "km".into(),
            },
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: None,
            status: GoalStatus::Active,
            created_at: created,
            updated_at: created,
            completed_at: None,
        }
    }

    fn record(goal_id: Uuid, day: u32) -> DailyRecord {
        DailyRecord {
            id: Uuid::new_v4(),
            goal_id,
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            value: Some(1.0),
            completed: None,
            note: None,
            submission_id: None,
            created_at: Utc::now(),
        }
    }

    fn unique_path() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("goal_tracker_storage_{}_{}.json", std::process::id(), Uuid::new_v4()));
        path
    }

    #[test]
    fn goals_are_filtered_by_owner_and_sorted_newest_first() {
        let mut db = Database::default();
        let owner = Uuid::new_v4();
        let older = goal(owner, 0);
        let newer = goal(owner, 60);
        let foreign = goal(Uuid::new_v4(), 120);
        for g in [&older, &newer, &foreign] {
            db.goals.insert(g.id, g.clone());
        }

        let ids: Vec<Uuid> = db.goals_for_user(owner).iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert!(db.owned_goal(owner, foreign.id).is_none());
    }

    #[test]
    fn delete_cascades_to_records() {
        let mut db = Database::default();
        let owner = Uuid::new_v4();
        let keep = goal(owner, 0);
        let drop = goal(owner, 1);
        db.goals.insert(keep.id, keep.clone());
        db.goals.insert(drop.id, drop.clone());
        for r in [record(keep.id, 2), record(drop.id, 3), record(drop.id, 4)] {
            db.daily_records.insert(r.id, r);
        }

        let (removed, dropped) = db.delete_goal_cascade(drop.id).unwrap();
        assert_eq!(removed.id, drop.id);
        assert_eq!(dropped, 2);
        assert_eq!(db.daily_records.len(), 1);
        assert!(db.delete_goal_cascade(drop.id).is_none());
    }

    #[test]
    fn records_are_sorted_latest_date_first() {
        let mut db = Database::default();
        let goal_id = Uuid::new_v4();
        for day in [3, 9, 1] {
            let r = record(goal_id, day);
            db.daily_records.insert(r.id, r);
        }
        let days: Vec<String> = db
            .records_for_goals(&[goal_id])
            .iter()
            .map(|r| r.date.to_string())
            .collect();
        assert_eq!(days, vec!["2026-01-09", "2026-01-03", "2026-01-01"]);
    }

    #[tokio::test]
    async fn persist_then_load_returns_same_tables() {
        let path = unique_path();
        let mut db = Database::default();
        let g = goal(Uuid::new_v4(), 0);
        db.goals.insert(g.id, g);

        persist_data(&path, &db).await.unwrap();
        let loaded = load_data(&path).await.unwrap();
        assert_eq!(loaded, db);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_is_empty_but_corrupt_file_errors() {
        let path = unique_path();
        assert_eq!(load_data(&path).await.unwrap(), Database::default());

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load_data(&path).await, Err(StoreError::Serialization(_))));
        let _ = std::fs::remove_file(&path);
    }
}
