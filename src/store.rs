//! The single writer in front of the database.
//!
//! Every action takes the database lock for its whole read-modify-persist
//! sequence. Writes are staged on a copy and only swapped in once the file
//! write succeeded, so memory never runs ahead of disk.

use crate::auth::{self, Sessions};
use crate::errors::StoreError;
use crate::models::{
    AiConversation, AiMessage, DailyRecord, Goal, GoalKind, GoalPatch, GoalStatus, GoalView,
    LoginRequest, NewDailyRecord, NewGoal, NewGoalKind, NewMessage, ProfilePatch, RecordCreated,
    RegisterRequest, Snapshot, StatsResponse, TrendPoint, User, UserProfile,
};
use crate::progress::goal_progress;
use crate::stats::{build_stats_at, goal_trend};
use crate::storage::{persist_data, Database};
use chrono::{Local, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_WEEKLY_FREQUENCY: u8 = 7;

#[derive(Clone)]
pub struct Store {
    data_path: PathBuf,
    data: Arc<Mutex<Database>>,
    sessions: Sessions,
}

impl Store {
    pub fn new(data_path: PathBuf, data: Database) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            sessions: Sessions::default(),
        }
    }

    /// Runs `apply` against a staged copy and commits it once persisted.
    async fn write<T>(
        &self,
        apply: impl FnOnce(&mut Database) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.data.lock().await;
        let mut staged = data.clone();
        let out = apply(&mut staged)?;
        persist_data(&self.data_path, &staged).await?;
        *data = staged;
        Ok(out)
    }

    // ---- auth ----

    pub async fn register(&self, request: RegisterRequest) -> Result<(String, Snapshot), StoreError> {
        let email = auth::normalize_email(&request.email);
        let name = request.name.trim().to_string();
        if email.is_empty() || name.is_empty() || request.password.is_empty() {
            return Err(StoreError::validation("name, email and password are required"));
        }
        if !email.contains('@') {
            return Err(StoreError::validation("email address is not valid"));
        }
        if request.password.chars().count() < auth::MIN_PASSWORD_LEN {
            return Err(StoreError::validation(format!(
                "password must be at least {} characters",
                auth::MIN_PASSWORD_LEN
            )));
        }

        let password_hash = auth::hash_password_blocking(request.password).await?;
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name,
            profile_image: None,
            created_at: Utc::now(),
        };
        let user_id = user.id;

        let snapshot = self
            .write(|db| {
                if db.user_by_email(&user.email).is_some() {
                    return Err(StoreError::Conflict("email is already registered".into()));
                }
                db.users.insert(user.id, user);
                snapshot(db, user_id, today())
            })
            .await?;

        info!("registered user {user_id}");
        let token = self.sessions.issue(user_id).await;
        Ok((token, snapshot))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<(String, Snapshot), StoreError> {
        let email = auth::normalize_email(&request.email);
        let found = {
            let data = self.data.lock().await;
            data.user_by_email(&email)
                .map(|user| (user.id, user.password_hash.clone()))
        };
        let (user_id, password_hash) = found.unzip();
        let verified = auth::verify_password_blocking(request.password, password_hash).await;
        let user_id = match user_id {
            Some(user_id) if verified => user_id,
            Some(user_id) => {
                warn!("login rejected for user {user_id}");
                return Err(StoreError::InvalidCredentials);
            }
            None => {
                warn!("login rejected: unknown email");
                return Err(StoreError::InvalidCredentials);
            }
        };
        let snapshot = self.snapshot(user_id).await?;

        let token = self.sessions.issue(user_id).await;
        info!("user {user_id} logged in");
        Ok((token, snapshot))
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token).await
    }

    /// Resolves a bearer token to a user that still exists.
    pub async fn authenticate(&self, token: &str) -> Result<Uuid, StoreError> {
        let user_id = self
            .sessions
            .resolve(token)
            .await
            .ok_or(StoreError::Unauthorized)?;
        if self.data.lock().await.users.contains_key(&user_id) {
            Ok(user_id)
        } else {
            self.sessions.revoke(token).await;
            Err(StoreError::Unauthorized)
        }
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, StoreError> {
        let data = self.data.lock().await;
        data.users
            .get(&user_id)
            .map(UserProfile::from)
            .ok_or(StoreError::NotFound("user"))
    }

    pub async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<UserProfile, StoreError> {
        self.write(|db| {
            let user = db.users.get_mut(&user_id).ok_or(StoreError::NotFound("user"))?;
            if let Some(name) = patch.name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(StoreError::validation("name must not be empty"));
                }
                user.name = name.to_string();
            }
            if let Some(image) = patch.profile_image {
                user.profile_image = non_empty(image);
            }
            Ok(UserProfile::from(&*user))
        })
        .await
    }

    pub async fn snapshot(&self, user_id: Uuid) -> Result<Snapshot, StoreError> {
        let data = self.data.lock().await;
        snapshot(&data, user_id, today())
    }

    // ---- goals ----

    pub async fn load_goals(&self, user_id: Uuid) -> Result<Vec<GoalView>, StoreError> {
        let data = self.data.lock().await;
        Ok(goal_views(&data, user_id, today()))
    }

    pub async fn load_goal(&self, user_id: Uuid, goal_id: Uuid) -> Result<GoalView, StoreError> {
        let data = self.data.lock().await;
        let goal = data
            .owned_goal(user_id, goal_id)
            .ok_or(StoreError::NotFound("goal"))?;
        Ok(goal_view(&data, goal, today()))
    }

    pub async fn add_goal(&self, user_id: Uuid, new_goal: NewGoal) -> Result<GoalView, StoreError> {
        let today = today();
        let title = required_title(&new_goal.title)?;
        let kind = match new_goal.kind {
            NewGoalKind::Quantitative { target_value, unit } => GoalKind::Quantitative {
                target_value: checked_target(target_value)?,
                current_value: 0.0,
                unit: checked_unit(&unit)?,
            },
            NewGoalKind::Habit { weekly_frequency } => GoalKind::Habit {
                weekly_frequency: checked_frequency(weekly_frequency)?,
            },
        };
        let start_date = new_goal.start_date.unwrap_or(today);
        check_dates(start_date, new_goal.end_date)?;
        let status = new_goal.status.unwrap_or_default();
        let now = Utc::now();

        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            title,
            description: new_goal.description.and_then(non_empty),
            category: new_goal.category,
            kind,
            start_date,
            end_date: new_goal.end_date,
            status,
            created_at: now,
            updated_at: now,
            completed_at: (status == GoalStatus::Completed).then_some(now),
        };

        let view = self
            .write(|db| {
                if !db.users.contains_key(&user_id) {
                    return Err(StoreError::NotFound("user"));
                }
                db.goals.insert(goal.id, goal.clone());
                Ok(goal_view(db, &goal, today))
            })
            .await?;

        info!("user {user_id} created goal {}", view.goal.id);
        Ok(view)
    }

    pub async fn update_goal(&self, user_id: Uuid, goal_id: Uuid, patch: GoalPatch) -> Result<GoalView, StoreError> {
        let today = today();
        self.write(|db| {
            let goal = db
                .goals
                .get_mut(&goal_id)
                .filter(|goal| goal.user_id == user_id)
                .ok_or(StoreError::NotFound("goal"))?;
            apply_patch(goal, patch)?;
            let goal = goal.clone();
            Ok(goal_view(db, &goal, today))
        })
        .await
    }

    pub async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> Result<(), StoreError> {
        let dropped = self
            .write(|db| {
                if db.owned_goal(user_id, goal_id).is_none() {
                    return Err(StoreError::NotFound("goal"));
                }
                let (_, dropped) = db
                    .delete_goal_cascade(goal_id)
                    .ok_or(StoreError::NotFound("goal"))?;
                Ok(dropped)
            })
            .await?;
        info!("user {user_id} deleted goal {goal_id} and {dropped} records");
        Ok(())
    }

    // ---- daily records ----

    /// Records across the user's goals, or of one goal when `goal_id` is set.
    pub async fn load_daily_records(
        &self,
        user_id: Uuid,
        goal_id: Option<Uuid>,
    ) -> Result<Vec<DailyRecord>, StoreError> {
        let data = self.data.lock().await;
        let goal_ids = match goal_id {
            Some(goal_id) => {
                data.owned_goal(user_id, goal_id)
                    .ok_or(StoreError::NotFound("goal"))?;
                vec![goal_id]
            }
            None => data.goals_for_user(user_id).iter().map(|goal| goal.id).collect(),
        };
        Ok(data.records_for_goals(&goal_ids).into_iter().cloned().collect())
    }

    /// Appends a record and bumps the goal's running total in the same
    /// critical section.
    pub async fn add_daily_record(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        new_record: NewDailyRecord,
    ) -> Result<RecordCreated, StoreError> {
        let today = today();
        let submission_id = new_record.submission_id.clone().and_then(non_empty);

        {
            let data = self.data.lock().await;
            let goal = data
                .owned_goal(user_id, goal_id)
                .ok_or(StoreError::NotFound("goal"))?;
            if let Some(existing) = submission_id
                .as_deref()
                .and_then(|key| data.record_by_submission(goal_id, key))
            {
                info!("duplicate submission for goal {goal_id}, record {} kept", existing.id);
                return Ok(RecordCreated {
                    record: existing.clone(),
                    goal: goal_view(&data, goal, today),
                    applied: false,
                });
            }
        }

        let created = self
            .write(|db| {
                // Re-checked under the write lock: a concurrent duplicate may have landed.
                if let Some(existing) = submission_id
                    .as_deref()
                    .and_then(|key| db.record_by_submission(goal_id, key))
                    .cloned()
                {
                    let goal = db
                        .owned_goal(user_id, goal_id)
                        .ok_or(StoreError::NotFound("goal"))?
                        .clone();
                    return Ok(RecordCreated {
                        record: existing,
                        goal: goal_view(db, &goal, today),
                        applied: false,
                    });
                }

                let goal = db
                    .owned_goal(user_id, goal_id)
                    .ok_or(StoreError::NotFound("goal"))?;
                let record = build_record(goal, new_record, submission_id.clone(), today)?;
                db.daily_records.insert(record.id, record.clone());

                // Recomputed in load order so the total matches a client-side sum exactly.
                let total = db.record_total(goal_id);
                if !total.is_finite() {
                    return Err(StoreError::validation("value would overflow the goal total"));
                }
                let goal = db
                    .goals
                    .get_mut(&goal_id)
                    .ok_or(StoreError::NotFound("goal"))?;
                if let GoalKind::Quantitative { current_value, .. } = &mut goal.kind {
                    *current_value = total;
                }
                goal.updated_at = record.created_at;
                let goal = goal.clone();

                Ok(RecordCreated {
                    record,
                    goal: goal_view(db, &goal, today),
                    applied: true,
                })
            })
            .await?;

        if created.applied {
            info!("goal {goal_id} logged record {}", created.record.id);
        }
        Ok(created)
    }

    // ---- statistics ----

    pub async fn stats(&self, user_id: Uuid) -> Result<StatsResponse, StoreError> {
        let today = today();
        let data = self.data.lock().await;
        let goals = goal_views(&data, user_id, today);
        let goal_ids: Vec<Uuid> = goals.iter().map(|view| view.goal.id).collect();
        let records: Vec<DailyRecord> = data
            .records_for_goals(&goal_ids)
            .into_iter()
            .cloned()
            .collect();
        Ok(build_stats_at(today, &goals, &records))
    }

    pub async fn goal_trend(&self, user_id: Uuid, goal_id: Uuid) -> Result<Vec<TrendPoint>, StoreError> {
        let data = self.data.lock().await;
        let goal = data
            .owned_goal(user_id, goal_id)
            .ok_or(StoreError::NotFound("goal"))?;
        let records: Vec<DailyRecord> = data
            .records_for_goals(&[goal_id])
            .into_iter()
            .cloned()
            .collect();
        Ok(goal_trend(goal, &records))
    }

    // ---- conversations ----

    pub async fn load_conversations(&self, user_id: Uuid) -> Result<Vec<AiConversation>, StoreError> {
        let data = self.data.lock().await;
        Ok(data
            .conversations_for_user(user_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn add_conversation(&self, user_id: Uuid, title: &str) -> Result<AiConversation, StoreError> {
        let title = required_title(title)?;
        let now = Utc::now();
        let conversation = AiConversation {
            id: Uuid::new_v4(),
            user_id,
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.write(|db| {
            if !db.users.contains_key(&user_id) {
                return Err(StoreError::NotFound("user"));
            }
            db.ai_conversations.insert(conversation.id, conversation.clone());
            Ok(conversation)
        })
        .await
    }

    /// Appends to the conversation; earlier messages are never touched.
    pub async fn add_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<AiConversation, StoreError> {
        let content = message.content.trim().to_string();
        if content.is_empty() {
            return Err(StoreError::validation("message must not be empty"));
        }
        self.write(|db| {
            let conversation = db
                .ai_conversations
                .get_mut(&conversation_id)
                .filter(|conversation| conversation.user_id == user_id)
                .ok_or(StoreError::NotFound("conversation"))?;
            let now = Utc::now();
            conversation.messages.push(AiMessage {
                id: Uuid::new_v4(),
                role: message.role,
                content,
                timestamp: now,
            });
            conversation.updated_at = now;
            Ok(conversation.clone())
        })
        .await
    }

    pub async fn delete_conversation(&self, user_id: Uuid, conversation_id: Uuid) -> Result<(), StoreError> {
        self.write(|db| {
            let owned = db
                .ai_conversations
                .get(&conversation_id)
                .is_some_and(|conversation| conversation.user_id == user_id);
            if !owned {
                return Err(StoreError::NotFound("conversation"));
            }
            db.ai_conversations.remove(&conversation_id);
            Ok(())
        })
        .await
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn goal_view(db: &Database, goal: &Goal, today: NaiveDate) -> GoalView {
    let progress = match goal.kind {
        GoalKind::Quantitative { .. } => goal_progress(goal, &[], today),
        GoalKind::Habit { .. } => {
            let records: Vec<DailyRecord> = db
                .records_for_goals(&[goal.id])
                .into_iter()
                .cloned()
                .collect();
            goal_progress(goal, &records, today)
        }
    };
    GoalView {
        goal: goal.clone(),
        progress,
    }
}

fn goal_views(db: &Database, user_id: Uuid, today: NaiveDate) -> Vec<GoalView> {
    db.goals_for_user(user_id)
        .into_iter()
        .map(|goal| goal_view(db, goal, today))
        .collect()
}

fn snapshot(db: &Database, user_id: Uuid, today: NaiveDate) -> Result<Snapshot, StoreError> {
    let user = db.users.get(&user_id).ok_or(StoreError::NotFound("user"))?;
    let goals = goal_views(db, user_id, today);
    let goal_ids: Vec<Uuid> = goals.iter().map(|view| view.goal.id).collect();
    Ok(Snapshot {
        user: UserProfile::from(user),
        goals,
        records: db.records_for_goals(&goal_ids).into_iter().cloned().collect(),
        conversations: db
            .conversations_for_user(user_id)
            .into_iter()
            .cloned()
            .collect(),
    })
}

fn build_record(
    goal: &Goal,
    new_record: NewDailyRecord,
    submission_id: Option<String>,
    today: NaiveDate,
) -> Result<DailyRecord, StoreError> {
    if goal.status != GoalStatus::Active {
        return Err(StoreError::validation("records can only be added to active goals"));
    }
    let date = new_record.date.unwrap_or(today);
    if date < goal.start_date {
        return Err(StoreError::validation("record date is before the goal start date"));
    }
    if goal.end_date.is_some_and(|end| date > end) {
        return Err(StoreError::validation("record date is after the goal end date"));
    }

    let (value, completed) = match goal.kind {
        GoalKind::Quantitative { .. } => {
            if new_record.completed.is_some() {
                return Err(StoreError::validation("quantitative goals take a value, not completed"));
            }
            let value = new_record
                .value
                .ok_or_else(|| StoreError::validation("value is required"))?;
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::validation("value must be a non-negative number"));
            }
            (Some(value), None)
        }
        GoalKind::Habit { .. } => {
            if new_record.value.is_some() {
                return Err(StoreError::validation("habit goals take completed, not a value"));
            }
            (None, Some(new_record.completed.unwrap_or(true)))
        }
    };

    Ok(DailyRecord {
        id: Uuid::new_v4(),
        goal_id: goal.id,
        date,
        value,
        completed,
        note: new_record.note.and_then(non_empty),
        submission_id,
        created_at: Utc::now(),
    })
}

fn apply_patch(goal: &mut Goal, patch: GoalPatch) -> Result<(), StoreError> {
    if let Some(title) = patch.title {
        goal.title = required_title(&title)?;
    }
    if let Some(description) = patch.description {
        goal.description = non_empty(description);
    }
    if let Some(category) = patch.category {
        goal.category = category;
    }

    let start_date = patch.start_date.unwrap_or(goal.start_date);
    let end_date = match patch.end_date {
        Some(end_date) => end_date,
        None => goal.end_date,
    };
    check_dates(start_date, end_date)?;
    goal.start_date = start_date;
    goal.end_date = end_date;

    match &mut goal.kind {
        GoalKind::Quantitative {
            target_value, unit, ..
        } => {
            if patch.weekly_frequency.is_some() {
                return Err(StoreError::validation("weekly_frequency only applies to habit goals"));
            }
            if let Some(target) = patch.target_value {
                *target_value = checked_target(target)?;
            }
            if let Some(new_unit) = patch.unit {
                *unit = checked_unit(&new_unit)?;
            }
        }
        GoalKind::Habit { weekly_frequency } => {
            if patch.target_value.is_some() || patch.unit.is_some() {
                return Err(StoreError::validation("target_value and unit only apply to quantitative goals"));
            }
            if let Some(frequency) = patch.weekly_frequency {
                *weekly_frequency = checked_frequency(frequency)?;
            }
        }
    }

    let now = Utc::now();
    if let Some(status) = patch.status {
        if status == GoalStatus::Completed && goal.status != GoalStatus::Completed {
            goal.completed_at = Some(now);
        } else if status != GoalStatus::Completed {
            goal.completed_at = None;
        }
        goal.status = status;
    }
    goal.updated_at = now;
    Ok(())
}

fn required_title(title: &str) -> Result<String, StoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::validation("title is required"));
    }
    Ok(title.to_string())
}

fn checked_target(target: f64) -> Result<f64, StoreError> {
    if target.is_finite() && target > 0.0 {
        Ok(target)
    } else {
        Err(StoreError::validation("target_value must be greater than zero"))
    }
}

fn checked_unit(unit: &str) -> Result<String, StoreError> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(StoreError::validation("unit is required"));
    }
    Ok(unit.to_string())
}

fn checked_frequency(frequency: u8) -> Result<u8, StoreError> {
    if (1..=MAX_WEEKLY_FREQUENCY).contains(&frequency) {
        Ok(frequency)
    } else {
        Err(StoreError::validation(format!(
            "weekly_frequency must be between 1 and {MAX_WEEKLY_FREQUENCY}"
        )))
    }
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), StoreError> {
    match end {
        Some(end) if end < start => Err(StoreError::validation("end_date must not be before start_date")),
        _ => Ok(()),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
