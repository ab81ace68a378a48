use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Health,
    Learning,
    Career,
    Hobby,
    Finance,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Health,
        Category::Learning,
        Category::Career,
        Category::Hobby,
        Category::Finance,
        Category::Other,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

/// Variant-specific goal fields, stored inline under `goal_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal_type", rename_all = "snake_case")]
pub enum GoalKind {
    Quantitative {
        target_value: f64,
        /// Sum of every record value logged against the goal.
        current_value: f64,
        unit: String,
    },
    Habit {
        weekly_frequency: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    #[serde(flatten)]
    pub kind: GoalKind,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub completed: Option<bool>,
    pub note: Option<String>,
    pub submission_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub messages: Vec<AiMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as exposed over the API; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            profile_image: user.profile_image.clone(),
            created_at: user.created_at,
        }
    }
}

/// Goal row plus its derived completion percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "goal_type", rename_all = "snake_case")]
pub enum NewGoalKind {
    Quantitative { target_value: f64, unit: String },
    Habit { weekly_frequency: u8 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Category,
    #[serde(flatten)]
    pub kind: NewGoalKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<GoalStatus>,
}

/// Partial goal update; only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalPatch {
    pub title: Option<String>,
    /// An empty string clears the description.
    pub description: Option<String>,
    pub category: Option<Category>,
    pub status: Option<GoalStatus>,
    pub start_date: Option<NaiveDate>,
    /// Absent keeps the end date, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub end_date: Option<Option<NaiveDate>>,
    pub target_value: Option<f64>,
    pub unit: Option<String>,
    pub weekly_frequency: Option<u8>,
}

/// Wraps any present value, `null` included, so a missing key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDailyRecord {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub note: Option<String>,
    /// Client-generated key; resubmitting the same key is a no-op.
    #[serde(default)]
    pub submission_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCreated {
    pub record: DailyRecord,
    pub goal: GoalView,
    /// False when the submission id matched an earlier record.
    pub applied: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    /// An empty string clears the image.
    pub profile_image: Option<String>,
}

/// Everything a freshly authenticated client needs, loaded in one shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: UserProfile,
    pub goals: Vec<GoalView>,
    pub records: Vec<DailyRecord>,
    pub conversations: Vec<AiConversation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub snapshot: Snapshot,
}

#[derive(Debug, Deserialize)]
pub struct NewConversation {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub record_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub record_count: u64,
    pub active_days: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPoint {
    pub category: Category,
    pub count: u64,
    pub avg_progress: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_goals: u64,
    pub active_goals: u64,
    pub completed_goals: u64,
    pub average_progress: u8,
    pub today_updates: u64,
    pub week_streak: u32,
    pub weekly_comparison: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub dashboard: DashboardStats,
    pub categories: Vec<CategoryPoint>,
    pub last_7_days: Vec<DailyPoint>,
    pub weekly_totals: Vec<WeeklyPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub value: f64,
    pub cumulative: f64,
    pub progress: u8,
}
