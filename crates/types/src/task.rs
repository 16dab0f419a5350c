//! Task documents returned by the control plane's task-status endpoint.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Lifecycle state of a server-side task.
///
/// The control plane reports several pre-running states (`Created`,
/// `Initializing`); they are folded into [`TaskStatus::Running`] because the
/// client treats them identically. Anything unrecognized is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    Failure,
    Aborted,
    Unknown(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "initializing" | "running" | "abort" => Self::Running,
            "success" => Self::Success,
            "failure" => Self::Failure,
            "aborted" => Self::Aborted,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Aborted => "Aborted",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Aborted)
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failure | Self::Aborted)
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// One entry of a task's `details.taskDetails` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Client-side view of a task plus the raw document it was read from.
///
/// `document` keeps every field the server sent so that failures can be
/// diagnosed without re-querying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub percent: f64,
    pub title: Option<String>,
    pub target: Option<String>,
    pub steps: Vec<TaskStep>,
    pub document: Value,
}

impl TaskStep {
    /// Read one step leniently; fields of the wrong type are treated as absent.
    fn from_value(value: &Value) -> Option<Self> {
        let step = value.as_object()?;
        Some(Self {
            title: string_field(step, "title").unwrap_or_default(),
            description: string_field(step, "description"),
            state: string_field(step, "state"),
        })
    }
}

impl Task {
    /// Build a task view from a status document. Each field is read on its
    /// own, so a missing or oddly typed field never hides the others; a
    /// document without a string `status` is `Unknown`.
    pub fn from_document(id: impl Into<String>, document: Value) -> Self {
        let fields = document.as_object();
        let status = fields
            .and_then(|fields| string_field(fields, "status"))
            .map(|raw| TaskStatus::parse(&raw))
            .unwrap_or_else(|| TaskStatus::Unknown(String::new()));
        let percent = document.get("percent").and_then(Value::as_f64).unwrap_or(0.0);
        let title = fields.and_then(|fields| string_field(fields, "title"));
        let target = fields.and_then(|fields| string_field(fields, "target"));
        let steps = document
            .pointer("/details/taskDetails")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().filter_map(TaskStep::from_value).collect())
            .unwrap_or_default();
        Self {
            id: id.into(),
            status,
            percent,
            title,
            target,
            steps,
            document,
        }
    }

    /// Steps the server marked as failed, useful for error summaries.
    pub fn failed_steps(&self) -> impl Iterator<Item = &TaskStep> {
        self.steps
            .iter()
            .filter(|step| step.state.as_deref().is_some_and(|state| state.eq_ignore_ascii_case("failure")))
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_folds_pre_running_states() {
        assert_eq!(TaskStatus::parse("Created"), TaskStatus::Running);
        assert_eq!(TaskStatus::parse("Initializing"), TaskStatus::Running);
        assert_eq!(TaskStatus::parse("Success"), TaskStatus::Success);
        assert_eq!(TaskStatus::parse("Aborted"), TaskStatus::Aborted);
        assert_eq!(TaskStatus::parse("Paused"), TaskStatus::Unknown("Paused".into()));
        assert!(!TaskStatus::parse("Paused").is_terminal());
        assert!(TaskStatus::Failure.is_terminal_failure());
    }

    #[test]
    fn task_from_document_reads_details() {
        let document = json!({
            "title": "Created Universe : demo",
            "percent": 42.5,
            "status": "Running",
            "target": "demo",
            "details": {
                "taskDetails": [
                    { "title": "Provisioning", "description": "Creating pods", "state": "Success" },
                    { "title": "Configuring", "state": "Failure" }
                ]
            }
        });

        let task = Task::from_document("t-1", document.clone());
        assert_eq!(task.id, "t-1");
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.percent, 42.5);
        assert_eq!(task.target.as_deref(), Some("demo"));
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.failed_steps().map(|step| step.title.as_str()).collect::<Vec<_>>(), vec!["Configuring"]);
        assert_eq!(task.document, document);
    }

    #[test]
    fn task_from_sparse_document_is_unknown() {
        let task = Task::from_document("t-2", json!({ "unexpected": true }));
        assert_eq!(task.status, TaskStatus::Unknown(String::new()));
        assert_eq!(task.percent, 0.0);
        assert!(task.steps.is_empty());
    }

    #[test]
    fn odd_fields_do_not_hide_the_status() {
        let document = json!({
            "status": "Failure",
            "percent": 60.0,
            "target": 42,
            "details": {
                "taskDetails": [
                    { "title": null, "state": "Success" },
                    "not a step",
                    { "title": "Creating pods", "state": "Failure", "description": 7 }
                ]
            }
        });

        let task = Task::from_document("t-3", document);
        assert_eq!(task.status, TaskStatus::Failure);
        assert_eq!(task.percent, 60.0);
        assert_eq!(task.target, None);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[0].title, "");
        assert_eq!(task.failed_steps().map(|step| step.title.as_str()).collect::<Vec<_>>(), vec!["Creating pods"]);

        let task = Task::from_document("t-4", json!({ "status": "Success", "details": { "taskDetails": "n/a" } }));
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.steps.is_empty());
    }
}
