use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

use crate::employee::EmployeeId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub AggregateId);

impl TaskId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Task status lifecycle. Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Assigned,
    Completed,
    Cancelled,
}

/// Aggregate root: Task. A unit of work assigned to one employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    tenant_id: Option<TenantId>,
    employee_id: Option<EmployeeId>,
    title: String,
    description: String,
    due_date: Option<DateTime<Utc>>,
    status: TaskStatus,
    version: u64,
    created: bool,
}

impl Task {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TaskId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            title: String::new(),
            description: String::new(),
            due_date: None,
            status: TaskStatus::Assigned,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TaskId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

impl AggregateRoot for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AssignTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTask {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub employee_id: EmployeeId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTask {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTask {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCommand {
    AssignTask(AssignTask),
    CompleteTask(CompleteTask),
    CancelTask(CancelTask),
}

/// Event: TaskAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssigned {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub employee_id: EmployeeId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TaskCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TaskCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCancelled {
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskAssigned(TaskAssigned),
    TaskCompleted(TaskCompleted),
    TaskCancelled(TaskCancelled),
}

impl Event for TaskEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::TaskAssigned(_) => "staff.task.assigned",
            TaskEvent::TaskCompleted(_) => "staff.task.completed",
            TaskEvent::TaskCancelled(_) => "staff.task.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::TaskAssigned(e) => e.occurred_at,
            TaskEvent::TaskCompleted(e) => e.occurred_at,
            TaskEvent::TaskCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Task {
    type Command = TaskCommand;
    type Event = TaskEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TaskEvent::TaskAssigned(e) => {
                self.id = e.task_id;
                self.tenant_id = Some(e.tenant_id);
                self.employee_id = Some(e.employee_id);
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.due_date = e.due_date;
                self.status = TaskStatus::Assigned;
                self.created = true;
            }
            TaskEvent::TaskCompleted(_) => {
                self.status = TaskStatus::Completed;
            }
            TaskEvent::TaskCancelled(_) => {
                self.status = TaskStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TaskCommand::AssignTask(cmd) => self.handle_assign(cmd),
            TaskCommand::CompleteTask(cmd) => self.handle_complete(cmd),
            TaskCommand::CancelTask(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Task {
    fn ensure_open(&self, tenant_id: TenantId, task_id: TaskId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != task_id {
            return Err(DomainError::invariant("task_id mismatch"));
        }
        match self.status {
            TaskStatus::Assigned => Ok(()),
            TaskStatus::Completed => Err(DomainError::conflict("task is already completed")),
            TaskStatus::Cancelled => Err(DomainError::conflict("task is already cancelled")),
        }
    }

    fn handle_assign(&self, cmd: &AssignTask) -> Result<Vec<TaskEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("task already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }

        Ok(vec![TaskEvent::TaskAssigned(TaskAssigned {
            tenant_id: cmd.tenant_id,
            task_id: cmd.task_id,
            employee_id: cmd.employee_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_open(cmd.tenant_id, cmd.task_id)?;
        let employee_id = self.employee_id.ok_or_else(DomainError::not_found)?;

        Ok(vec![TaskEvent::TaskCompleted(TaskCompleted {
            tenant_id: cmd.tenant_id,
            task_id: cmd.task_id,
            employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_open(cmd.tenant_id, cmd.task_id)?;

        Ok(vec![TaskEvent::TaskCancelled(TaskCancelled {
            tenant_id: cmd.tenant_id,
            task_id: cmd.task_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterdesk_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_task_id() -> TaskId {
        TaskId::new(AggregateId::new())
    }

    fn test_employee_id() -> EmployeeId {
        EmployeeId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn assigned_task(tenant_id: TenantId, task_id: TaskId) -> Task {
        let mut task = Task::empty(task_id);
        let cmd = TaskCommand::AssignTask(AssignTask {
            tenant_id,
            task_id,
            employee_id: test_employee_id(),
            title: "Edit wedding gallery".to_string(),
            description: "Cull and retouch the Moreau shoot".to_string(),
            due_date: Some(test_time()),
            occurred_at: test_time(),
        });
        for event in task.handle(&cmd).unwrap() {
            task.apply(&event);
        }
        task
    }

    #[test]
    fn assign_rejects_empty_title() {
        let task = Task::empty(test_task_id());
        let cmd = TaskCommand::AssignTask(AssignTask {
            tenant_id: test_tenant_id(),
            task_id: test_task_id(),
            employee_id: test_employee_id(),
            title: "  ".to_string(),
            description: String::new(),
            due_date: None,
            occurred_at: test_time(),
        });
        assert!(matches!(
            task.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn complete_carries_assignee() {
        let tenant_id = test_tenant_id();
        let task_id = test_task_id();
        let mut task = assigned_task(tenant_id, task_id);
        let assignee = task.employee_id().unwrap();

        let cmd = TaskCommand::CompleteTask(CompleteTask {
            tenant_id,
            task_id,
            occurred_at: test_time(),
        });
        let events = task.handle(&cmd).unwrap();
        let TaskEvent::TaskCompleted(e) = &events[0] else {
            panic!("expected TaskCompleted event");
        };
        assert_eq!(e.employee_id, assignee);

        for event in &events {
            task.apply(event);
        }
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[test]
    fn completed_task_cannot_be_cancelled() {
        let tenant_id = test_tenant_id();
        let task_id = test_task_id();
        let mut task = assigned_task(tenant_id, task_id);

        let complete = TaskCommand::CompleteTask(CompleteTask {
            tenant_id,
            task_id,
            occurred_at: test_time(),
        });
        for event in task.handle(&complete).unwrap() {
            task.apply(&event);
        }

        let cancel = TaskCommand::CancelTask(CancelTask {
            tenant_id,
            task_id,
            reason: "no longer needed".to_string(),
            occurred_at: test_time(),
        });
        assert!(matches!(
            task.handle(&cancel).unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let task = assigned_task(test_tenant_id(), test_task_id());
        let cmd = TaskCommand::CompleteTask(CompleteTask {
            tenant_id: test_tenant_id(),
            task_id: task.id_typed(),
            occurred_at: test_time(),
        });
        let err = task.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}
