use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

/// Employee identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub AggregateId);

impl EmployeeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Employee status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Terminated,
}

/// Contact information for an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    id: EmployeeId,
    tenant_id: Option<TenantId>,
    name: String,
    position: String,
    contact: ContactInfo,
    status: EmployeeStatus,
    version: u64,
    created: bool,
}

impl Employee {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EmployeeId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            position: String::new(),
            contact: ContactInfo::default(),
            status: EmployeeStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EmployeeId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> EmployeeStatus {
        self.status
    }

    /// Whether the employee can take on new assignments.
    pub fn is_active(&self) -> bool {
        self.created && self.status == EmployeeStatus::Active
    }
}

impl AggregateRoot for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: HireEmployee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub name: String,
    pub position: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateEmployeeDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmployeeDetails {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub name: Option<String>,
    pub position: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TerminateEmployee (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeCommand {
    HireEmployee(HireEmployee),
    UpdateEmployeeDetails(UpdateEmployeeDetails),
    TerminateEmployee(TerminateEmployee),
}

/// Event: EmployeeHired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeHired {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub name: String,
    pub position: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmployeeUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeUpdated {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub name: String,
    pub position: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmployeeTerminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeTerminated {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeEvent {
    EmployeeHired(EmployeeHired),
    EmployeeUpdated(EmployeeUpdated),
    EmployeeTerminated(EmployeeTerminated),
}

impl Event for EmployeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmployeeEvent::EmployeeHired(_) => "staff.employee.hired",
            EmployeeEvent::EmployeeUpdated(_) => "staff.employee.updated",
            EmployeeEvent::EmployeeTerminated(_) => "staff.employee.terminated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EmployeeEvent::EmployeeHired(e) => e.occurred_at,
            EmployeeEvent::EmployeeUpdated(e) => e.occurred_at,
            EmployeeEvent::EmployeeTerminated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Employee {
    type Command = EmployeeCommand;
    type Event = EmployeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EmployeeEvent::EmployeeHired(e) => {
                self.id = e.employee_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.position = e.position.clone();
                self.contact = e.contact.clone();
                self.status = EmployeeStatus::Active;
                self.created = true;
            }
            EmployeeEvent::EmployeeUpdated(e) => {
                self.name = e.name.clone();
                self.position = e.position.clone();
                self.contact = e.contact.clone();
            }
            EmployeeEvent::EmployeeTerminated(_) => {
                self.status = EmployeeStatus::Terminated;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EmployeeCommand::HireEmployee(cmd) => self.handle_hire(cmd),
            EmployeeCommand::UpdateEmployeeDetails(cmd) => self.handle_update(cmd),
            EmployeeCommand::TerminateEmployee(cmd) => self.handle_terminate(cmd),
        }
    }
}

impl Employee {
    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != employee_id {
            return Err(DomainError::invariant("employee_id mismatch"));
        }
        Ok(())
    }

    fn handle_hire(&self, cmd: &HireEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("employee already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.position.trim().is_empty() {
            return Err(DomainError::validation("position cannot be empty"));
        }
        if let Some(email) = &cmd.contact.email {
            if !email.contains('@') {
                return Err(DomainError::validation("invalid email format"));
            }
        }

        Ok(vec![EmployeeEvent::EmployeeHired(EmployeeHired {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            name: cmd.name.clone(),
            position: cmd.position.clone(),
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(
        &self,
        cmd: &UpdateEmployeeDetails,
    ) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if self.status == EmployeeStatus::Terminated {
            return Err(DomainError::invariant("employee is terminated"));
        }

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![EmployeeEvent::EmployeeUpdated(EmployeeUpdated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            name,
            position: cmd
                .position
                .clone()
                .unwrap_or_else(|| self.position.clone()),
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_terminate(&self, cmd: &TerminateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if self.status == EmployeeStatus::Terminated {
            return Err(DomainError::conflict("employee is already terminated"));
        }

        Ok(vec![EmployeeEvent::EmployeeTerminated(EmployeeTerminated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
