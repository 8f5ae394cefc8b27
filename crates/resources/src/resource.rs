use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

/// Resource identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub AggregateId);

impl ResourceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Physical condition of the equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCondition {
    New,
    #[default]
    Good,
    Fair,
    NeedsRepair,
}

/// Aggregate root: Resource.
///
/// # Invariants
/// - `stock >= 0` and `rental_stock >= 0` at all times.
/// - `stock + rental_stock` is conserved across transfers and returns; only
///   `AdjustStock` changes the total.
/// - A retired resource accepts no further stock mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: ResourceId,
    tenant_id: Option<TenantId>,
    name: String,
    category: String,
    description: String,
    condition: ResourceCondition,
    stock: i64,
    rental_stock: i64,
    retired: bool,
    version: u64,
    created: bool,
}

impl Resource {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ResourceId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            category: String::new(),
            description: String::new(),
            condition: ResourceCondition::default(),
            stock: 0,
            rental_stock: 0,
            retired: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ResourceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn condition(&self) -> ResourceCondition {
        self.condition
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn rental_stock(&self) -> i64 {
        self.rental_stock
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Total physical units across both pools.
    pub fn total_units(&self) -> i64 {
        self.stock + self.rental_stock
    }
}

impl AggregateRoot for Resource {
    type Id = ResourceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateResource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResource {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (descriptive fields only; stock is untouched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub condition: Option<ResourceCondition>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (direct admin edit of the available pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransferToRental.
///
/// Moves `quantity` units from `stock` into `rental_stock` in one event, so
/// both pools mutate atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToRental {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnFromRental (inverse transfer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnFromRental {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireResource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireResource {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceCommand {
    CreateResource(CreateResource),
    UpdateDetails(UpdateDetails),
    AdjustStock(AdjustStock),
    TransferToRental(TransferToRental),
    ReturnFromRental(ReturnFromRental),
    RetireResource(RetireResource),
}

/// Event: ResourceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCreated {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsUpdated {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub name: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferredToRental (decrements `stock`, increments `rental_stock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferredToRental {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReturnedFromRental (increments `stock`, decrements `rental_stock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedFromRental {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ResourceRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRetired {
    pub tenant_id: TenantId,
    pub resource_id: ResourceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceEvent {
    ResourceCreated(ResourceCreated),
    DetailsUpdated(DetailsUpdated),
    StockAdjusted(StockAdjusted),
    TransferredToRental(TransferredToRental),
    ReturnedFromRental(ReturnedFromRental),
    ResourceRetired(ResourceRetired),
}

impl Event for ResourceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResourceEvent::ResourceCreated(_) => "resources.resource.created",
            ResourceEvent::DetailsUpdated(_) => "resources.resource.details_updated",
            ResourceEvent::StockAdjusted(_) => "resources.resource.stock_adjusted",
            ResourceEvent::TransferredToRental(_) => "resources.resource.transferred_to_rental",
            ResourceEvent::ReturnedFromRental(_) => "resources.resource.returned_from_rental",
            ResourceEvent::ResourceRetired(_) => "resources.resource.retired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ResourceEvent::ResourceCreated(e) => e.occurred_at,
            ResourceEvent::DetailsUpdated(e) => e.occurred_at,
            ResourceEvent::StockAdjusted(e) => e.occurred_at,
            ResourceEvent::TransferredToRental(e) => e.occurred_at,
            ResourceEvent::ReturnedFromRental(e) => e.occurred_at,
            ResourceEvent::ResourceRetired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Resource {
    type Command = ResourceCommand;
    type Event = ResourceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ResourceEvent::ResourceCreated(e) => {
                self.id = e.resource_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.description = e.description.clone();
                self.condition = e.condition;
                self.stock = e.initial_stock;
                self.rental_stock = 0;
                self.created = true;
            }
            ResourceEvent::DetailsUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.condition = e.condition;
            }
            ResourceEvent::StockAdjusted(e) => {
                self.stock += e.delta;
            }
            ResourceEvent::TransferredToRental(e) => {
                self.stock -= e.quantity;
                self.rental_stock += e.quantity;
            }
            ResourceEvent::ReturnedFromRental(e) => {
                self.stock += e.quantity;
                self.rental_stock -= e.quantity;
            }
            ResourceEvent::ResourceRetired(_) => {
                self.retired = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ResourceCommand::CreateResource(cmd) => self.handle_create(cmd),
            ResourceCommand::UpdateDetails(cmd) => self.handle_update_details(cmd),
            ResourceCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ResourceCommand::TransferToRental(cmd) => self.handle_transfer(cmd),
            ResourceCommand::ReturnFromRental(cmd) => self.handle_return(cmd),
            ResourceCommand::RetireResource(cmd) => self.handle_retire(cmd),
        }
    }
}

impl Resource {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_resource_id(&self, resource_id: ResourceId) -> Result<(), DomainError> {
        if self.id != resource_id {
            return Err(DomainError::invariant("resource_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        resource_id: ResourceId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_resource_id(resource_id)
    }

    fn ensure_not_retired(&self) -> Result<(), DomainError> {
        if self.retired {
            return Err(DomainError::invariant("resource is retired"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateResource) -> Result<Vec<ResourceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("resource already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(vec![ResourceEvent::ResourceCreated(ResourceCreated {
            tenant_id: cmd.tenant_id,
            resource_id: cmd.resource_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            description: cmd.description.clone(),
            condition: cmd.condition,
            initial_stock: cmd.initial_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateDetails,
    ) -> Result<Vec<ResourceEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.resource_id)?;
        self.ensure_not_retired()?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![ResourceEvent::DetailsUpdated(DetailsUpdated {
            tenant_id: cmd.tenant_id,
            resource_id: cmd.resource_id,
            name,
            description: cmd
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            condition: cmd.condition.unwrap_or(self.condition),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ResourceEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.resource_id)?;
        self.ensure_not_retired()?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_stock = self.stock + cmd.delta;
        if new_stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![ResourceEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            resource_id: cmd.resource_id,
            delta: cmd.delta,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transfer(&self, cmd: &TransferToRental) -> Result<Vec<ResourceEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.resource_id)?;
        self.ensure_not_retired()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.quantity > self.stock {
            return Err(DomainError::invariant("quantity exceeds available stock"));
        }

        Ok(vec![ResourceEvent::TransferredToRental(
            TransferredToRental {
                tenant_id: cmd.tenant_id,
                resource_id: cmd.resource_id,
                quantity: cmd.quantity,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_return(&self, cmd: &ReturnFromRental) -> Result<Vec<ResourceEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.resource_id)?;
        self.ensure_not_retired()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.quantity > self.rental_stock {
            return Err(DomainError::invariant("quantity exceeds rental stock"));
        }

        Ok(vec![ResourceEvent::ReturnedFromRental(ReturnedFromRental {
            tenant_id: cmd.tenant_id,
            resource_id: cmd.resource_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireResource) -> Result<Vec<ResourceEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.resource_id)?;

        if self.retired {
            return Err(DomainError::conflict("resource is already retired"));
        }

        Ok(vec![ResourceEvent::ResourceRetired(ResourceRetired {
            tenant_id: cmd.tenant_id,
            resource_id: cmd.resource_id,
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

    fn test_resource_id() -> ResourceId {
        ResourceId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_resource(tenant_id: TenantId, resource_id: ResourceId, stock: i64) -> Resource {
        let mut resource = Resource::empty(resource_id);
        let cmd = ResourceCommand::CreateResource(CreateResource {
            tenant_id,
            resource_id,
            name: "Canon EOS R5".to_string(),
            category: "camera".to_string(),
            description: "Full-frame mirrorless body".to_string(),
            condition: ResourceCondition::Good,
            initial_stock: stock,
            occurred_at: test_time(),
        });
        for event in resource.handle(&cmd).unwrap() {
            resource.apply(&event);
        }
        resource
    }

    #[test]
    fn create_resource_emits_created_event() {
        let resource = Resource::empty(test_resource_id());
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();

        let cmd = ResourceCommand::CreateResource(CreateResource {
            tenant_id,
            resource_id,
            name: "Godox AD600".to_string(),
            category: "lighting".to_string(),
            description: String::new(),
            condition: ResourceCondition::New,
            initial_stock: 4,
            occurred_at: test_time(),
        });

        let events = resource.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        let ResourceEvent::ResourceCreated(e) = &events[0] else {
            panic!("expected ResourceCreated event");
        };
        assert_eq!(e.initial_stock, 4);
        assert_eq!(e.category, "lighting");
    }

    #[test]
    fn create_rejects_negative_initial_stock() {
        let resource = Resource::empty(test_resource_id());
        let cmd = ResourceCommand::CreateResource(CreateResource {
            tenant_id: test_tenant_id(),
            resource_id: test_resource_id(),
            name: "Tripod".to_string(),
            category: "support".to_string(),
            description: String::new(),
            condition: ResourceCondition::Good,
            initial_stock: -1,
            occurred_at: test_time(),
        });

        assert!(matches!(
            resource.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn transfer_moves_units_between_pools() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let mut resource = created_resource(tenant_id, resource_id, 10);

        let cmd = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 3,
            occurred_at: test_time(),
        });
        for event in resource.handle(&cmd).unwrap() {
            resource.apply(&event);
        }

        assert_eq!(resource.stock(), 7);
        assert_eq!(resource.rental_stock(), 3);
        assert_eq!(resource.total_units(), 10);
    }

    #[test]
    fn transfer_rejects_quantity_above_stock() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let resource = created_resource(tenant_id, resource_id, 5);

        let cmd = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 6,
            occurred_at: test_time(),
        });

        let err = resource.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(err.to_string().contains("exceeds available stock"));
        assert_eq!(resource.stock(), 5);
        assert_eq!(resource.rental_stock(), 0);
    }

    #[test]
    fn transfer_rejects_non_positive_quantity() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let resource = created_resource(tenant_id, resource_id, 5);

        for quantity in [0, -2] {
            let cmd = ResourceCommand::TransferToRental(TransferToRental {
                tenant_id,
                resource_id,
                quantity,
                occurred_at: test_time(),
            });
            assert!(matches!(
                resource.handle(&cmd).unwrap_err(),
                DomainError::Validation(_)
            ));
        }
    }

    #[test]
    fn return_rejects_quantity_above_rental_pool() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let mut resource = created_resource(tenant_id, resource_id, 10);

        let transfer = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 2,
            occurred_at: test_time(),
        });
        for event in resource.handle(&transfer).unwrap() {
            resource.apply(&event);
        }

        let cmd = ResourceCommand::ReturnFromRental(ReturnFromRental {
            tenant_id,
            resource_id,
            quantity: 3,
            occurred_at: test_time(),
        });
        let err = resource.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("exceeds rental stock"));
    }

    #[test]
    fn retired_resource_rejects_transfers() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let mut resource = created_resource(tenant_id, resource_id, 5);

        let retire = ResourceCommand::RetireResource(RetireResource {
            tenant_id,
            resource_id,
            occurred_at: test_time(),
        });
        for event in resource.handle(&retire).unwrap() {
            resource.apply(&event);
        }

        let cmd = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 1,
            occurred_at: test_time(),
        });
        let err = resource.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("retired"));
    }

    #[test]
    fn adjust_stock_cannot_go_negative() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let resource = created_resource(tenant_id, resource_id, 2);

        let cmd = ResourceCommand::AdjustStock(AdjustStock {
            tenant_id,
            resource_id,
            delta: -3,
            occurred_at: test_time(),
        });
        let err = resource.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn update_details_preserves_stock_pools() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let mut resource = created_resource(tenant_id, resource_id, 8);

        let cmd = ResourceCommand::UpdateDetails(UpdateDetails {
            tenant_id,
            resource_id,
            name: Some("Canon EOS R5 Mk II".to_string()),
            description: None,
            condition: Some(ResourceCondition::Fair),
            occurred_at: test_time(),
        });
        for event in resource.handle(&cmd).unwrap() {
            resource.apply(&event);
        }

        assert_eq!(resource.name(), "Canon EOS R5 Mk II");
        assert_eq!(resource.condition(), ResourceCondition::Fair);
        assert_eq!(resource.stock(), 8);
        assert_eq!(resource.rental_stock(), 0);
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let resource = created_resource(tenant_id, resource_id, 5);

        let cmd = ResourceCommand::AdjustStock(AdjustStock {
            tenant_id: test_tenant_id(),
            resource_id,
            delta: 1,
            occurred_at: test_time(),
        });
        let err = resource.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn version_increments_on_apply() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let mut resource = created_resource(tenant_id, resource_id, 5);
        assert_eq!(resource.version(), 1);

        let cmd = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 1,
            occurred_at: test_time(),
        });
        for event in resource.handle(&cmd).unwrap() {
            resource.apply(&event);
        }
        assert_eq!(resource.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let tenant_id = test_tenant_id();
        let resource_id = test_resource_id();
        let resource = created_resource(tenant_id, resource_id, 5);
        let before = resource.clone();

        let cmd = ResourceCommand::TransferToRental(TransferToRental {
            tenant_id,
            resource_id,
            quantity: 2,
            occurred_at: test_time(),
        });
        let events1 = resource.handle(&cmd).unwrap();
        let events2 = resource.handle(&cmd).unwrap();

        assert_eq!(resource, before);
        assert_eq!(events1, events2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any accepted sequence of transfers and returns conserves
            /// stock + rental_stock.
            #[test]
            fn transfers_conserve_total_units(
                initial_stock in 0i64..500,
                ops in proptest::collection::vec((any::<bool>(), 1i64..50), 0..40)
            ) {
                let tenant_id = test_tenant_id();
                let resource_id = test_resource_id();
                let mut resource = created_resource(tenant_id, resource_id, initial_stock);

                for (to_rental, quantity) in ops {
                    let cmd = if to_rental {
                        ResourceCommand::TransferToRental(TransferToRental {
                            tenant_id,
                            resource_id,
                            quantity,
                            occurred_at: test_time(),
                        })
                    } else {
                        ResourceCommand::ReturnFromRental(ReturnFromRental {
                            tenant_id,
                            resource_id,
                            quantity,
                            occurred_at: test_time(),
                        })
                    };

                    // Rejected commands leave state untouched; accepted ones
                    // move units between pools only.
                    if let Ok(events) = resource.handle(&cmd) {
                        for event in events {
                            resource.apply(&event);
                        }
                    }

                    prop_assert!(resource.stock() >= 0);
                    prop_assert!(resource.rental_stock() >= 0);
                    prop_assert_eq!(resource.total_units(), initial_stock);
                }
            }
        }
    }
}
