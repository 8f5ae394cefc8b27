use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;
use shutterdesk_resources::{ResourceCondition, ResourceId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentalProductId(pub AggregateId);

impl RentalProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RentalProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: RentalProduct.
///
/// # Invariants
/// - `rental_stock >= 0` at all times.
/// - `daily_rate >= 0`.
/// - A delisted product accepts no further mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalProduct {
    id: RentalProductId,
    tenant_id: Option<TenantId>,
    resource_id: Option<ResourceId>,
    name: String,
    category: String,
    description: String,
    condition: ResourceCondition,
    daily_rate: i64,
    rental_stock: i64,
    delisted: bool,
    version: u64,
    created: bool,
}

impl RentalProduct {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RentalProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            resource_id: None,
            name: String::new(),
            category: String::new(),
            description: String::new(),
            condition: ResourceCondition::default(),
            daily_rate: 0,
            rental_stock: 0,
            delisted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RentalProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// The inventory resource backing this listing.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.resource_id
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

    /// Condition carried over from the backing resource at carve-out time.
    pub fn condition(&self) -> ResourceCondition {
        self.condition
    }

    pub fn daily_rate(&self) -> i64 {
        self.daily_rate
    }

    pub fn rental_stock(&self) -> i64 {
        self.rental_stock
    }

    pub fn is_delisted(&self) -> bool {
        self.delisted
    }

    /// Whether customers can currently rent this product.
    pub fn is_rentable(&self) -> bool {
        self.created && !self.delisted && self.rental_stock > 0
    }
}

impl AggregateRoot for RentalProduct {
    type Id = RentalProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ListRentalProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRentalProduct {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub daily_rate: i64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustRentalStock.
///
/// Positive deltas follow a transfer out of the backing resource; negative
/// deltas precede a return into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustRentalStock {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDailyRate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDailyRate {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub daily_rate: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DelistRentalProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelistRentalProduct {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalProductCommand {
    ListRentalProduct(ListRentalProduct),
    AdjustRentalStock(AdjustRentalStock),
    SetDailyRate(SetDailyRate),
    DelistRentalProduct(DelistRentalProduct),
}

/// Event: RentalProductListed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalProductListed {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub daily_rate: i64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RentalStockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalStockAdjusted {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DailyRateSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRateSet {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub daily_rate: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RentalProductDelisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalProductDelisted {
    pub tenant_id: TenantId,
    pub rental_product_id: RentalProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalProductEvent {
    RentalProductListed(RentalProductListed),
    RentalStockAdjusted(RentalStockAdjusted),
    DailyRateSet(DailyRateSet),
    RentalProductDelisted(RentalProductDelisted),
}

impl Event for RentalProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RentalProductEvent::RentalProductListed(_) => "rentals.rental_product.listed",
            RentalProductEvent::RentalStockAdjusted(_) => "rentals.rental_product.stock_adjusted",
            RentalProductEvent::DailyRateSet(_) => "rentals.rental_product.daily_rate_set",
            RentalProductEvent::RentalProductDelisted(_) => "rentals.rental_product.delisted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RentalProductEvent::RentalProductListed(e) => e.occurred_at,
            RentalProductEvent::RentalStockAdjusted(e) => e.occurred_at,
            RentalProductEvent::DailyRateSet(e) => e.occurred_at,
            RentalProductEvent::RentalProductDelisted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RentalProduct {
    type Command = RentalProductCommand;
    type Event = RentalProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RentalProductEvent::RentalProductListed(e) => {
                self.id = e.rental_product_id;
                self.tenant_id = Some(e.tenant_id);
                self.resource_id = Some(e.resource_id);
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.description = e.description.clone();
                self.condition = e.condition;
                self.daily_rate = e.daily_rate;
                self.rental_stock = e.initial_stock;
                self.created = true;
            }
            RentalProductEvent::RentalStockAdjusted(e) => {
                self.rental_stock += e.delta;
            }
            RentalProductEvent::DailyRateSet(e) => {
                self.daily_rate = e.daily_rate;
            }
            RentalProductEvent::RentalProductDelisted(_) => {
                self.delisted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RentalProductCommand::ListRentalProduct(cmd) => self.handle_list(cmd),
            RentalProductCommand::AdjustRentalStock(cmd) => self.handle_adjust(cmd),
            RentalProductCommand::SetDailyRate(cmd) => self.handle_set_rate(cmd),
            RentalProductCommand::DelistRentalProduct(cmd) => self.handle_delist(cmd),
        }
    }
}

impl RentalProduct {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        rental_product_id: RentalProductId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        if self.id != rental_product_id {
            return Err(DomainError::invariant("rental_product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_listed(&self) -> Result<(), DomainError> {
        if self.delisted {
            return Err(DomainError::invariant("rental product is delisted"));
        }
        Ok(())
    }

    fn handle_list(&self, cmd: &ListRentalProduct) -> Result<Vec<RentalProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rental product already listed"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.daily_rate < 0 {
            return Err(DomainError::validation("daily rate cannot be negative"));
        }
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(vec![RentalProductEvent::RentalProductListed(
            RentalProductListed {
                tenant_id: cmd.tenant_id,
                rental_product_id: cmd.rental_product_id,
                resource_id: cmd.resource_id,
                name: cmd.name.clone(),
                category: cmd.category.clone(),
                description: cmd.description.clone(),
                condition: cmd.condition,
                daily_rate: cmd.daily_rate,
                initial_stock: cmd.initial_stock,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_adjust(&self, cmd: &AdjustRentalStock) -> Result<Vec<RentalProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.rental_product_id)?;
        self.ensure_listed()?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if self.rental_stock + cmd.delta < 0 {
            return Err(DomainError::invariant("rental stock cannot go negative"));
        }

        Ok(vec![RentalProductEvent::RentalStockAdjusted(
            RentalStockAdjusted {
                tenant_id: cmd.tenant_id,
                rental_product_id: cmd.rental_product_id,
                delta: cmd.delta,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_rate(&self, cmd: &SetDailyRate) -> Result<Vec<RentalProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.rental_product_id)?;
        self.ensure_listed()?;

        if cmd.daily_rate < 0 {
            return Err(DomainError::validation("daily rate cannot be negative"));
        }

        Ok(vec![RentalProductEvent::DailyRateSet(DailyRateSet {
            tenant_id: cmd.tenant_id,
            rental_product_id: cmd.rental_product_id,
            daily_rate: cmd.daily_rate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delist(
        &self,
        cmd: &DelistRentalProduct,
    ) -> Result<Vec<RentalProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.rental_product_id)?;

        if self.delisted {
            return Err(DomainError::conflict("rental product is already delisted"));
        }

        Ok(vec![RentalProductEvent::RentalProductDelisted(
            RentalProductDelisted {
                tenant_id: cmd.tenant_id,
                rental_product_id: cmd.rental_product_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterdesk_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_rental_product_id() -> RentalProductId {
        RentalProductId::new(AggregateId::new())
    }

    fn test_resource_id() -> ResourceId {
        ResourceId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn listed_product(
        tenant_id: TenantId,
        rental_product_id: RentalProductId,
        stock: i64,
    ) -> RentalProduct {
        let mut product = RentalProduct::empty(rental_product_id);
        let cmd = RentalProductCommand::ListRentalProduct(ListRentalProduct {
            tenant_id,
            rental_product_id,
            resource_id: test_resource_id(),
            name: "Sony A7 IV kit".to_string(),
            category: "camera".to_string(),
            description: "Body plus 24-70mm".to_string(),
            condition: ResourceCondition::Good,
            daily_rate: 85,
            initial_stock: stock,
            occurred_at: test_time(),
        });
        for event in product.handle(&cmd).unwrap() {
            product.apply(&event);
        }
        product
    }

    #[test]
    fn list_emits_listed_event_with_resource_link() {
        let product = RentalProduct::empty(test_rental_product_id());
        let resource_id = test_resource_id();

        let cmd = RentalProductCommand::ListRentalProduct(ListRentalProduct {
            tenant_id: test_tenant_id(),
            rental_product_id: test_rental_product_id(),
            resource_id,
            name: "DJI Ronin".to_string(),
            category: "stabilizer".to_string(),
            description: String::new(),
            condition: ResourceCondition::Fair,
            daily_rate: 40,
            initial_stock: 2,
            occurred_at: test_time(),
        });

        let events = product.handle(&cmd).unwrap();
        let RentalProductEvent::RentalProductListed(e) = &events[0] else {
            panic!("expected RentalProductListed event");
        };
        assert_eq!(e.resource_id, resource_id);
        assert_eq!(e.condition, ResourceCondition::Fair);
        assert_eq!(e.initial_stock, 2);
    }

    #[test]
    fn list_rejects_negative_daily_rate() {
        let product = RentalProduct::empty(test_rental_product_id());
        let cmd = RentalProductCommand::ListRentalProduct(ListRentalProduct {
            tenant_id: test_tenant_id(),
            rental_product_id: test_rental_product_id(),
            resource_id: test_resource_id(),
            name: "Reflector".to_string(),
            category: "lighting".to_string(),
            description: String::new(),
            condition: ResourceCondition::Good,
            daily_rate: -5,
            initial_stock: 1,
            occurred_at: test_time(),
        });

        assert!(matches!(
            product.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn adjust_cannot_push_stock_negative() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let product = listed_product(tenant_id, id, 2);

        let cmd = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
            tenant_id,
            rental_product_id: id,
            delta: -3,
            occurred_at: test_time(),
        });

        let err = product.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn adjust_applies_delta() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let mut product = listed_product(tenant_id, id, 2);

        let cmd = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
            tenant_id,
            rental_product_id: id,
            delta: 3,
            occurred_at: test_time(),
        });
        for event in product.handle(&cmd).unwrap() {
            product.apply(&event);
        }

        assert_eq!(product.rental_stock(), 5);
        assert!(product.is_rentable());
    }

    #[test]
    fn set_daily_rate_replaces_rate() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let mut product = listed_product(tenant_id, id, 2);

        let cmd = RentalProductCommand::SetDailyRate(SetDailyRate {
            tenant_id,
            rental_product_id: id,
            daily_rate: 120,
            occurred_at: test_time(),
        });
        for event in product.handle(&cmd).unwrap() {
            product.apply(&event);
        }

        assert_eq!(product.daily_rate(), 120);
    }

    #[test]
    fn delisted_product_rejects_stock_changes() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let mut product = listed_product(tenant_id, id, 2);

        let delist = RentalProductCommand::DelistRentalProduct(DelistRentalProduct {
            tenant_id,
            rental_product_id: id,
            occurred_at: test_time(),
        });
        for event in product.handle(&delist).unwrap() {
            product.apply(&event);
        }
        assert!(!product.is_rentable());

        let cmd = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
            tenant_id,
            rental_product_id: id,
            delta: 1,
            occurred_at: test_time(),
        });
        let err = product.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn delist_twice_conflicts() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let mut product = listed_product(tenant_id, id, 2);

        let delist = RentalProductCommand::DelistRentalProduct(DelistRentalProduct {
            tenant_id,
            rental_product_id: id,
            occurred_at: test_time(),
        });
        for event in product.handle(&delist).unwrap() {
            product.apply(&event);
        }

        assert!(matches!(
            product.handle(&delist).unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let tenant_id = test_tenant_id();
        let id = test_rental_product_id();
        let product = listed_product(tenant_id, id, 2);

        let cmd = RentalProductCommand::SetDailyRate(SetDailyRate {
            tenant_id: test_tenant_id(),
            rental_product_id: id,
            daily_rate: 10,
            occurred_at: test_time(),
        });
        let err = product.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Accepted adjustments never drive the pool negative.
            #[test]
            fn rental_stock_never_negative(
                initial in 0i64..200,
                deltas in proptest::collection::vec(-50i64..50, 0..30)
            ) {
                let tenant_id = test_tenant_id();
                let id = test_rental_product_id();
                let mut product = listed_product(tenant_id, id, initial);

                for delta in deltas {
                    let cmd = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
                        tenant_id,
                        rental_product_id: id,
                        delta,
                        occurred_at: test_time(),
                    });
                    if let Ok(events) = product.handle(&cmd) {
                        for event in events {
                            product.apply(&event);
                        }
                    }
                    prop_assert!(product.rental_stock() >= 0);
                }
            }
        }
    }
}
