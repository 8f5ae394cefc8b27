use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

/// Aggregate root: Product.
///
/// Lifecycle: Draft -> Active -> Archived. Only Active products are
/// purchasable, and purchases may never exceed `stock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    name: String,
    category: String,
    description: String,
    price: i64,
    stock: i64,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            category: String::new(),
            description: String::new(),
            price: 0,
            stock: 0,
            status: ProductStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
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

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Whether a purchase of `quantity` units would be accepted right now.
    pub fn can_fulfil(&self, quantity: i64) -> bool {
        self.status == ProductStatus::Active && quantity > 0 && quantity <= self.stock
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct (starts in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: i64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct (descriptive fields and price).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustProductStock.
///
/// Negative deltas record fulfilled purchases; the pool never goes below
/// zero, so an oversized purchase is rejected here rather than clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustProductStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateProduct (Draft -> Active).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    AdjustProductStock(AdjustProductStock),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: i64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductStockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductStockAdjusted(ProductStockAdjusted),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::ProductStockAdjusted(_) => "catalog.product.stock_adjusted",
            ProductEvent::ProductActivated(_) => "catalog.product.activated",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductStockAdjusted(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.stock = e.initial_stock;
                self.status = ProductStatus::Draft;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
            }
            ProductEvent::ProductStockAdjusted(e) => {
                self.stock += e.delta;
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::AdjustProductStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_archived(&self) -> Result<(), DomainError> {
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("product is archived"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.price < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            description: cmd.description.clone(),
            price: cmd.price,
            initial_stock: cmd.initial_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        self.ensure_not_archived()?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let price = cmd.price.unwrap_or(self.price);
        if price < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            name,
            description: cmd
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustProductStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        self.ensure_not_archived()?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if self.stock + cmd.delta < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![ProductEvent::ProductStockAdjusted(
            ProductStockAdjusted {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                delta: cmd.delta,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        self.ensure_not_archived()?;

        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }

        Ok(vec![ProductEvent::ProductActivated(ProductActivated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
