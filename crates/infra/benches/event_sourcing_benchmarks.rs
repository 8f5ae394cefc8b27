use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use shutterdesk_core::{AggregateId, ExpectedVersion, TenantId};
use shutterdesk_events::EventEnvelope;
use shutterdesk_events::InMemoryEventBus;
use shutterdesk_infra::command_dispatcher::CommandDispatcher;
use shutterdesk_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use shutterdesk_infra::projections::resources::{ResourceReadModel, ResourcesProjection};
use shutterdesk_infra::read_model::InMemoryTenantStore;
use shutterdesk_resources::resource::{ResourceCreated, StockAdjusted};
use shutterdesk_resources::{
    AdjustStock, CreateResource, Resource, ResourceCommand, ResourceCondition, ResourceEvent,
    ResourceId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Naive CRUD simulation: direct key-value updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<(TenantId, AggregateId), CrudState>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CrudState {
    name: String,
    stock: i64,
    version: u64,
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn create(&self, tenant_id: TenantId, resource_id: AggregateId, name: String, stock: i64) {
        let mut map = self.inner.write().unwrap();
        map.insert(
            (tenant_id, resource_id),
            CrudState {
                name,
                stock,
                version: 1,
            },
        );
    }

    fn adjust_stock(&self, tenant_id: TenantId, resource_id: AggregateId, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if let Some(state) = map.get_mut(&(tenant_id, resource_id)) {
            let new_stock = state.stock + delta;
            if new_stock < 0 {
                return Err(());
            }
            state.stock = new_stock;
            state.version += 1;
            Ok(())
        } else {
            Err(())
        }
    }
}

fn setup_event_sourcing() -> (
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>,
    TenantId,
    AggregateId,
) {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let tenant_id = TenantId::new();
    let resource_id = AggregateId::new();
    (dispatcher, tenant_id, resource_id)
}

fn create_cmd(tenant_id: TenantId, resource_id: ResourceId, initial_stock: i64) -> ResourceCommand {
    ResourceCommand::CreateResource(CreateResource {
        tenant_id,
        resource_id,
        name: "Canon R5".to_string(),
        category: "camera".to_string(),
        description: "primary body".to_string(),
        condition: ResourceCondition::Good,
        initial_stock,
        occurred_at: Utc::now(),
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // CreateResource command (first command, no history)
    group.bench_function("create_resource_fresh", |b| {
        let (dispatcher, tenant_id, _) = setup_event_sourcing();
        b.iter(|| {
            let resource_id = AggregateId::new();
            dispatcher
                .dispatch(
                    tenant_id,
                    resource_id,
                    "resources.resource",
                    create_cmd(tenant_id, ResourceId(resource_id), black_box(10)),
                    |_, id| Resource::empty(ResourceId(id)),
                )
                .unwrap();
        });
    });

    // AdjustStock command after creation (rehydrates growing history)
    group.bench_function("adjust_stock_with_history", |b| {
        let (dispatcher, tenant_id, resource_id) = setup_event_sourcing();
        let resource_id_typed = ResourceId(resource_id);

        dispatcher
            .dispatch(
                tenant_id,
                resource_id,
                "resources.resource",
                create_cmd(tenant_id, resource_id_typed, 10),
                |_, id| Resource::empty(ResourceId(id)),
            )
            .unwrap();

        b.iter(|| {
            let adjust_cmd = AdjustStock {
                tenant_id,
                resource_id: resource_id_typed,
                delta: black_box(5),
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    tenant_id,
                    resource_id,
                    "resources.resource",
                    ResourceCommand::AdjustStock(adjust_cmd),
                    |_, id| Resource::empty(ResourceId(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");
    group.throughput(Throughput::Elements(1));

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let resource_id = AggregateId::new();

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = ResourceEvent::StockAdjusted(StockAdjusted {
                                tenant_id,
                                resource_id: ResourceId(resource_id),
                                delta: i as i64 + 1,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                tenant_id,
                                resource_id,
                                "resources.resource",
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let resource_id = AggregateId::new();
                let resource_id_typed = ResourceId(resource_id);

                // Pre-generate events
                let mut all_envelopes = Vec::new();
                {
                    let create_event = ResourceEvent::ResourceCreated(ResourceCreated {
                        tenant_id,
                        resource_id: resource_id_typed,
                        name: "Canon R5".to_string(),
                        category: "camera".to_string(),
                        description: "primary body".to_string(),
                        condition: ResourceCondition::Good,
                        initial_stock: 0,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        tenant_id,
                        resource_id,
                        "resources.resource",
                        uuid::Uuid::now_v7(),
                        &create_event,
                    )
                    .unwrap();
                    let stored = store.append(vec![uncommitted], ExpectedVersion::Any).unwrap();
                    all_envelopes.push(stored[0].to_envelope());

                    for i in 0..(count - 1) {
                        let adjust_event = ResourceEvent::StockAdjusted(StockAdjusted {
                            tenant_id,
                            resource_id: resource_id_typed,
                            delta: (i % 10) as i64 + 1,
                            occurred_at: Utc::now(),
                        });
                        let uncommitted = UncommittedEvent::from_typed(
                            tenant_id,
                            resource_id,
                            "resources.resource",
                            uuid::Uuid::now_v7(),
                            &adjust_event,
                        )
                        .unwrap();
                        let stored = store
                            .append(vec![uncommitted], ExpectedVersion::Exact((i + 1) as u64))
                            .unwrap();
                        all_envelopes.push(stored[0].to_envelope());
                    }
                }

                let read_model_store: Arc<InMemoryTenantStore<ResourceId, ResourceReadModel>> =
                    Arc::new(InMemoryTenantStore::new());
                let projection = ResourcesProjection::new(read_model_store);

                b.iter(|| {
                    projection.rebuild_from_scratch(black_box(all_envelopes.clone())).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_event_sourcing_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_sourcing_vs_naive_crud");
    group.sample_size(1000);

    group.bench_function("event_sourcing_create_and_adjust", |b| {
        let (dispatcher, tenant_id, _) = setup_event_sourcing();

        b.iter(|| {
            let resource_id = AggregateId::new();
            let resource_id_typed = ResourceId(resource_id);

            dispatcher
                .dispatch(
                    tenant_id,
                    resource_id,
                    "resources.resource",
                    create_cmd(tenant_id, resource_id_typed, 10),
                    |_, id| Resource::empty(ResourceId(id)),
                )
                .unwrap();

            let adjust_cmd = AdjustStock {
                tenant_id,
                resource_id: resource_id_typed,
                delta: 10,
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    tenant_id,
                    resource_id,
                    "resources.resource",
                    ResourceCommand::AdjustStock(adjust_cmd),
                    |_, id| Resource::empty(ResourceId(id)),
                )
                .unwrap();
        });
    });

    group.bench_function("naive_crud_create_and_adjust", |b| {
        let store = NaiveCrudStore::new();
        let tenant_id = TenantId::new();
        let resource_id = AggregateId::new();

        b.iter(|| {
            store.create(tenant_id, resource_id, "Canon R5".to_string(), 10);
            store.adjust_stock(tenant_id, resource_id, 10).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_event_sourcing_vs_naive_crud
);
criterion_main!(benches);
