use std::{
    convert::Infallible,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use shutterdesk_auth::UserId;
use shutterdesk_bookings::{BookingCommand, BookingId, CancelBooking};
use shutterdesk_core::{AggregateId, DomainError, TenantId};
use shutterdesk_events::{EventBus, EventEnvelope, InMemoryEventBus};
use shutterdesk_feedback::FeedbackId;
use shutterdesk_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        bookings::{BookingReadModel, BookingsProjection},
        catalog::{ProductReadModel, ProductsProjection},
        employees::{EmployeeReadModel, EmployeesProjection},
        feedback_entries::{FeedbackProjection, FeedbackReadModel},
        payments::{PaymentReadModel, PaymentsProjection},
        rentals::{RentalCatalogProjection, RentalProductReadModel},
        resources::{ResourceReadModel, ResourcesProjection},
        tasks::{TaskReadModel, TasksProjection},
        users::{UserReadModel, UsersProjection},
    },
    read_model::InMemoryTenantStore,
    saga::{BookingPaymentSaga, CommandExecutor, SagaRunner},
};
use shutterdesk_payments::{
    Payment, PaymentCommand, PaymentId, PaymentPlan, RecordPayment,
};
use shutterdesk_rentals::RentalProductId;
use shutterdesk_resources::ResourceId;
use shutterdesk_staff::{EmployeeId, TaskId};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

type Dispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

type BookingsProj = BookingsProjection<Arc<InMemoryTenantStore<BookingId, BookingReadModel>>>;

/// Executes saga-issued commands by dispatching through the command pipeline.
///
/// Saga payloads are intentionally slim; server-side concerns (payment id,
/// transaction id, customer email) are filled in here.
struct SagaCommandExecutor {
    dispatcher: Arc<Dispatcher>,
    bookings_projection: Arc<BookingsProj>,
}

impl CommandExecutor for SagaCommandExecutor {
    type Error = String;

    fn execute(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
        command_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), Self::Error> {
        match (aggregate_type, command_type) {
            ("payments.payment", "record_payment") => {
                let booking_id: BookingId =
                    serde_json::from_value(payload["booking_id"].clone())
                        .map_err(|e| format!("bad booking_id in saga payload: {e}"))?;
                let amount = payload["amount"]
                    .as_i64()
                    .ok_or_else(|| "missing amount in saga payload".to_string())?;

                let customer_email = self
                    .bookings_projection
                    .get(tenant_id, &booking_id)
                    .map(|b| b.customer_email)
                    .unwrap_or_default();

                let agg = AggregateId::new();
                let cmd = PaymentCommand::RecordPayment(RecordPayment {
                    tenant_id,
                    payment_id: PaymentId::new(agg),
                    booking_id,
                    customer_email,
                    amount,
                    plan: PaymentPlan::Full,
                    transaction_id: uuid::Uuid::now_v7(),
                    occurred_at: Utc::now(),
                });

                self.dispatcher
                    .dispatch::<Payment>(tenant_id, agg, "payments.payment", cmd, |_, id| {
                        Payment::empty(PaymentId::new(id))
                    })
                    .map_err(|e| format!("{e:?}"))?;
                Ok(())
            }
            ("bookings.booking", "cancel_booking") => {
                let booking_id: BookingId =
                    serde_json::from_value(payload["booking_id"].clone())
                        .map_err(|e| format!("bad booking_id in saga payload: {e}"))?;
                let reason = payload["reason"]
                    .as_str()
                    .unwrap_or("payment failed")
                    .to_string();

                let cmd = BookingCommand::CancelBooking(CancelBooking {
                    tenant_id,
                    booking_id,
                    reason,
                    occurred_at: Utc::now(),
                });

                self.dispatcher
                    .dispatch::<shutterdesk_bookings::Booking>(
                        tenant_id,
                        booking_id.0,
                        "bookings.booking",
                        cmd,
                        |_, id| shutterdesk_bookings::Booking::empty(BookingId::new(id)),
                    )
                    .map_err(|e| format!("{e:?}"))?;
                Ok(())
            }
            _ => Err(format!(
                "unsupported saga command {aggregate_type}/{command_type}"
            )),
        }
    }
}

pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    resources_projection:
        Arc<ResourcesProjection<Arc<InMemoryTenantStore<ResourceId, ResourceReadModel>>>>,
    rentals_projection: Arc<
        RentalCatalogProjection<
            Arc<InMemoryTenantStore<RentalProductId, RentalProductReadModel>>,
        >,
    >,
    products_projection:
        Arc<ProductsProjection<Arc<InMemoryTenantStore<shutterdesk_catalog::ProductId, ProductReadModel>>>>,
    bookings_projection: Arc<BookingsProj>,
    payments_projection:
        Arc<PaymentsProjection<Arc<InMemoryTenantStore<PaymentId, PaymentReadModel>>>>,
    employees_projection:
        Arc<EmployeesProjection<Arc<InMemoryTenantStore<EmployeeId, EmployeeReadModel>>>>,
    tasks_projection: Arc<TasksProjection<Arc<InMemoryTenantStore<TaskId, TaskReadModel>>>>,
    feedback_projection:
        Arc<FeedbackProjection<Arc<InMemoryTenantStore<FeedbackId, FeedbackReadModel>>>>,
    users_projection: Arc<UsersProjection<Arc<InMemoryTenantStore<UserId, UserReadModel>>>>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    subscriber_shutdown: Arc<AtomicBool>,
}

/// The bus senders live inside the dispatcher, so the subscriber loop never
/// sees a disconnect while the services are alive. The flag lets the loop
/// exit once the last handle is dropped.
impl Drop for AppServices {
    fn drop(&mut self) {
        self.subscriber_shutdown.store(true, Ordering::Release);
    }
}

/// In-memory infra wiring: store + bus + projections + saga runner.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    let resources_projection = Arc::new(ResourcesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let rentals_projection = Arc::new(RentalCatalogProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let products_projection = Arc::new(ProductsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let bookings_projection: Arc<BookingsProj> = Arc::new(BookingsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let payments_projection = Arc::new(PaymentsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let employees_projection = Arc::new(EmployeesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let tasks_projection = Arc::new(TasksProjection::new(Arc::new(InMemoryTenantStore::new())));
    let feedback_projection = Arc::new(FeedbackProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let users_projection = Arc::new(UsersProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Saga runner: reacts to booking/payment events, dispatching follow-up
    // commands back through the same pipeline.
    let saga_runner = SagaRunner::<BookingPaymentSaga, _, _>::new(
        store.clone(),
        SagaCommandExecutor {
            dispatcher: dispatcher.clone(),
            bookings_projection: bookings_projection.clone(),
        },
    );

    let subscriber_shutdown = Arc::new(AtomicBool::new(false));

    // Background subscriber: bus -> projections -> saga -> realtime.
    {
        let sub = bus.subscribe();
        let shutdown = subscriber_shutdown.clone();
        let resources_projection = resources_projection.clone();
        let rentals_projection = rentals_projection.clone();
        let products_projection = products_projection.clone();
        let bookings_projection = bookings_projection.clone();
        let payments_projection = payments_projection.clone();
        let employees_projection = employees_projection.clone();
        let tasks_projection = tasks_projection.clone();
        let feedback_projection = feedback_projection.clone();
        let users_projection = users_projection.clone();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || loop {
            // Wake periodically so shutdown is observed even while idle.
            match sub.recv_timeout(Duration::from_millis(50)) {
                Ok(env) => {
                    let at = env.aggregate_type();

                    // Apply to the relevant projection only.
                    let apply_ok = match at {
                        "resources.resource" => {
                            resources_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "rentals.rental_product" => {
                            rentals_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "catalog.product" => {
                            products_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "bookings.booking" => {
                            bookings_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "payments.payment" => {
                            payments_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "staff.employee" => {
                            employees_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "staff.task" => {
                            tasks_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "feedback.feedback" => {
                            feedback_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "auth.user" => {
                            users_projection.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        _ => Ok(()),
                    };

                    if let Err(e) = apply_ok {
                        tracing::warn!("projection apply failed: {e}");
                        continue;
                    }

                    // The saga correlates only booking/payment envelopes.
                    if let Err(e) = saga_runner.handle_envelope(&env) {
                        tracing::warn!("saga reaction failed: {e}");
                    }

                    // Broadcast projection update (lossy; no backpressure on core).
                    let _ = realtime_tx.send(RealtimeMessage {
                        tenant_id: env.tenant_id(),
                        topic: format!("{at}.projection_updated"),
                        payload: serde_json::json!({
                            "kind": "projection_update",
                            "aggregate_type": at,
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                        }),
                    });
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });
    }

    AppServices {
        dispatcher,
        resources_projection,
        rentals_projection,
        products_projection,
        bookings_projection,
        payments_projection,
        employees_projection,
        tasks_projection,
        feedback_projection,
        users_projection,
        realtime_tx,
        subscriber_shutdown,
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: shutterdesk_core::Aggregate<Error = DomainError>,
        A::Event: shutterdesk_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn resources_get(
        &self,
        tenant_id: TenantId,
        resource_id: &ResourceId,
    ) -> Option<ResourceReadModel> {
        self.resources_projection.get(tenant_id, resource_id)
    }

    pub fn resources_list(&self, tenant_id: TenantId) -> Vec<ResourceReadModel> {
        self.resources_projection.list(tenant_id)
    }

    pub fn rentals_get(
        &self,
        tenant_id: TenantId,
        rental_product_id: &RentalProductId,
    ) -> Option<RentalProductReadModel> {
        self.rentals_projection.get(tenant_id, rental_product_id)
    }

    pub fn rentals_list(&self, tenant_id: TenantId) -> Vec<RentalProductReadModel> {
        self.rentals_projection.list(tenant_id)
    }

    pub fn rentals_list_rentable(&self, tenant_id: TenantId) -> Vec<RentalProductReadModel> {
        self.rentals_projection.list_rentable(tenant_id)
    }

    pub fn products_get(
        &self,
        tenant_id: TenantId,
        product_id: &shutterdesk_catalog::ProductId,
    ) -> Option<ProductReadModel> {
        self.products_projection.get(tenant_id, product_id)
    }

    pub fn products_list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.products_projection.list(tenant_id)
    }

    pub fn products_list_active(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.products_projection.list_active(tenant_id)
    }

    pub fn bookings_get(
        &self,
        tenant_id: TenantId,
        booking_id: &BookingId,
    ) -> Option<BookingReadModel> {
        self.bookings_projection.get(tenant_id, booking_id)
    }

    pub fn bookings_list(&self, tenant_id: TenantId) -> Vec<BookingReadModel> {
        self.bookings_projection.list(tenant_id)
    }

    pub fn payments_get(
        &self,
        tenant_id: TenantId,
        payment_id: &PaymentId,
    ) -> Option<PaymentReadModel> {
        self.payments_projection.get(tenant_id, payment_id)
    }

    pub fn payments_list(&self, tenant_id: TenantId) -> Vec<PaymentReadModel> {
        self.payments_projection.list(tenant_id)
    }

    pub fn payments_list_for_booking(
        &self,
        tenant_id: TenantId,
        booking_id: &BookingId,
    ) -> Vec<PaymentReadModel> {
        self.payments_projection.list_for_booking(tenant_id, booking_id)
    }

    pub fn employees_get(
        &self,
        tenant_id: TenantId,
        employee_id: &EmployeeId,
    ) -> Option<EmployeeReadModel> {
        self.employees_projection.get(tenant_id, employee_id)
    }

    pub fn employees_list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        self.employees_projection.list(tenant_id)
    }

    pub fn tasks_get(&self, tenant_id: TenantId, task_id: &TaskId) -> Option<TaskReadModel> {
        self.tasks_projection.get(tenant_id, task_id)
    }

    pub fn tasks_list(&self, tenant_id: TenantId) -> Vec<TaskReadModel> {
        self.tasks_projection.list(tenant_id)
    }

    pub fn tasks_list_for_employee(
        &self,
        tenant_id: TenantId,
        employee_id: &EmployeeId,
    ) -> Vec<TaskReadModel> {
        self.tasks_projection.list_for_employee(tenant_id, employee_id)
    }

    pub fn feedback_get(
        &self,
        tenant_id: TenantId,
        feedback_id: &FeedbackId,
    ) -> Option<FeedbackReadModel> {
        self.feedback_projection.get(tenant_id, feedback_id)
    }

    pub fn feedback_list(&self, tenant_id: TenantId) -> Vec<FeedbackReadModel> {
        self.feedback_projection.list(tenant_id)
    }

    pub fn feedback_list_published(&self, tenant_id: TenantId) -> Vec<FeedbackReadModel> {
        self.feedback_projection.list_published(tenant_id)
    }

    pub fn users_get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.users_projection.get(tenant_id, user_id)
    }

    pub fn users_list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.users_projection.list(tenant_id)
    }

    pub fn users_find_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        self.users_projection.find_by_email(tenant_id, email)
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
