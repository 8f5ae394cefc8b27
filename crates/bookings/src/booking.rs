use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

use crate::pricing::{self, ShootSelection};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub AggregateId);

impl BookingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BookingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Booking status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Who booked the shoot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Aggregate root: Booking.
///
/// The total price is never client-supplied; it is quoted from the selection
/// when the booking is placed and recorded on the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    id: BookingId,
    tenant_id: Option<TenantId>,
    customer: CustomerDetails,
    selection: Option<ShootSelection>,
    shoot_date: Option<DateTime<Utc>>,
    total_price: i64,
    status: BookingStatus,
    version: u64,
    created: bool,
}

impl Booking {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BookingId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer: CustomerDetails {
                name: String::new(),
                email: String::new(),
                phone: String::new(),
                address: String::new(),
            },
            selection: None,
            shoot_date: None,
            total_price: 0,
            status: BookingStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BookingId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn customer(&self) -> &CustomerDetails {
        &self.customer
    }

    pub fn selection(&self) -> Option<&ShootSelection> {
        self.selection.as_ref()
    }

    pub fn shoot_date(&self) -> Option<DateTime<Utc>> {
        self.shoot_date
    }

    pub fn total_price(&self) -> i64 {
        self.total_price
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }
}

impl AggregateRoot for Booking {
    type Id = BookingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceBooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBooking {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub customer: CustomerDetails,
    pub selection: ShootSelection,
    pub shoot_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmBooking (Pending -> Confirmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmBooking {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelBooking (from Pending or Confirmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBooking {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingCommand {
    PlaceBooking(PlaceBooking),
    ConfirmBooking(ConfirmBooking),
    CancelBooking(CancelBooking),
}

/// Event: BookingPlaced. Carries the server-side quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPlaced {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub customer: CustomerDetails,
    pub selection: ShootSelection,
    pub shoot_date: DateTime<Utc>,
    pub total_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookingConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmed {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub total_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookingCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCancelled {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    BookingPlaced(BookingPlaced),
    BookingConfirmed(BookingConfirmed),
    BookingCancelled(BookingCancelled),
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingPlaced(_) => "bookings.booking.placed",
            BookingEvent::BookingConfirmed(_) => "bookings.booking.confirmed",
            BookingEvent::BookingCancelled(_) => "bookings.booking.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::BookingPlaced(e) => e.occurred_at,
            BookingEvent::BookingConfirmed(e) => e.occurred_at,
            BookingEvent::BookingCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Booking {
    type Command = BookingCommand;
    type Event = BookingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookingEvent::BookingPlaced(e) => {
                self.id = e.booking_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer = e.customer.clone();
                self.selection = Some(e.selection);
                self.shoot_date = Some(e.shoot_date);
                self.total_price = e.total_price;
                self.status = BookingStatus::Pending;
                self.created = true;
            }
            BookingEvent::BookingConfirmed(_) => {
                self.status = BookingStatus::Confirmed;
            }
            BookingEvent::BookingCancelled(_) => {
                self.status = BookingStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BookingCommand::PlaceBooking(cmd) => self.handle_place(cmd),
            BookingCommand::ConfirmBooking(cmd) => self.handle_confirm(cmd),
            BookingCommand::CancelBooking(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Booking {
    fn ensure_exists(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != booking_id {
            return Err(DomainError::invariant("booking_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceBooking) -> Result<Vec<BookingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("booking already exists"));
        }
        if cmd.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if cmd.customer.email.trim().is_empty() || !cmd.customer.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        let breakdown = pricing::quote(&cmd.selection)?;

        Ok(vec![BookingEvent::BookingPlaced(BookingPlaced {
            tenant_id: cmd.tenant_id,
            booking_id: cmd.booking_id,
            customer: cmd.customer.clone(),
            selection: cmd.selection,
            shoot_date: cmd.shoot_date,
            total_price: breakdown.total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmBooking) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.booking_id)?;

        match self.status {
            BookingStatus::Pending => Ok(vec![BookingEvent::BookingConfirmed(BookingConfirmed {
                tenant_id: cmd.tenant_id,
                booking_id: cmd.booking_id,
                total_price: self.total_price,
                occurred_at: cmd.occurred_at,
            })]),
            BookingStatus::Confirmed => Err(DomainError::conflict("booking is already confirmed")),
            BookingStatus::Cancelled => {
                Err(DomainError::invariant("cancelled booking cannot be confirmed"))
            }
        }
    }

    fn handle_cancel(&self, cmd: &CancelBooking) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.booking_id)?;

        if self.status == BookingStatus::Cancelled {
            return Err(DomainError::conflict("booking is already cancelled"));
        }

        Ok(vec![BookingEvent::BookingCancelled(BookingCancelled {
            tenant_id: cmd.tenant_id,
            booking_id: cmd.booking_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{EventType, PackageType, ServiceType};
    use shutterdesk_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_booking_id() -> BookingId {
        BookingId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_customer() -> CustomerDetails {
        CustomerDetails {
            name: "Lena Moreau".to_string(),
            email: "lena@example.com".to_string(),
            phone: "+33 6 12 34 56 78".to_string(),
            address: "12 Rue des Lilas, Lyon".to_string(),
        }
    }

    fn test_selection() -> ShootSelection {
        ShootSelection {
            service_type: ServiceType::Photography,
            event_type: EventType::Wedding,
            package_type: PackageType::Standard,
            duration_hours: 2,
            media_count: 15,
            transport: true,
        }
    }

    fn placed_booking(tenant_id: TenantId, booking_id: BookingId) -> Booking {
        let mut booking = Booking::empty(booking_id);
        let cmd = BookingCommand::PlaceBooking(PlaceBooking {
            tenant_id,
            booking_id,
            customer: test_customer(),
            selection: test_selection(),
            shoot_date: test_time(),
            occurred_at: test_time(),
        });
        for event in booking.handle(&cmd).unwrap() {
            booking.apply(&event);
        }
        booking
    }

    #[test]
    fn place_records_server_side_quote() {
        let booking = placed_booking(test_tenant_id(), test_booking_id());
        assert_eq!(booking.status(), BookingStatus::Pending);
        assert_eq!(booking.total_price(), 1775);
    }

    #[test]
    fn place_rejects_invalid_selection() {
        let booking = Booking::empty(test_booking_id());
        let mut selection = test_selection();
        selection.duration_hours = 0;

        let cmd = BookingCommand::PlaceBooking(PlaceBooking {
            tenant_id: test_tenant_id(),
            booking_id: test_booking_id(),
            customer: test_customer(),
            selection,
            shoot_date: test_time(),
            occurred_at: test_time(),
        });
        assert!(matches!(
            booking.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn place_rejects_bad_email() {
        let booking = Booking::empty(test_booking_id());
        let mut customer = test_customer();
        customer.email = "not-an-email".to_string();

        let cmd = BookingCommand::PlaceBooking(PlaceBooking {
            tenant_id: test_tenant_id(),
            booking_id: test_booking_id(),
            customer,
            selection: test_selection(),
            shoot_date: test_time(),
            occurred_at: test_time(),
        });
        assert!(matches!(
            booking.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn confirm_carries_total_price() {
        let tenant_id = test_tenant_id();
        let booking_id = test_booking_id();
        let mut booking = placed_booking(tenant_id, booking_id);

        let cmd = BookingCommand::ConfirmBooking(ConfirmBooking {
            tenant_id,
            booking_id,
            occurred_at: test_time(),
        });
        let events = booking.handle(&cmd).unwrap();
        let BookingEvent::BookingConfirmed(e) = &events[0] else {
            panic!("expected BookingConfirmed event");
        };
        assert_eq!(e.total_price, 1775);

        for event in &events {
            booking.apply(event);
        }
        assert_eq!(booking.status(), BookingStatus::Confirmed);
    }

    #[test]
    fn cancelled_booking_cannot_be_confirmed() {
        let tenant_id = test_tenant_id();
        let booking_id = test_booking_id();
        let mut booking = placed_booking(tenant_id, booking_id);

        let cancel = BookingCommand::CancelBooking(CancelBooking {
            tenant_id,
            booking_id,
            reason: "customer withdrew".to_string(),
            occurred_at: test_time(),
        });
        for event in booking.handle(&cancel).unwrap() {
            booking.apply(&event);
        }

        let confirm = BookingCommand::ConfirmBooking(ConfirmBooking {
            tenant_id,
            booking_id,
            occurred_at: test_time(),
        });
        let err = booking.handle(&confirm).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn confirmed_booking_can_still_be_cancelled() {
        let tenant_id = test_tenant_id();
        let booking_id = test_booking_id();
        let mut booking = placed_booking(tenant_id, booking_id);

        let confirm = BookingCommand::ConfirmBooking(ConfirmBooking {
            tenant_id,
            booking_id,
            occurred_at: test_time(),
        });
        for event in booking.handle(&confirm).unwrap() {
            booking.apply(&event);
        }

        let cancel = BookingCommand::CancelBooking(CancelBooking {
            tenant_id,
            booking_id,
            reason: "payment failed".to_string(),
            occurred_at: test_time(),
        });
        for event in booking.handle(&cancel).unwrap() {
            booking.apply(&event);
        }
        assert_eq!(booking.status(), BookingStatus::Cancelled);
    }

    #[test]
    fn cancel_twice_conflicts() {
        let tenant_id = test_tenant_id();
        let booking_id = test_booking_id();
        let mut booking = placed_booking(tenant_id, booking_id);

        let cancel = BookingCommand::CancelBooking(CancelBooking {
            tenant_id,
            booking_id,
            reason: "duplicate".to_string(),
            occurred_at: test_time(),
        });
        for event in booking.handle(&cancel).unwrap() {
            booking.apply(&event);
        }
        assert!(matches!(
            booking.handle(&cancel).unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let booking = placed_booking(test_tenant_id(), test_booking_id());
        let cmd = BookingCommand::ConfirmBooking(ConfirmBooking {
            tenant_id: test_tenant_id(),
            booking_id: booking.id_typed(),
            occurred_at: test_time(),
        });
        let err = booking.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}
