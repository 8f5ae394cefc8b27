//! Pure pricing calculator for shoot bookings.
//!
//! Quotes are computed server-side from the booking selection alone. The same
//! selection always prices to the same total, so the calculator is safe to
//! call both for preview quotes and at booking time.

use serde::{Deserialize, Serialize};

use shutterdesk_core::DomainError;

/// Base rate per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Photography,
    Videography,
}

impl ServiceType {
    pub fn rate(self) -> i64 {
        match self {
            ServiceType::Photography => 1000,
            ServiceType::Videography => 1500,
        }
    }
}

/// Surcharge per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Wedding,
    Corporate,
    Birthday,
    Other,
}

impl EventType {
    pub fn rate(self) -> i64 {
        match self {
            EventType::Wedding => 500,
            EventType::Corporate => 400,
            EventType::Birthday => 250,
            EventType::Other => 150,
        }
    }
}

/// Surcharge per package tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Basic,
    Standard,
    Premium,
}

impl PackageType {
    pub fn rate(self) -> i64 {
        match self {
            PackageType::Basic => 100,
            PackageType::Standard => 200,
            PackageType::Premium => 400,
        }
    }
}

/// First booked hour.
const FIRST_HOUR_RATE: i64 = 30;
/// Each hour after the first.
const ADDITIONAL_HOUR_RATE: i64 = 25;
/// Edited media units included in every package.
const FREE_MEDIA_UNITS: i64 = 10;
/// Per-unit charge above [`FREE_MEDIA_UNITS`].
const MEDIA_OVERAGE_RATE: i64 = 2;
/// Flat fee when the studio handles transport.
const TRANSPORT_FEE: i64 = 10;

/// The customer's choices that drive the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShootSelection {
    pub service_type: ServiceType,
    pub event_type: EventType,
    pub package_type: PackageType,
    pub duration_hours: i64,
    pub media_count: i64,
    pub transport: bool,
}

/// Line-by-line quote. `total` is always the sum of the other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub service: i64,
    pub event: i64,
    pub package: i64,
    pub duration: i64,
    pub media: i64,
    pub transport: i64,
    pub total: i64,
}

/// Price a selection.
///
/// Rejects non-positive durations and negative media counts; everything else
/// prices deterministically.
pub fn quote(selection: &ShootSelection) -> Result<PriceBreakdown, DomainError> {
    if selection.duration_hours < 1 {
        return Err(DomainError::validation("duration must be at least one hour"));
    }
    if selection.media_count < 0 {
        return Err(DomainError::validation("media count cannot be negative"));
    }

    let service = selection.service_type.rate();
    let event = selection.event_type.rate();
    let package = selection.package_type.rate();
    let duration = FIRST_HOUR_RATE + (selection.duration_hours - 1) * ADDITIONAL_HOUR_RATE;
    let media = (selection.media_count - FREE_MEDIA_UNITS).max(0) * MEDIA_OVERAGE_RATE;
    let transport = if selection.transport { TRANSPORT_FEE } else { 0 };

    Ok(PriceBreakdown {
        service,
        event,
        package,
        duration,
        media,
        transport,
        total: service + event + package + duration + media + transport,
    })
}
