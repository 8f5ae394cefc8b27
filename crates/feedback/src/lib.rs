//! Customer feedback domain (event-sourced).
//!
//! Star-rated reviews submitted after a shoot. Submissions start hidden and
//! are published to the site (or archived) by an admin.

pub mod feedback;

pub use feedback::{
    ArchiveFeedback, Feedback, FeedbackCommand, FeedbackEvent, FeedbackId, FeedbackStatus,
    PublishFeedback, SubmitFeedback,
};
