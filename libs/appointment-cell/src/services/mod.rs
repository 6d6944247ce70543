pub mod booking;
pub mod dismissal;
pub mod lifecycle;
pub mod notifications;
pub mod status;

pub use booking::AppointmentBookingService;
pub use dismissal::DismissalTracker;
pub use lifecycle::StatusTransitionGuard;
pub use notifications::{NotificationProjector, NotificationService};
pub use status::AppointmentStatusService;
