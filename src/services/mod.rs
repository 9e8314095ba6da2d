pub mod attendance;
pub mod directory;
pub mod holiday;
pub mod leave;
pub mod notification;
pub mod overtime;
pub mod payroll;
pub mod photos;
pub mod review;
pub mod settings;
pub mod timing_store;

pub use attendance::AttendanceService;
pub use overtime::OvertimeService;
pub use payroll::PayrollService;
pub use review::{assert_period_open, AttendanceReviewAction, ReviewService};
pub use timing_store::DepartmentTimingStore;
