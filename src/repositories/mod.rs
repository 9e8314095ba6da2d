pub mod attendance;
pub mod department_timing;
pub mod ot_session;
pub mod payroll_period;

pub use attendance::{AttendanceRepository, PgAttendanceRepository};
pub use department_timing::{DepartmentTimingRepository, PgDepartmentTimingRepository};
pub use ot_session::{OtSessionRepository, PgOtSessionRepository};
pub use payroll_period::{PayrollPeriodRepository, PgPayrollPeriodRepository};
