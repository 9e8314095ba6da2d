pub mod attendance;
pub mod department_timing;
pub mod ot_session;
pub mod payroll_period;
