//! Staff domain (employees and their assignments, event-sourced).
//!
//! Photographers, editors and assistants on the studio payroll, plus the
//! shoot tasks assigned to them. Pure domain logic only.

pub mod employee;
pub mod task;

pub use employee::{
    ContactInfo, Employee, EmployeeCommand, EmployeeEvent, EmployeeId, EmployeeStatus,
    HireEmployee, TerminateEmployee, UpdateEmployeeDetails,
};
pub use task::{
    AssignTask, CancelTask, CompleteTask, Task, TaskCommand, TaskEvent, TaskId, TaskStatus,
};
