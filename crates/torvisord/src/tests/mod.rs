//! Unit tests for the supervisor.

mod supervise_unit;
