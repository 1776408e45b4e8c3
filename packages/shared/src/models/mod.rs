pub mod badge;
pub mod class;
pub mod group;
pub mod profile;
pub mod student;
pub mod thermostat;
