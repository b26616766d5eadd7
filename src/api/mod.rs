pub mod admin;
pub mod announcement;
pub mod attendance;
pub mod class;
pub mod grade;
pub mod notification;
pub mod profile;
pub mod realtime;
pub mod schedule;
pub mod school;
pub mod subject;
