pub mod admin;
pub mod core;
pub mod dashboard;
pub mod exam_rooms;
pub mod exams;
pub mod faculty;
pub mod periods;
pub mod settings;
pub mod students;
pub mod subjects;
pub mod timetable;
