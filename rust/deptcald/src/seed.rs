use rusqlite::{params, Connection};

use crate::db;
use crate::settings::DepartmentSettings;

/// Register numbers 31, 45 and 50 were never issued in the mock batch.
const SKIPPED_STUDENT_IDS: [i64; 3] = [31, 45, 50];
const REGISTER_PREFIX: &str = "230601";

const FACULTY: [(i64, &str, &str, &str); 6] = [
    (1, "Dr. John Smith", "Professor", "john.smith@college.edu"),
    (2, "Dr. Sarah Johnson", "Associate Professor", "sarah.johnson@college.edu"),
    (3, "Prof. Michael Brown", "Assistant Professor", "michael.brown@college.edu"),
    (4, "Dr. Emily Davis", "Professor", "emily.davis@college.edu"),
    (5, "Dr. Robert Wilson", "Professor", "robert.wilson@college.edu"),
    (6, "Prof. Jennifer Lee", "Professor", "jennifer.lee@college.edu"),
];

// (id, code, name, type, faculty, semester)
const SUBJECTS: [(i64, &str, &str, &str, i64, i64); 8] = [
    (1, "CS101", "Introduction to Programming", "Theory", 1, 1),
    (2, "CS102", "Data Structures", "Theory", 2, 1),
    (3, "CS103", "Database Systems", "Combined", 3, 2),
    (4, "CS104", "Programming Lab", "Lab", 1, 1),
    (5, "CS105", "Database Lab", "Lab", 3, 2),
    (6, "CS106", "Web Development", "Elective", 4, 3),
    (7, "CS107", "Machine Learning", "Elective", 5, 3),
    (8, "CS108", "Computer Networks", "Combined", 6, 2),
];

struct SeedEntry {
    id: i64,
    day: &'static str,
    period: i64,
    subject_id: Option<i64>,
    faculty_id: Option<i64>,
    room: &'static str,
    is_elective: bool,
    slots_used: i64,
    is_break: bool,
    is_lunch: bool,
}

const fn class(
    id: i64,
    day: &'static str,
    period: i64,
    subject_id: i64,
    faculty_id: i64,
    room: &'static str,
    slots_used: i64,
) -> SeedEntry {
    SeedEntry {
        id,
        day,
        period,
        subject_id: Some(subject_id),
        faculty_id: Some(faculty_id),
        room,
        is_elective: false,
        slots_used,
        is_break: false,
        is_lunch: false,
    }
}

const fn pause(id: i64, day: &'static str, period: i64, lunch: bool) -> SeedEntry {
    SeedEntry {
        id,
        day,
        period,
        subject_id: None,
        faculty_id: None,
        room: "",
        is_elective: false,
        slots_used: 1,
        is_break: !lunch,
        is_lunch: lunch,
    }
}

const TIMETABLE: [SeedEntry; 8] = [
    class(1, "Monday", 1, 1, 1, "101", 1),
    class(2, "Monday", 2, 2, 2, "102", 1),
    pause(3, "Monday", 3, false),
    class(4, "Monday", 4, 3, 1, "Lab 1", 2),
    pause(5, "Monday", 6, true),
    class(6, "Monday", 7, 4, 3, "201", 1),
    class(7, "Tuesday", 1, 2, 2, "102", 1),
    SeedEntry {
        is_elective: true,
        ..class(8, "Tuesday", 2, 5, 4, "301", 1)
    },
];

// (id, subject, date, time, group)
const EXAMS: [(i64, i64, &str, &str, &str); 8] = [
    (1, 1, "2025-06-01", "09:00", "cat1"),
    (2, 2, "2025-06-03", "14:00", "cat1"),
    (3, 3, "2025-06-05", "09:00", "cat2"),
    (4, 4, "2025-06-07", "10:00", "cat2"),
    (5, 5, "2025-06-10", "09:00", "cat3"),
    (6, 6, "2025-06-12", "14:00", "cat3"),
    (7, 7, "2025-06-12", "09:00", "practical"),
    (8, 8, "2025-06-15", "09:00", "endsem"),
];

const EXAM_ROOMS: [(i64, i64, &str, &str); 11] = [
    (1, 1, "A101", "230601001-230601030"),
    (2, 1, "A102", "230601032-230601070"),
    (3, 2, "A103", "230601001-230601044"),
    (4, 2, "A104", "230601046-230601070"),
    (5, 3, "A105", "230601001-230601070"),
    (6, 4, "Lab1", "230601001-230601035"),
    (7, 4, "Lab2", "230601036-230601070"),
    (8, 5, "Lab2", "230601001-230601070"),
    (9, 6, "A101", "230601001-230601030"),
    (10, 7, "A102", "230601032-230601070"),
    (11, 8, "A103", "230601001-230601070"),
];

pub fn mock_register_no(id: i64) -> String {
    format!("{}{:03}", REGISTER_PREFIX, id)
}

/// Loads the department mock data set into an empty store.
pub fn seed_mock(conn: &Connection) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    for id in (1..=70).filter(|id| !SKIPPED_STUDENT_IDS.contains(id)) {
        let register_no = mock_register_no(id);
        tx.execute(
            "INSERT INTO students(id, register_no, full_name, department, year, email)
             VALUES(?, ?, ?, ?, ?, ?)",
            params![
                id,
                register_no,
                format!("Student {}", id),
                "Computer Science",
                1,
                format!("{}@college.edu", register_no)
            ],
        )?;
    }

    for (id, name, designation, email) in FACULTY {
        tx.execute(
            "INSERT INTO faculty(id, name, department, designation, email, phone)
             VALUES(?, ?, ?, ?, ?, ?)",
            params![id, name, "Computer Science", designation, email, "+1234567890"],
        )?;
    }

    for (id, code, name, kind, faculty_id, semester) in SUBJECTS {
        tx.execute(
            "INSERT INTO subjects(id, subject_code, subject_name, subject_type, faculty_id, semester, credits, department)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            params![id, code, name, kind, faculty_id, semester, 3, "Computer Science"],
        )?;
    }

    for e in &TIMETABLE {
        tx.execute(
            "INSERT INTO timetable_entries(id, day, period_number, slots_used, subject_id, faculty_id, room, is_elective, is_break, is_lunch)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                e.id,
                e.day,
                e.period,
                e.slots_used,
                e.subject_id,
                e.faculty_id,
                e.room,
                e.is_elective,
                e.is_break,
                e.is_lunch
            ],
        )?;
    }

    for (id, subject_id, date, time, group) in EXAMS {
        tx.execute(
            "INSERT INTO exams(id, subject_id, exam_date, exam_time, exam_group) VALUES(?, ?, ?, ?, ?)",
            params![id, subject_id, date, time, group],
        )?;
    }

    for (id, exam_id, room, range) in EXAM_ROOMS {
        tx.execute(
            "INSERT INTO exam_rooms(id, exam_id, room_name, register_range) VALUES(?, ?, ?, ?)",
            params![id, exam_id, room, range],
        )?;
    }

    db::save_settings(&tx, &DepartmentSettings::mock())?;
    tx.commit()?;
    Ok(())
}

/// Settings only; every entity table starts empty.
pub fn seed_settings(conn: &Connection) -> anyhow::Result<()> {
    db::save_settings(conn, &DepartmentSettings::mock())
}
