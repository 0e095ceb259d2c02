pub const DEPARTMENTS: [&str; 5] = [
    "Computer Science",
    "Electronics",
    "Mechanical",
    "Civil",
    "Electrical",
];

pub const DESIGNATIONS: [&str; 5] = [
    "Professor",
    "Associate Professor",
    "Assistant Professor",
    "Senior Lecturer",
    "Lecturer",
];

pub const SUBJECT_TYPES: [&str; 4] = ["Theory", "Lab", "Elective", "Combined"];

/// (id, name, description) of the exam groups shown on the exam calendar.
pub const EXAM_GROUPS: [(&str, &str, &str); 5] = [
    ("cat1", "CAT 1", "First Continuous Assessment Test"),
    ("cat2", "CAT 2", "Second Continuous Assessment Test"),
    ("cat3", "CAT 3", "Third Continuous Assessment Test"),
    ("practical", "Practical", "Practical Examinations"),
    ("endsem", "End Semester", "End Semester Examinations"),
];

/// Canonical spelling of `raw` if it is one of `allowed` (case-insensitive).
pub fn canonical<'a>(allowed: &[&'a str], raw: &str) -> Option<&'a str> {
    let raw = raw.trim();
    allowed.iter().copied().find(|a| a.eq_ignore_ascii_case(raw))
}

pub fn is_exam_group(raw: &str) -> bool {
    EXAM_GROUPS.iter().any(|(id, _, _)| *id == raw)
}

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Optional leading `+` followed by at least ten digits.
pub fn is_valid_phone(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    digits.len() >= 10 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Two or more uppercase letters followed by exactly three digits, e.g. `CS101`.
pub fn is_valid_subject_code(s: &str) -> bool {
    let letters = s.bytes().take_while(|b| b.is_ascii_uppercase()).count();
    let rest = &s[letters..];
    letters >= 2 && rest.len() == 3 && rest.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("230601001@college.edu"));
        assert!(is_valid_email("j.smith@cs.college.edu"));
        assert!(!is_valid_email("no-at-sign.edu"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@college.edu"));
        assert!(!is_valid_email("@college.edu"));
        assert!(!is_valid_email("a@@college.edu"));
    }

    #[test]
    fn phone_shapes() {
        assert!(is_valid_phone("+1234567890"));
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("+12345-67890"));
    }

    #[test]
    fn subject_code_shapes() {
        assert!(is_valid_subject_code("CS101"));
        assert!(is_valid_subject_code("MATH204"));
        assert!(!is_valid_subject_code("C101"));
        assert!(!is_valid_subject_code("cs101"));
        assert!(!is_valid_subject_code("CS1010"));
        assert!(!is_valid_subject_code("CS10"));
    }

    #[test]
    fn canonical_lookup_is_case_insensitive() {
        assert_eq!(canonical(&DEPARTMENTS, "computer science"), Some("Computer Science"));
        assert_eq!(canonical(&SUBJECT_TYPES, " lab "), Some("Lab"));
        assert_eq!(canonical(&DESIGNATIONS, "Dean"), None);
    }
}
