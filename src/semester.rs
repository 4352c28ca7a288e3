use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn as_str(self) -> &'static str {
        match self {
            Semester::First => "First",
            Semester::Second => "Second",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Semester::First),
            "second" => Ok(Semester::Second),
            _ => Err(CoreError::Validation(format!(
                "invalid semester {value:?}, must be 'First' or 'Second'"
            ))),
        }
    }
}

/// Academic year in `YYYY/YYYY` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Session(String);

impl Session {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn start_year(&self) -> i32 {
        // Validated on construction.
        self.0[..4].parse().unwrap_or_default()
    }
}

impl FromStr for Session {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let bytes = value.as_bytes();
        let well_formed = bytes.len() == 9
            && bytes[4] == b'/'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);

        if !well_formed {
            return Err(CoreError::Validation(format!(
                "invalid session {value:?}, expected 'YYYY/YYYY'"
            )));
        }

        Ok(Session(value.to_string()))
    }
}

impl TryFrom<String> for Session {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Session> for String {
    fn from(session: Session) -> Self {
        session.0
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semester a course runs in, from the parity of its numeric suffix:
/// even numbers are Second semester courses, odd numbers First.
pub fn applicable_semester(course_code: &str) -> Result<Semester, CoreError> {
    let digits: String = course_code.chars().filter(char::is_ascii_digit).collect();
    let number: u64 = digits.parse().map_err(|_| {
        CoreError::Validation(format!("course code {course_code:?} has no course number"))
    })?;

    if number % 2 == 0 {
        Ok(Semester::Second)
    } else {
        Ok(Semester::First)
    }
}

pub fn validate(course_code: &str, semester: Semester) -> Result<(), CoreError> {
    let expected = applicable_semester(course_code)?;
    if expected != semester {
        return Err(CoreError::SemesterMismatch {
            course_code: course_code.to_string(),
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_selects_semester() {
        assert_eq!(applicable_semester("CSE 202").unwrap(), Semester::Second);
        assert_eq!(applicable_semester("CSE 203").unwrap(), Semester::First);
        assert_eq!(applicable_semester("MTH101").unwrap(), Semester::First);
    }

    #[test]
    fn mismatch_reports_expected_semester() {
        let err = validate("CSE202", Semester::First).unwrap_err();
        match err {
            CoreError::SemesterMismatch { expected, .. } => assert_eq!(expected, Semester::Second),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(validate("CSE202", Semester::Second).is_ok());
    }

    #[test]
    fn course_code_without_number_is_rejected() {
        assert!(matches!(
            applicable_semester("GST"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn session_format_is_enforced() {
        let session: Session = "2024/2025".parse().unwrap();
        assert_eq!(session.start_year(), 2024);
        assert!("2024-2025".parse::<Session>().is_err());
        assert!("24/25".parse::<Session>().is_err());
        assert!("2024/20255".parse::<Session>().is_err());
    }

    #[test]
    fn semester_parsing_ignores_case() {
        assert_eq!("second".parse::<Semester>().unwrap(), Semester::Second);
        assert!("third".parse::<Semester>().is_err());
    }
}
