use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Letter grade on the five-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// All grades, best first. Distributions are reported in this order.
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn is_pass(self) -> bool {
        self != Grade::F
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(format!("unknown grade {other:?}")),
        }
    }
}

pub fn grade_of(total_score: f64) -> Grade {
    if total_score >= 70.0 {
        Grade::A
    } else if total_score >= 60.0 {
        Grade::B
    } else if total_score >= 50.0 {
        Grade::C
    } else if total_score >= 45.0 {
        Grade::D
    } else {
        Grade::F
    }
}

pub fn grade_point(grade: Grade) -> u32 {
    match grade {
        Grade::A => 5,
        Grade::B => 4,
        Grade::C => 3,
        Grade::D => 2,
        Grade::F => 0,
    }
}

/// Grade point for a stored label. Unknown labels count as zero.
pub fn grade_point_for_label(label: &str) -> u32 {
    label.parse::<Grade>().map(grade_point).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_follow_five_point_scale() {
        assert_eq!(grade_of(44.0), Grade::F);
        assert_eq!(grade_of(45.0), Grade::D);
        assert_eq!(grade_of(49.0), Grade::D);
        assert_eq!(grade_of(50.0), Grade::C);
        assert_eq!(grade_of(59.0), Grade::C);
        assert_eq!(grade_of(60.0), Grade::B);
        assert_eq!(grade_of(69.0), Grade::B);
        assert_eq!(grade_of(70.0), Grade::A);
        assert_eq!(grade_of(100.0), Grade::A);
        assert_eq!(grade_of(44.99), Grade::F);
    }

    #[test]
    fn grade_never_improves_as_score_drops() {
        let mut previous = grade_of(100.0);
        let mut score = 100.0;
        while score >= 0.0 {
            let grade = grade_of(score);
            assert!(grade >= previous, "{score} gave {grade} after {previous}");
            previous = grade;
            score -= 0.5;
        }
    }

    #[test]
    fn grade_points_match_scale() {
        let points: Vec<u32> = Grade::ALL.iter().map(|g| grade_point(*g)).collect();
        assert_eq!(points, vec![5, 4, 3, 2, 0]);
    }

    #[test]
    fn unknown_labels_score_zero() {
        assert_eq!(grade_point_for_label("b"), 4);
        assert_eq!(grade_point_for_label("E"), 0);
        assert_eq!(grade_point_for_label(""), 0);
    }
}
