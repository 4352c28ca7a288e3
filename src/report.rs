use std::fmt::Write;

use crate::models::{CourseSessionAnalysis, GradeShare, StudentSummary};

fn write_distribution(output: &mut String, distribution: &[GradeShare]) {
    if distribution.iter().all(|share| share.count == 0) {
        let _ = writeln!(output, "No approved results yet.");
        return;
    }
    for share in distribution {
        let _ = writeln!(
            output,
            "- {}: {} ({}%)",
            share.grade, share.count, share.percentage
        );
    }
}

/// Markdown transcript of a student's approved results.
pub fn build_student_report(summary: &StudentSummary) -> String {
    let student = &summary.student;
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Transcript");
    let _ = writeln!(
        output,
        "{} ({})",
        student.full_name(),
        student.id_number
    );
    if let Some(department) = &student.department {
        let _ = writeln!(output, "Department: {department}");
    }
    if let Some(level) = summary.level {
        let _ = writeln!(output, "Level: {level}");
    }
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "CGPA {:.2} over {} units (latest semester GPA {:.2})",
        summary.cgpa, summary.total_units, summary.gpa
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Semesters");
    if summary.per_semester.is_empty() {
        let _ = writeln!(output, "No approved results yet.");
    } else {
        for semester in &summary.per_semester {
            let _ = writeln!(output, "- {}: GPA {:.2}", semester.label, semester.gpa);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");
    if summary.per_course.is_empty() {
        let _ = writeln!(output, "No approved results yet.");
    } else {
        let _ = writeln!(output, "| Course | Period | Test | Exam | Total | Grade | Unit |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for row in &summary.per_course {
            let _ = writeln!(
                output,
                "| {} | {} {} | {} | {} | {:.1} | {} | {} |",
                row.course_code,
                row.semester,
                row.session,
                row.test_score.map_or("-".to_string(), |s| format!("{s:.1}")),
                row.exam_score.map_or("-".to_string(), |s| format!("{s:.1}")),
                row.total_score,
                row.grade,
                row.unit
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Mix");
    write_distribution(&mut output, &summary.grade_distribution);

    output
}

pub fn build_course_report(analysis: &CourseSessionAnalysis) -> String {
    let stats = &analysis.stats;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# {} {} ({})",
        analysis.course.code, analysis.course.title, analysis.session
    );
    if !analysis.lecturers.is_empty() {
        let _ = writeln!(output, "Lecturer: {}", analysis.lecturers.join(", "));
    }
    let _ = writeln!(output);

    if stats.results == 0 {
        let _ = writeln!(output, "No approved results for this session.");
        return output;
    }

    let _ = writeln!(
        output,
        "{} approved results, average {:.2}, highest {:.1}, lowest {:.1}, pass rate {}%",
        stats.results, stats.average, stats.highest, stats.lowest, stats.pass_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Mix");
    write_distribution(&mut output, &analysis.grade_distribution);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Histogram");
    for (bucket, count) in stats.histogram.iter().enumerate() {
        let low = bucket * 10;
        let high = if bucket == 9 { 100 } else { low + 9 };
        let _ = writeln!(output, "- {low:>3}-{high:<3} {}", "#".repeat(*count));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    for (rank, result) in stats.top.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} scored {:.1} ({})",
            rank + 1,
            result.student_id,
            result.total_score,
            result.grade
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::models::{
        AccountType, Course, CourseRow, ResultKey, ResultRecord, Scores, UserProfile,
    };
    use crate::semester::Semester;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(student: u128, course: &str, test: f64, exam: f64, unit: u32) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            key: ResultKey {
                student_id: Uuid::from_u128(student),
                course_code: course.to_string(),
                semester: Semester::First,
                session: "2024/2025".parse().unwrap(),
            },
            scores: Scores::Both { test, exam },
            unit,
            uploaded_by: Uuid::from_u128(100),
            uploaded_at: Utc::now(),
            approval: None,
            version: 1,
        }
    }

    #[test]
    fn student_report_lists_courses_and_cgpa() {
        let results = vec![
            record(1, "CSE 201", 25.0, 50.0, 3),
            record(1, "CSE 203", 10.0, 20.0, 2),
        ];
        let summary = StudentSummary {
            student: UserProfile {
                id: Uuid::from_u128(1),
                first_name: "Ada".to_string(),
                last_name: "Okafor".to_string(),
                email: "ada@example.edu".to_string(),
                id_number: "MTU/22/0001".to_string(),
                account_type: AccountType::Student,
                department: Some("Computer Science".to_string()),
                programme: None,
                session: None,
            },
            level: Some(300),
            gpa: aggregate::compute_gpa(&results),
            cgpa: aggregate::compute_gpa(&results),
            total_units: aggregate::total_units(&results),
            per_semester: aggregate::compute_semester_breakdown(&results),
            per_course: results.iter().map(CourseRow::from).collect(),
            grade_distribution: aggregate::compute_grade_distribution(&results),
        };

        let report = build_student_report(&summary);
        assert!(report.contains("Ada Okafor (MTU/22/0001)"));
        assert!(report.contains("Level: 300"));
        assert!(report.contains("CGPA 3.00 over 5 units"));
        assert!(report.contains("| CSE 201 | First 2024/2025 | 25.0 | 50.0 | 75.0 | A | 3 |"));
        assert!(report.contains("- F: 1 (50%)"));
    }

    #[test]
    fn course_report_handles_empty_sessions() {
        let analysis = CourseSessionAnalysis {
            course: Course {
                code: "CSE 201".to_string(),
                title: "Introduction to Software Engineering".to_string(),
            },
            session: "2024/2025".parse().unwrap(),
            lecturers: Vec::new(),
            grade_distribution: aggregate::compute_grade_distribution(&[]),
            stats: aggregate::compute_course_session_stats(&[], 5),
        };
        let report = build_course_report(&analysis);
        assert!(report.contains("No approved results for this session."));
        assert!(!report.contains("Histogram"));
        assert!(!report.contains("Lecturer"));
    }

    #[test]
    fn course_report_draws_histogram() {
        let results = vec![
            record(1, "CSE 201", 30.0, 70.0, 3),
            record(2, "CSE 201", 20.0, 42.0, 3),
        ];
        let analysis = CourseSessionAnalysis {
            course: Course {
                code: "CSE 201".to_string(),
                title: "Introduction to Software Engineering".to_string(),
            },
            session: "2024/2025".parse().unwrap(),
            lecturers: vec!["Tunde Bello".to_string()],
            grade_distribution: aggregate::compute_grade_distribution(&results),
            stats: aggregate::compute_course_session_stats(&results, 5),
        };
        let report = build_course_report(&analysis);
        assert!(report.contains("Lecturer: Tunde Bello"));
        assert!(report.contains("pass rate 100%"));
        assert!(report.contains("-  90-100 #"));
        assert!(report.contains("1. 00000000-0000-0000-0000-000000000001 scored 100.0 (A)"));
    }
}
