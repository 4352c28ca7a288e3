//! Read-side computations over result records.
//!
//! Callers decide which records count: student-facing GPA and course
//! analysis pass approved records only, audit views pass everything.

use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use crate::grade::{grade_point, Grade};
use crate::models::{
    CourseSessionStats, DepartmentPerformance, DepartmentResultCount, GradeShare, RankedResult,
    ResultRecord, SemesterGpa, UserProfile,
};
use crate::semester::{Semester, Session};

const HISTOGRAM_BUCKETS: usize = 10;
const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

pub fn total_units(results: &[ResultRecord]) -> u64 {
    results.iter().map(|r| u64::from(r.unit)).sum()
}

/// Unit-weighted grade point average, two decimals. Zero units give 0.00.
pub fn compute_gpa<'a>(results: impl IntoIterator<Item = &'a ResultRecord>) -> f64 {
    let (points, units) = results.into_iter().fold((0u64, 0u64), |(points, units), r| {
        let unit = u64::from(r.unit);
        (points + u64::from(grade_point(r.grade())) * unit, units + unit)
    });

    if units == 0 {
        return 0.0;
    }
    round2(points as f64 / units as f64)
}

/// GPA per `"{semester} {session}"`, in order of first appearance.
pub fn compute_semester_breakdown(results: &[ResultRecord]) -> Vec<SemesterGpa> {
    let mut groups: Vec<(Semester, Session, Vec<&ResultRecord>)> = Vec::new();

    for result in results {
        let (semester, session) = (result.key.semester, &result.key.session);
        match groups
            .iter_mut()
            .find(|(s, sess, _)| *s == semester && sess == session)
        {
            Some((_, _, members)) => members.push(result),
            None => groups.push((semester, session.clone(), vec![result])),
        }
    }

    groups
        .into_iter()
        .map(|(semester, session, members)| SemesterGpa {
            label: format!("{semester} {session}"),
            semester,
            session,
            gpa: compute_gpa(members),
        })
        .collect()
}

/// Chronologically latest (session, semester) present in `results`.
pub fn latest_period(results: &[ResultRecord]) -> Option<(Session, Semester)> {
    results
        .iter()
        .map(|r| (r.key.session.clone(), r.key.semester))
        .max()
}

pub fn compute_grade_distribution(results: &[ResultRecord]) -> Vec<GradeShare> {
    let mut counts: HashMap<Grade, usize> = HashMap::new();
    for result in results {
        *counts.entry(result.grade()).or_insert(0) += 1;
    }

    Grade::ALL
        .iter()
        .map(|grade| {
            let count = counts.get(grade).copied().unwrap_or(0);
            GradeShare {
                grade: *grade,
                count,
                percentage: percent(count, results.len()),
            }
        })
        .collect()
}

/// Highest totals first; ties keep input order.
pub fn rank_results(results: &[ResultRecord], limit: usize) -> Vec<RankedResult> {
    let mut ranked: Vec<&ResultRecord> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_score()
            .partial_cmp(&a.total_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|r| RankedResult {
            student_id: r.key.student_id,
            course_code: r.key.course_code.clone(),
            total_score: r.total_score(),
            grade: r.grade(),
        })
        .collect()
}

/// Statistics for one course in one session.
pub fn compute_course_session_stats(results: &[ResultRecord], top_n: usize) -> CourseSessionStats {
    let mut histogram = vec![0usize; HISTOGRAM_BUCKETS];
    let mut sum = 0.0;
    let mut highest = f64::MIN;
    let mut lowest = f64::MAX;
    let mut passed = 0usize;

    for result in results {
        let total = result.total_score();
        sum += total;
        highest = highest.max(total);
        lowest = lowest.min(total);
        if result.grade().is_pass() {
            passed += 1;
        }
        let bucket = ((total.max(0.0) / 10.0).floor() as usize).min(HISTOGRAM_BUCKETS - 1);
        histogram[bucket] += 1;
    }

    if results.is_empty() {
        highest = 0.0;
        lowest = 0.0;
    }

    CourseSessionStats {
        results: results.len(),
        average: if results.is_empty() {
            0.0
        } else {
            round2(sum / results.len() as f64)
        },
        highest,
        lowest,
        pass_rate: percent(passed, results.len()),
        histogram,
        top: rank_results(results, top_n),
    }
}

/// Per-department GPA and pass rate for one session.
///
/// Pass rate counts distinct students: a student passes when at least one of
/// their results is not an F. Students missing from `students` are grouped
/// under "Unassigned".
pub fn compute_cohort_stats(
    results: &[ResultRecord],
    students: &[UserProfile],
) -> Vec<DepartmentPerformance> {
    let departments: HashMap<Uuid, &str> = students
        .iter()
        .map(|s| {
            let department = s
                .department
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(UNASSIGNED_DEPARTMENT);
            (s.id, department)
        })
        .collect();

    #[derive(Default)]
    struct Bucket<'a> {
        results: Vec<&'a ResultRecord>,
        students: HashSet<Uuid>,
        passed: HashSet<Uuid>,
    }

    let mut buckets: BTreeMap<&str, Bucket> = BTreeMap::new();
    for result in results {
        let student_id = result.key.student_id;
        let department = departments
            .get(&student_id)
            .copied()
            .unwrap_or(UNASSIGNED_DEPARTMENT);
        let bucket = buckets.entry(department).or_default();
        bucket.results.push(result);
        bucket.students.insert(student_id);
        if result.grade().is_pass() {
            bucket.passed.insert(student_id);
        }
    }

    buckets
        .into_iter()
        .map(|(department, bucket)| DepartmentPerformance {
            department: department.to_string(),
            gpa: compute_gpa(bucket.results.iter().copied()),
            pass_rate: percent(bucket.passed.len(), bucket.students.len()),
            students: bucket.students.len(),
            results: bucket.results.len(),
        })
        .collect()
}

/// Result and approval counts per department of the given students,
/// alphabetical. Departments with no results yet still appear.
pub fn compute_department_counts(
    results: &[ResultRecord],
    students: &[UserProfile],
) -> Vec<DepartmentResultCount> {
    let mut counts: BTreeMap<&str, DepartmentResultCount> = BTreeMap::new();
    let mut departments: HashMap<Uuid, &str> = HashMap::new();

    for student in students {
        let department = student
            .department
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(UNASSIGNED_DEPARTMENT);
        departments.insert(student.id, department);
        counts
            .entry(department)
            .or_insert_with(|| DepartmentResultCount {
                department: department.to_string(),
                ..DepartmentResultCount::default()
            })
            .students += 1;
    }

    for result in results {
        let Some(department) = departments.get(&result.key.student_id) else {
            continue;
        };
        if let Some(entry) = counts.get_mut(department) {
            entry.results += 1;
            if result.is_approved() {
                entry.approved += 1;
            }
        }
    }

    counts.into_values().collect()
}
