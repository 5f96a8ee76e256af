//! Activity identity resolution
//!
//! Statements may name a sub-unit of a course (`course:ABC/slide-3`) rather
//! than the course itself. This module recovers the course-level id and
//! matches it against the course directory. Pure functions over their
//! inputs; the directory is loaded by the caller.

use std::collections::HashMap;

use crate::models::Course;

/// Course-level part of an activity id: everything before the first `/`
pub fn base_activity_id(activity_id: &str) -> &str {
    match activity_id.split_once('/') {
        Some((base, _)) => base,
        None => activity_id,
    }
}

/// Outcome of matching an activity id against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseMatch<'a> {
    Matched(&'a Course),
    /// No course matched under any rule
    Unresolved,
    /// More than one course matched at the deciding rule
    Ambiguous(Vec<&'a Course>),
}

impl<'a> CourseMatch<'a> {
    pub fn course(&self) -> Option<&'a Course> {
        match self {
            CourseMatch::Matched(course) => Some(*course),
            _ => None,
        }
    }
}

/// Read-only snapshot of the course catalog
#[derive(Debug, Clone, Default)]
pub struct CourseDirectory {
    courses: Vec<Course>,
    by_id: HashMap<String, usize>,
}

impl CourseDirectory {
    pub fn new(courses: Vec<Course>) -> Self {
        let by_id = courses
            .iter()
            .enumerate()
            .map(|(index, course)| (course.course_id.clone(), index))
            .collect();
        Self { courses, by_id }
    }

    pub fn get(&self, course_id: &str) -> Option<&Course> {
        self.by_id.get(course_id).map(|&index| &self.courses[index])
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Match an activity id to a course
    ///
    /// Rules in order, first rule with any match decides:
    /// (a) full id equals a course's activity id,
    /// (b) base id equals a course's activity id,
    /// (c) full id starts with a course's activity id followed by `/`.
    ///
    /// Several courses matching at the deciding rule is reported as
    /// [`CourseMatch::Ambiguous`]; no course is picked.
    pub fn match_activity(&self, activity_id: &str) -> CourseMatch<'_> {
        let base = base_activity_id(activity_id);

        let rules: [&dyn Fn(&Course) -> bool; 3] = [
            &|course: &Course| course.activity_id == activity_id,
            &|course: &Course| course.activity_id == base,
            &|course: &Course| {
                activity_id
                    .strip_prefix(course.activity_id.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            },
        ];

        for rule in rules {
            let mut matches: Vec<&Course> = self.courses.iter().filter(|c| rule(*c)).collect();
            match matches.len() {
                0 => continue,
                1 => return CourseMatch::Matched(matches.remove(0)),
                _ => {
                    matches.sort_by(|a, b| a.course_id.cmp(&b.course_id));
                    return CourseMatch::Ambiguous(matches);
                }
            }
        }

        CourseMatch::Unresolved
    }

    /// Resolve an activity id to its course, if unambiguous
    pub fn resolve_course(&self, activity_id: &str) -> Option<&Course> {
        self.match_activity(activity_id).course()
    }
}
