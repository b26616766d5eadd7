use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssessmentType {
    Daily,
    Assignment,
    Midterm,
    Final,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub class_id: Option<String>,
    #[schema(example = 1)]
    pub semester: i32,
    #[schema(example = "2025/2026")]
    pub academic_year: String,
    #[schema(example = "midterm")]
    pub assessment_type: String,
    #[schema(example = 87.5)]
    pub score: f64,
    pub notes: Option<String>,
    pub recorded_by: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

pub fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (0.0..=100.0).contains(&score)
}

/// Report-card letter for an average score.
pub fn predicate(average: f64) -> &'static str {
    if average >= 85.0 {
        "A"
    } else if average >= 75.0 {
        "B"
    } else if average >= 60.0 {
        "C"
    } else {
        "D"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub assessments: u32,
    pub average: f64,
    pub predicate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportCard {
    pub student_id: String,
    pub subjects: Vec<SubjectSummary>,
    /// Mean of subject averages, absent when there are no grades
    pub overall_average: Option<f64>,
    pub overall_predicate: Option<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn report_card(student_id: &str, grades: &[Grade]) -> ReportCard {
    let mut per_subject: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    for grade in grades {
        let entry = per_subject.entry(grade.subject_id.as_str()).or_default();
        entry.0 += grade.score;
        entry.1 += 1;
    }

    let subjects: Vec<SubjectSummary> = per_subject
        .into_iter()
        .map(|(subject_id, (sum, count))| {
            let average = round2(sum / count as f64);
            SubjectSummary {
                subject_id: subject_id.to_string(),
                assessments: count,
                average,
                predicate: predicate(average).to_string(),
            }
        })
        .collect();

    let overall_average = if subjects.is_empty() {
        None
    } else {
        let sum: f64 = subjects.iter().map(|s| s.average).sum();
        Some(round2(sum / subjects.len() as f64))
    };

    ReportCard {
        student_id: student_id.to_string(),
        overall_predicate: overall_average.map(|avg| predicate(avg).to_string()),
        subjects,
        overall_average,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(subject: &str, score: f64) -> Grade {
        Grade {
            id: format!("{subject}-{score}"),
            student_id: "st".into(),
            subject_id: subject.into(),
            class_id: None,
            semester: 1,
            academic_year: "2025/2026".into(),
            assessment_type: "daily".into(),
            score,
            notes: None,
            recorded_by: "t".into(),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn predicate_boundaries() {
        assert_eq!(predicate(85.0), "A");
        assert_eq!(predicate(84.99), "B");
        assert_eq!(predicate(75.0), "B");
        assert_eq!(predicate(60.0), "C");
        assert_eq!(predicate(59.9), "D");
    }

    #[test]
    fn averages_per_subject_then_overall() {
        let grades = vec![
            grade("bio", 80.0),
            grade("bio", 90.0),
            grade("mtk", 70.0),
        ];

        let card = report_card("st", &grades);

        assert_eq!(card.subjects.len(), 2);
        assert_eq!(card.subjects[0].subject_id, "bio");
        assert_eq!(card.subjects[0].average, 85.0);
        assert_eq!(card.subjects[0].predicate, "A");
        assert_eq!(card.subjects[1].average, 70.0);
        assert_eq!(card.overall_average, Some(77.5));
        assert_eq!(card.overall_predicate.as_deref(), Some("B"));
    }

    #[test]
    fn empty_report_card() {
        let card = report_card("st", &[]);
        assert!(card.subjects.is_empty());
        assert_eq!(card.overall_average, None);
    }

    #[test]
    fn score_range() {
        assert!(is_valid_score(0.0));
        assert!(is_valid_score(100.0));
        assert!(!is_valid_score(100.5));
        assert!(!is_valid_score(f64::NAN));
    }
}
