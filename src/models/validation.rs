//! 记录校验

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::models::question::StructuredQuestion;

/// 叶子小题分值合计
pub const TOTAL_POINTS: i64 = 100;

/// 校验单道题目的结构
pub fn validate_question(question: &StructuredQuestion) -> Result<(), ValidationError> {
    let number = question.question_number;
    if number < 1 {
        return Err(ValidationError::InvalidNumber(number));
    }

    if let Some(ctx) = &question.context {
        if ctx.background.trim().is_empty() {
            return Err(ValidationError::EmptyBackground(number));
        }
        let mut seen = HashSet::new();
        for diagram in &ctx.diagrams {
            if !seen.insert(diagram.id.as_str()) {
                return Err(ValidationError::DuplicateDiagramId {
                    number,
                    id: diagram.id.clone(),
                });
            }
        }
    }

    if question
        .sub_questions
        .iter()
        .any(|s| s.label.trim().is_empty())
    {
        return Err(ValidationError::EmptyLabel(number));
    }

    Ok(())
}

/// 分值分配后的校验：所有叶子都有分值，且合计为 100
pub fn validate_points(question: &StructuredQuestion) -> Result<(), ValidationError> {
    let leaves = question.leaves();
    if leaves.is_empty() {
        return Ok(());
    }

    let number = question.question_number;
    let mut total: i64 = 0;
    for leaf in leaves {
        let point = leaf.point.ok_or(ValidationError::MissingPoint(number))?;
        if !(0..=TOTAL_POINTS).contains(&point) {
            return Err(ValidationError::PointOutOfRange { number, point });
        }
        // 合计超过 100 即可判定失败
        total += point;
        if total > TOTAL_POINTS {
            return Err(ValidationError::PointTotal { number, total });
        }
    }

    if total != TOTAL_POINTS {
        return Err(ValidationError::PointTotal { number, total });
    }
    Ok(())
}

/// 校验一份文档的全部题目
pub fn validate_document(questions: &[StructuredQuestion]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(ValidationError::EmptyDocument);
    }
    let mut numbers = HashSet::new();
    for question in questions {
        if !numbers.insert(question.question_number) {
            return Err(ValidationError::DuplicateNumber(question.question_number));
        }
        validate_question(question)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Context, Diagram, DiagramKind, SubQuestion};

    fn diagram(id: &str) -> Diagram {
        Diagram {
            id: id.to_string(),
            kind: DiagramKind::TableMarkup,
            content: "| a |".to_string(),
            label: String::new(),
        }
    }

    #[test]
    fn test_empty_background_is_rejected() {
        let mut q = StructuredQuestion::new(1);
        q.context = Some(Context {
            title: "材料一".to_string(),
            background: "   ".to_string(),
            diagrams: vec![],
        });
        assert_eq!(
            validate_question(&q),
            Err(ValidationError::EmptyBackground(1))
        );
    }

    #[test]
    fn test_duplicate_diagram_ids_are_rejected() {
        let mut q = StructuredQuestion::new(2);
        q.context = Some(Context {
            title: String::new(),
            background: "text".to_string(),
            diagrams: vec![diagram("d1"), diagram("d1")],
        });
        assert!(matches!(
            validate_question(&q),
            Err(ValidationError::DuplicateDiagramId { .. })
        ));
    }

    #[test]
    fn test_points_must_sum_to_100() {
        let mut q = StructuredQuestion::new(1);
        let mut a = SubQuestion::leaf("(1)", "a");
        a.point = Some(50);
        let mut b = SubQuestion::leaf("(2)", "b");
        b.point = Some(40);
        q.sub_questions = vec![a, b];
        assert_eq!(
            validate_points(&q),
            Err(ValidationError::PointTotal { number: 1, total: 90 })
        );

        q.sub_questions[1].point = Some(50);
        assert_eq!(validate_points(&q), Ok(()));
    }

    #[test]
    fn test_out_of_range_points_are_rejected() {
        let mut q = StructuredQuestion::new(3);
        let mut a = SubQuestion::leaf("(1)", "a");
        a.point = Some(i64::MAX);
        let mut b = SubQuestion::leaf("(2)", "b");
        b.point = Some(1);
        q.sub_questions = vec![a, b];
        assert_eq!(
            validate_points(&q),
            Err(ValidationError::PointOutOfRange {
                number: 3,
                point: i64::MAX
            })
        );

        q.sub_questions[0].point = Some(-20);
        q.sub_questions[1].point = Some(120);
        assert_eq!(
            validate_points(&q),
            Err(ValidationError::PointOutOfRange { number: 3, point: -20 })
        );
    }

    #[test]
    fn test_running_total_over_100_stops_early() {
        let mut q = StructuredQuestion::new(4);
        q.sub_questions = (1..=3)
            .map(|i| {
                let mut leaf = SubQuestion::leaf(format!("({})", i), "t");
                leaf.point = Some(60);
                leaf
            })
            .collect();
        assert_eq!(
            validate_points(&q),
            Err(ValidationError::PointTotal { number: 4, total: 120 })
        );
    }

    #[test]
    fn test_document_rejects_duplicate_numbers() {
        let questions = vec![StructuredQuestion::new(1), StructuredQuestion::new(1)];
        assert_eq!(
            validate_document(&questions),
            Err(ValidationError::DuplicateNumber(1))
        );
        assert_eq!(validate_document(&[]), Err(ValidationError::EmptyDocument));
    }
}
