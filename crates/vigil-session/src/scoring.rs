//! Scoring and completeness.

use std::collections::BTreeMap;

use vigil_types::{AnswerChoice, QuestionId};

use crate::quiz::Quiz;

/// Percentage of correct answers, rounded half away from zero. An empty quiz
/// scores 0.
pub fn score(quiz: &Quiz, answers: &BTreeMap<QuestionId, AnswerChoice>) -> u8 {
    let total = quiz.questions.len();
    if total == 0 {
        return 0;
    }
    let correct = quiz
        .questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct))
        .count();
    ((correct as f64 / total as f64) * 100.0).round() as u8
}

/// Questions without an answer, in quiz order.
pub fn unanswered(quiz: &Quiz, answers: &BTreeMap<QuestionId, AnswerChoice>) -> Vec<QuestionId> {
    quiz.questions
        .iter()
        .filter(|q| !answers.contains_key(&q.id))
        .map(|q| q.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Question;

    fn quiz(n: usize) -> Quiz {
        let questions = (0..n)
            .map(|i| {
                Question::new(
                    format!("q{}", i),
                    format!("Question {}", i),
                    vec!["a".into(), "b".into(), "c".into()],
                    1,
                )
            })
            .collect();
        Quiz::new("quiz", "Quiz", questions)
    }

    fn answers(pairs: &[(&str, u32)]) -> BTreeMap<QuestionId, AnswerChoice> {
        pairs.iter().map(|(q, a)| (QuestionId::new(*q), *a)).collect()
    }

    #[test]
    fn rounds_to_nearest_percent() {
        let quiz = quiz(3);
        assert_eq!(score(&quiz, &answers(&[("q0", 1), ("q1", 1), ("q2", 0)])), 67);
        assert_eq!(score(&quiz, &answers(&[("q0", 1), ("q1", 0), ("q2", 0)])), 33);
        assert_eq!(score(&quiz, &answers(&[("q0", 1), ("q1", 1), ("q2", 1)])), 100);
    }

    #[test]
    fn half_rounds_up() {
        let quiz = quiz(8);
        // 1/8 = 12.5%
        assert_eq!(score(&quiz, &answers(&[("q0", 1)])), 13);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        assert_eq!(score(&quiz(0), &BTreeMap::new()), 0);
    }

    #[test]
    fn lists_unanswered_in_order() {
        let quiz = quiz(4);
        assert_eq!(
            unanswered(&quiz, &answers(&[("q1", 0), ("q3", 2)])),
            vec![QuestionId::new("q0"), QuestionId::new("q2")]
        );
    }
}
